use std::sync::Arc;
use tokio::sync::RwLock;
use log::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub access_token: Option<String>,
}

impl AuthUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), email: None, access_token: None }
    }
}

/// Shared handle on the signed-in user. Cloned into every store that scopes
/// its data per user; owned by the application bootstrap.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Arc<RwLock<Option<AuthUser>>>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user: AuthUser) -> Self {
        Self { user: Arc::new(RwLock::new(Some(user))) }
    }

    pub async fn current_user(&self) -> Option<AuthUser> {
        self.user.read().await.clone()
    }

    pub async fn sign_in(&self, user: AuthUser) {
        info!("Signed in as {}", user.id);
        *self.user.write().await = Some(user);
    }

    pub async fn sign_out(&self) -> Option<AuthUser> {
        let previous = self.user.write().await.take();
        if let Some(user) = &previous {
            info!("Signed out {}", user.id);
        }
        previous
    }
}
