use std::sync::Arc;
use tokio::sync::RwLock;
use log::warn;

use crate::models::theme::Theme;
use crate::storage::kv::KeyValueStore;

/// Theme choice persisted on the device.
pub struct ThemeStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    current: RwLock<Theme>,
}

impl ThemeStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: &str) -> Self {
        Self {
            kv,
            key: key.to_string(),
            current: RwLock::new(Theme::default()),
        }
    }

    pub async fn load(&self) -> Theme {
        match self.kv.get(&self.key).await {
            Ok(Some(raw)) => {
                if let Ok(theme) = raw.parse::<Theme>() {
                    *self.current.write().await = theme;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to load theme from storage: {}", e),
        }
        self.current().await
    }

    pub async fn current(&self) -> Theme {
        *self.current.read().await
    }

    pub async fn toggle(&self) -> Theme {
        let next = {
            let mut current = self.current.write().await;
            *current = current.toggled();
            *current
        };
        if let Err(e) = self.kv.set(&self.key, next.as_str()).await {
            warn!("Failed to save theme to storage: {}", e);
        }
        next
    }
}
