use std::error::Error;
use std::sync::Arc;
use log::{ info, warn };

use crate::assistant::{ AssistantClient, WebhookAssistant };
use crate::cli::Args;
use crate::concierge::Concierge;
use crate::error::StoreError;
use crate::models::profile::{ OnboardingData, UserProfile };
use crate::session::{ AuthUser, Session };
use crate::storage::kv::{ create_key_value_store, KeyValueStore };
use crate::storage::remote::ProfileRepository;
use crate::storage::{
    create_chat_history_backend,
    create_postgrest_client,
    create_saved_items_backend,
    ChatHistoryBackend,
    SavedItemsBackend,
};
use crate::stores::{ ChatHistoryStore, SavedItemsStore, ThemeStore };

/// Everything a front-end needs, wired once at startup and passed down.
pub struct AppContext {
    pub session: Session,
    pub saved_items: Arc<SavedItemsStore>,
    pub chat_history: Arc<ChatHistoryStore>,
    pub theme: Arc<ThemeStore>,
    pub concierge: Concierge,
    profiles: Option<ProfileRepository>,
}

impl AppContext {
    pub fn assemble(
        session: Session,
        kv: Arc<dyn KeyValueStore>,
        saved_backend: Arc<dyn SavedItemsBackend>,
        history_backend: Arc<dyn ChatHistoryBackend>,
        assistant: Arc<dyn AssistantClient>,
        theme_key: &str,
        history_limit: usize
    ) -> Self {
        let saved_items = Arc::new(SavedItemsStore::new(saved_backend, session.clone()));
        let chat_history = Arc::new(
            ChatHistoryStore::new(history_backend, session.clone(), history_limit)
        );
        let theme = Arc::new(ThemeStore::new(kv, theme_key));
        let concierge = Concierge::new(assistant, chat_history.clone(), session.clone());
        Self {
            session,
            saved_items,
            chat_history,
            theme,
            concierge,
            profiles: None,
        }
    }

    pub async fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let session = match &args.user_id {
            Some(id) if !id.trim().is_empty() =>
                Session::signed_in(AuthUser {
                    id: id.clone(),
                    email: args.user_email.clone(),
                    access_token: args.user_access_token.clone(),
                }),
            _ => {
                if args.remote_enabled() {
                    warn!("Remote storage selected but nobody is signed in; saving is disabled.");
                }
                Session::anonymous()
            }
        };

        let kv = create_key_value_store(args)?;
        let saved_backend = create_saved_items_backend(args, kv.clone())?;
        let history_backend = create_chat_history_backend(args, kv.clone())?;
        let assistant: Arc<dyn AssistantClient> = Arc::new(WebhookAssistant::from_args(args)?);

        let mut app = Self::assemble(
            session,
            kv,
            saved_backend,
            history_backend,
            assistant,
            &args.theme_key,
            args.history_limit
        );
        if args.remote_enabled() {
            app.profiles = Some(ProfileRepository::new(create_postgrest_client(args)?));
        }
        Ok(app)
    }

    /// Hydrates every cache. Failures are already logged by the stores.
    pub async fn load(&self) {
        let theme = self.theme.load().await;
        let saved = self.saved_items.load().await.unwrap_or_default();
        let history = self.chat_history.load().await.unwrap_or_default();
        info!("Ready: theme={}, saved items={}, chat messages={}", theme, saved, history);

        if self.profiles.is_some() && self.session.current_user().await.is_some() {
            match self.profile().await {
                Ok(Some(profile)) if profile.onboarding_completed => {
                    info!("Profile loaded for {}", profile.email);
                }
                Ok(_) => info!("Onboarding not completed yet; use /onboard"),
                Err(e) => warn!("Failed to fetch profile: {}", e),
            }
        }
    }

    fn profile_repository(&self) -> Result<&ProfileRepository, StoreError> {
        self.profiles
            .as_ref()
            .ok_or_else(|| StoreError::Config("Profiles are only kept with remote storage".to_string()))
    }

    pub async fn profile(&self) -> Result<Option<UserProfile>, StoreError> {
        let user = self.session.current_user().await;
        self.profile_repository()?.fetch(user.as_ref()).await
    }

    pub async fn complete_onboarding(&self, data: &OnboardingData) -> Result<UserProfile, StoreError> {
        let user = self.session.current_user().await;
        self.profile_repository()?.complete_onboarding(user.as_ref(), data).await
    }

    pub async fn sign_in(&self, user: AuthUser) {
        self.session.sign_in(user).await;
        self.load().await;
    }

    pub async fn sign_out(&self) {
        self.session.sign_out().await;
        self.saved_items.on_sign_out().await;
        self.chat_history.on_sign_out().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::assistant::AssistantError;
    use crate::models::saved::SavedItem;
    use crate::models::webhook::AssistantReply;
    use crate::storage::kv::MemoryKv;
    use crate::storage::local::{ LocalChatHistory, LocalSavedItems };

    struct Offline;

    #[async_trait]
    impl AssistantClient for Offline {
        async fn ask(&self, _query: &str, _user_id: Option<&str>) -> Result<AssistantReply, AssistantError> {
            Err(AssistantError::Malformed("offline".into()))
        }
    }

    fn app(session: Session, kv: Arc<MemoryKv>) -> AppContext {
        AppContext::assemble(
            session,
            kv.clone(),
            Arc::new(LocalSavedItems::new(kv.clone(), "@saved")),
            Arc::new(LocalChatHistory::new(kv, "@history:", 100)),
            Arc::new(Offline),
            "@theme",
            100
        )
    }

    #[tokio::test]
    async fn sign_out_clears_user_history_but_keeps_device_bookmarks() {
        let kv = Arc::new(MemoryKv::new());
        let app = app(Session::signed_in(AuthUser::new("u1")), kv.clone());
        app.load().await;

        app.saved_items.toggle_save(&SavedItem::new("a", "Cave Restaurant")).await.unwrap();
        app.concierge.send("hello").await.unwrap();
        assert_eq!(app.chat_history.len().await, 2);

        app.sign_out().await;
        assert!(app.session.current_user().await.is_none());
        assert_eq!(app.chat_history.len().await, 0);
        assert!(app.saved_items.is_saved("a").await);

        app.sign_in(AuthUser::new("u1")).await;
        assert_eq!(app.chat_history.len().await, 2);
    }

    #[tokio::test]
    async fn from_args_wires_local_memory_stack() {
        use clap::Parser;
        let args = Args::parse_from(["diani-guide", "--kv-type", "memory", "--user-id", "u1"]);
        let app = AppContext::from_args(&args).await.unwrap();
        assert_eq!(app.session.current_user().await.map(|u| u.id), Some("u1".to_string()));
        assert!(app.profiles.is_none());
        app.load().await;
        assert_eq!(app.saved_items.len().await, 0);
    }

    #[tokio::test]
    async fn remote_context_reaches_profiles() {
        use clap::Parser;
        use serde_json::json;
        use wiremock::matchers::{ body_partial_json, method, path, query_param };
        use wiremock::{ Mock, MockServer, ResponseTemplate };

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", "eq.u1"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server).await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/profiles"))
            .and(body_partial_json(json!({ "id": "u1", "onboarding_completed": true, "country_of_origin": "Kenya" })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(
                    json!([{ "id": "u1", "email": "guest@example.com", "onboarding_completed": true }])
                )
            )
            .expect(1)
            .mount(&server).await;

        let uri = server.uri();
        let args = Args::parse_from([
            "diani-guide",
            "--storage-backend",
            "remote",
            "--kv-type",
            "memory",
            "--supabase-url",
            uri.as_str(),
            "--supabase-anon-key",
            "anon",
            "--user-id",
            "u1",
            "--user-email",
            "guest@example.com",
        ]);
        let app = AppContext::from_args(&args).await.unwrap();
        assert!(app.profile().await.unwrap().is_none());

        let data = OnboardingData { country_of_origin: "Kenya".into(), ..OnboardingData::default() };
        assert!(app.complete_onboarding(&data).await.unwrap().onboarding_completed);
    }

    #[tokio::test]
    async fn profiles_need_remote_storage() {
        let app = app(Session::signed_in(AuthUser::new("u1")), Arc::new(MemoryKv::new()));
        assert!(matches!(app.profile().await, Err(StoreError::Config(_))));
    }
}
