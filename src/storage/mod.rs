pub mod kv;
pub mod local;
pub mod postgrest;
pub mod remote;

use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::Args;
use crate::error::StoreError;
use crate::models::chat::{ ChatMessage, NewChatMessage };
use crate::models::saved::SavedItem;
use crate::session::AuthUser;

use self::kv::KeyValueStore;
use self::local::{ LocalChatHistory, LocalSavedItems };
use self::postgrest::PostgrestClient;
use self::remote::{ RemoteChatHistory, RemoteSavedItems };

/// Durable side of the saved set. Adapters that scope data per user report it
/// through `requires_user` and reject calls made without one.
#[async_trait]
pub trait SavedItemsBackend: Send + Sync {
    fn requires_user(&self) -> bool;

    async fn load(&self, user: Option<&AuthUser>) -> Result<Vec<SavedItem>, StoreError>;

    async fn insert(&self, user: Option<&AuthUser>, item: &SavedItem) -> Result<(), StoreError>;

    async fn remove(&self, user: Option<&AuthUser>, item_id: &str) -> Result<(), StoreError>;

    async fn clear(&self, user: Option<&AuthUser>) -> Result<(), StoreError>;
}

/// Durable side of the chat log. `load_recent` returns oldest-first.
#[async_trait]
pub trait ChatHistoryBackend: Send + Sync {
    fn requires_user(&self) -> bool;

    async fn load_recent(
        &self,
        user: Option<&AuthUser>,
        limit: usize
    ) -> Result<Vec<ChatMessage>, StoreError>;

    async fn append(
        &self,
        user: Option<&AuthUser>,
        message: NewChatMessage
    ) -> Result<ChatMessage, StoreError>;

    async fn clear(&self, user: Option<&AuthUser>) -> Result<(), StoreError>;
}

pub fn create_postgrest_client(args: &Args) -> Result<PostgrestClient, StoreError> {
    let base_url = args.supabase_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| StoreError::Config("SUPABASE_URL is required for remote storage".to_string()))?;
    let anon_key = args.supabase_anon_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(||
            StoreError::Config("SUPABASE_ANON_KEY is required for remote storage".to_string())
        )?;
    PostgrestClient::with_timeout(base_url, anon_key, Duration::from_secs(args.supabase_timeout_secs))
}

pub fn create_saved_items_backend(
    args: &Args,
    kv: Arc<dyn KeyValueStore>
) -> Result<Arc<dyn SavedItemsBackend>, StoreError> {
    match args.storage_backend.to_lowercase().as_str() {
        "local" => {
            info!("Saved items are kept on this device under '{}'", args.saved_items_key);
            Ok(Arc::new(LocalSavedItems::new(kv, &args.saved_items_key)))
        }
        "remote" => {
            let client = create_postgrest_client(args)?;
            info!("Saved items are kept in the remote 'saved_items' table");
            Ok(Arc::new(RemoteSavedItems::new(client)))
        }
        other => Err(StoreError::Config(format!("Unsupported storage backend: {}", other))),
    }
}

pub fn create_chat_history_backend(
    args: &Args,
    kv: Arc<dyn KeyValueStore>
) -> Result<Arc<dyn ChatHistoryBackend>, StoreError> {
    match args.storage_backend.to_lowercase().as_str() {
        "local" => {
            info!("Chat history is kept on this device under '{}*'", args.chat_history_key_prefix);
            Ok(
                Arc::new(
                    LocalChatHistory::new(kv, &args.chat_history_key_prefix, args.local_history_cap)
                )
            )
        }
        "remote" => {
            let client = create_postgrest_client(args)?;
            info!("Chat history is kept in the remote 'chat_history' table");
            Ok(Arc::new(RemoteChatHistory::new(client)))
        }
        other => Err(StoreError::Config(format!("Unsupported storage backend: {}", other))),
    }
}
