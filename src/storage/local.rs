use async_trait::async_trait;
use chrono::Utc;
use log::{ error, warn };
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use super::kv::KeyValueStore;
use super::{ ChatHistoryBackend, SavedItemsBackend };
use crate::error::StoreError;
use crate::models::chat::{ ChatMessage, NewChatMessage };
use crate::models::saved::SavedItem;
use crate::session::AuthUser;

const DEVICE_SCOPE: &str = "device";

async fn read_array<T: DeserializeOwned>(
    kv: &dyn KeyValueStore,
    key: &str
) -> Result<Vec<T>, StoreError> {
    match kv.get(key).await? {
        Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
        _ => Ok(Vec::new()),
    }
}

async fn write_array<T: Serialize>(
    kv: &dyn KeyValueStore,
    key: &str,
    entries: &[T]
) -> Result<(), StoreError> {
    let json = serde_json::to_string(entries)?;
    kv.set(key, &json).await
}

/// Saved set of this device: one JSON array under a fixed key.
pub struct LocalSavedItems {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl LocalSavedItems {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: &str) -> Self {
        Self { kv, key: key.to_string() }
    }
}

#[async_trait]
impl SavedItemsBackend for LocalSavedItems {
    fn requires_user(&self) -> bool {
        false
    }

    async fn load(&self, _user: Option<&AuthUser>) -> Result<Vec<SavedItem>, StoreError> {
        read_array(self.kv.as_ref(), &self.key).await
    }

    async fn insert(&self, _user: Option<&AuthUser>, item: &SavedItem) -> Result<(), StoreError> {
        let mut items: Vec<SavedItem> = read_array(self.kv.as_ref(), &self.key).await?;
        if items.iter().any(|saved| saved.id == item.id) {
            return Ok(());
        }
        items.push(item.clone());
        write_array(self.kv.as_ref(), &self.key, &items).await
    }

    async fn remove(&self, _user: Option<&AuthUser>, item_id: &str) -> Result<(), StoreError> {
        let mut items: Vec<SavedItem> = read_array(self.kv.as_ref(), &self.key).await?;
        items.retain(|saved| saved.id != item_id);
        write_array(self.kv.as_ref(), &self.key, &items).await
    }

    async fn clear(&self, _user: Option<&AuthUser>) -> Result<(), StoreError> {
        write_array::<SavedItem>(self.kv.as_ref(), &self.key, &[]).await
    }
}

/// Chat log kept on the device, one JSON array per user (or one for the
/// device when nobody is signed in), trimmed to `cap` entries.
pub struct LocalChatHistory {
    kv: Arc<dyn KeyValueStore>,
    key_prefix: String,
    cap: usize,
}

impl LocalChatHistory {
    pub fn new(kv: Arc<dyn KeyValueStore>, key_prefix: &str, cap: usize) -> Self {
        Self {
            kv,
            key_prefix: key_prefix.to_string(),
            cap: cap.max(1),
        }
    }

    fn key_for(&self, user: Option<&AuthUser>) -> String {
        let scope = user.map(|u| u.id.as_str()).unwrap_or(DEVICE_SCOPE);
        format!("{}{}", self.key_prefix, scope)
    }

    /// Stored entries as raw JSON, so entries this build cannot read are
    /// carried through rewrites instead of being dropped.
    async fn read_entries(&self, key: &str) -> Result<Vec<JsonValue>, StoreError> {
        read_array(self.kv.as_ref(), key).await
    }
}

#[async_trait]
impl ChatHistoryBackend for LocalChatHistory {
    fn requires_user(&self) -> bool {
        false
    }

    async fn load_recent(
        &self,
        user: Option<&AuthUser>,
        limit: usize
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let key = self.key_for(user);
        let entries = match self.read_entries(&key).await {
            Ok(entries) => entries,
            Err(StoreError::Serde(e)) => {
                error!("Error parsing chat history document '{}': {}", key, e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let mut messages: Vec<ChatMessage> = entries
            .into_iter()
            .filter_map(|entry| {
                match serde_json::from_value(entry) {
                    Ok(message) => Some(message),
                    Err(e) => {
                        warn!("Skipping unreadable chat message in '{}': {}", key, e);
                        None
                    }
                }
            })
            .collect();
        if messages.len() > limit {
            messages = messages.split_off(messages.len() - limit);
        }
        Ok(messages)
    }

    async fn append(
        &self,
        user: Option<&AuthUser>,
        message: NewChatMessage
    ) -> Result<ChatMessage, StoreError> {
        let key = self.key_for(user);
        // A document that does not parse is left alone rather than replaced.
        let mut entries = self.read_entries(&key).await?;
        let stored = ChatMessage {
            id: Uuid::new_v4().to_string(),
            text: message.text,
            is_user: message.is_user,
            timestamp: Utc::now(),
            response_data: message.response_data,
        };
        entries.push(serde_json::to_value(&stored)?);
        if entries.len() > self.cap {
            entries.drain(..entries.len() - self.cap);
        }
        write_array(self.kv.as_ref(), &key, &entries).await?;
        Ok(stored)
    }

    async fn clear(&self, user: Option<&AuthUser>) -> Result<(), StoreError> {
        self.kv.remove(&self.key_for(user)).await
    }
}
