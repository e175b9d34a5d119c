use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use tokio::sync::Mutex;
use serde_json::Value as JsonValue;
use log::{ debug, warn };

use crate::error::StoreError;
use crate::models::chat::{ ChatMessage, NewChatMessage };
use crate::session::Session;
use crate::storage::ChatHistoryBackend;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Append-only chat log cached in memory, oldest turn first. Writes queue on
/// `write_gate`; the cache lock is never held across a backend call.
pub struct ChatHistoryStore {
    backend: Arc<dyn ChatHistoryBackend>,
    session: Session,
    limit: usize,
    messages: Mutex<Vec<ChatMessage>>,
    write_gate: Mutex<()>,
    loading: AtomicBool,
}

impl ChatHistoryStore {
    pub fn new(backend: Arc<dyn ChatHistoryBackend>, session: Session, limit: usize) -> Self {
        Self {
            backend,
            session,
            limit: limit.max(1),
            messages: Mutex::new(Vec::new()),
            write_gate: Mutex::new(()),
            loading: AtomicBool::new(false),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub async fn load(&self) -> Result<usize, StoreError> {
        let _gate = self.write_gate.lock().await;
        let user = self.session.current_user().await;
        if self.backend.requires_user() && user.is_none() {
            self.messages.lock().await.clear();
            return Ok(0);
        }

        self.loading.store(true, Ordering::SeqCst);
        let result = self.backend.load_recent(user.as_ref(), self.limit).await;
        self.loading.store(false, Ordering::SeqCst);

        match result {
            Ok(loaded) => {
                let count = loaded.len();
                *self.messages.lock().await = loaded;
                debug!("Loaded {} chat messages", count);
                Ok(count)
            }
            Err(e) => {
                warn!("Error loading chat history: {}", e);
                Err(e)
            }
        }
    }

    pub async fn refresh(&self) -> Result<usize, StoreError> {
        self.load().await
    }

    /// Persists one turn and appends the stored copy to the cache.
    pub async fn append_message(
        &self,
        text: &str,
        is_user: bool,
        response_data: Option<JsonValue>
    ) -> Result<ChatMessage, StoreError> {
        let user = self.session.current_user().await;
        if self.backend.requires_user() && user.is_none() {
            debug!("Not recording chat turn: no signed-in user");
            return Err(StoreError::Unauthenticated);
        }

        let message = NewChatMessage {
            text: text.to_string(),
            is_user,
            response_data,
        };
        let _gate = self.write_gate.lock().await;
        match self.backend.append(user.as_ref(), message).await {
            Ok(stored) => {
                self.messages.lock().await.push(stored.clone());
                Ok(stored)
            }
            Err(e) => {
                warn!("Error saving message: {}", e);
                Err(e)
            }
        }
    }

    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let user = self.session.current_user().await;
        if self.backend.requires_user() && user.is_none() {
            return Err(StoreError::Unauthenticated);
        }

        let _gate = self.write_gate.lock().await;
        if let Err(e) = self.backend.clear(user.as_ref()).await {
            warn!("Error clearing chat history: {}", e);
            return Err(e);
        }
        self.messages.lock().await.clear();
        Ok(())
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn on_sign_out(&self) {
        self.messages.lock().await.clear();
    }
}
