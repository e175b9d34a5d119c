use std::sync::Arc;
use log::{ error, warn };

use crate::assistant::{ fallback_reply, AssistantClient };
use crate::error::StoreError;
use crate::models::webhook::AssistantReply;
use crate::session::Session;
use crate::stores::ChatHistoryStore;

/// Chat flow: record the user's turn, ask the assistant, record its answer.
/// History failures never block the reply; assistant failures turn into the
/// canned fallback message.
pub struct Concierge {
    assistant: Arc<dyn AssistantClient>,
    history: Arc<ChatHistoryStore>,
    session: Session,
}

impl Concierge {
    pub fn new(
        assistant: Arc<dyn AssistantClient>,
        history: Arc<ChatHistoryStore>,
        session: Session
    ) -> Self {
        Self { assistant, history, session }
    }

    pub async fn send(&self, text: &str) -> Option<AssistantReply> {
        let query = text.trim();
        if query.is_empty() {
            return None;
        }

        record(self.history.append_message(query, true, None).await, "user");

        let user_id = self.session.current_user().await.map(|u| u.id);
        let reply = match self.assistant.ask(query, user_id.as_deref()).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Assistant request failed: {}", e);
                fallback_reply()
            }
        };

        record(
            self.history.append_message(&reply.text, false, reply.raw.clone()).await,
            "assistant"
        );
        Some(reply)
    }
}

fn record<T>(result: Result<T, StoreError>, role: &str) {
    match result {
        Ok(_) | Err(StoreError::Unauthenticated) => {}
        Err(e) => warn!("History write ({}) failed: {}", role, e),
    }
}
