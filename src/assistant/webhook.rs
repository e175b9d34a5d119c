use async_trait::async_trait;
use chrono::{ SecondsFormat, Utc };
use log::{ debug, info };
use reqwest::Client as HttpClient;
use serde_json::Value as JsonValue;
use std::time::Duration;

use super::cards::{ cards_from_response, suggestions_from_response };
use super::{ AssistantClient, AssistantError };
use crate::cli::Args;
use crate::models::webhook::{ AssistantReply, WebhookRequest, ANONYMOUS_USER };

const DEFAULT_REPLY_TEXT: &str = "Here is what I found for you.";

pub struct WebhookAssistant {
    http: HttpClient,
    url: String,
}

impl WebhookAssistant {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, AssistantError> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { http, url: url.to_string() })
    }

    pub fn from_args(args: &Args) -> Result<Self, AssistantError> {
        info!("Assistant webhook: {} (timeout {}s)", args.webhook_url, args.webhook_timeout_secs);
        Self::new(&args.webhook_url, Duration::from_secs(args.webhook_timeout_secs))
    }
}

/// Reads the assistant body through fallback chains; unknown shapes degrade
/// to a plain text reply instead of failing.
pub fn reply_from_body(body: JsonValue) -> AssistantReply {
    let text = ["text", "response", "message", "output"]
        .iter()
        .find_map(|key| {
            body.get(*key)
                .and_then(JsonValue::as_str)
                .filter(|t| !t.trim().is_empty())
        })
        .unwrap_or(DEFAULT_REPLY_TEXT)
        .to_string();

    AssistantReply {
        text,
        cards: cards_from_response(&body),
        suggestions: suggestions_from_response(&body),
        raw: Some(body),
        degraded: false,
    }
}

#[async_trait]
impl AssistantClient for WebhookAssistant {
    async fn ask(&self, query: &str, user_id: Option<&str>) -> Result<AssistantReply, AssistantError> {
        let req = WebhookRequest {
            query: query.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            user_id: user_id.unwrap_or(ANONYMOUS_USER).to_string(),
        };
        debug!("POST {} for user {}", self.url, req.user_id);

        let resp = self.http.post(&self.url).json(&req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AssistantError::Status { status: status.as_u16(), body });
        }

        let raw = resp.text().await?;
        let body: JsonValue = serde_json
            ::from_str(&raw)
            .map_err(|e| AssistantError::Malformed(e.to_string()))?;
        // Some webhook runners wrap the payload in a one-element array.
        let body = match body {
            JsonValue::Array(mut items) if items.len() == 1 => items.remove(0),
            other => other,
        };
        Ok(reply_from_body(body))
    }
}
