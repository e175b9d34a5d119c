use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use log::{ info, warn };
use serde::{ Deserialize, Serialize };
use serde_json::Value as JsonValue;

use super::postgrest::{ Filter, Order, PostgrestClient };
use super::{ ChatHistoryBackend, SavedItemsBackend };
use crate::error::StoreError;
use crate::models::chat::{ ChatMessage, NewChatMessage };
use crate::models::profile::{ DurationUnit, GeoLocation, OnboardingData, UserProfile, UserType };
use crate::models::saved::SavedItem;
use crate::session::AuthUser;

const SAVED_ITEMS_TABLE: &str = "saved_items";
const CHAT_HISTORY_TABLE: &str = "chat_history";
const PROFILES_TABLE: &str = "profiles";

fn require_user(user: Option<&AuthUser>) -> Result<&AuthUser, StoreError> {
    user.ok_or(StoreError::Unauthenticated)
}

#[derive(Deserialize)]
struct SavedItemRow {
    item_id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    location: Option<String>,
    image_url: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    rating: Option<f64>,
    price: Option<String>,
    metadata: Option<JsonValue>,
}

impl From<SavedItemRow> for SavedItem {
    fn from(row: SavedItemRow) -> Self {
        SavedItem {
            id: row.item_id,
            title: row.title,
            description: row.description,
            category: row.category,
            location: row.location,
            image_url: row.image_url,
            phone: row.phone,
            website: row.website,
            rating: row.rating,
            price: row.price,
            metadata: row.metadata,
        }
    }
}

#[derive(Serialize)]
struct NewSavedItemRow<'a> {
    user_id: &'a str,
    item_id: &'a str,
    title: &'a str,
    description: &'a str,
    category: &'a str,
    location: Option<&'a str>,
    image_url: Option<&'a str>,
    phone: Option<&'a str>,
    website: Option<&'a str>,
    rating: Option<f64>,
    price: Option<&'a str>,
    metadata: Option<&'a JsonValue>,
}

impl<'a> NewSavedItemRow<'a> {
    fn new(user_id: &'a str, item: &'a SavedItem) -> Self {
        Self {
            user_id,
            item_id: &item.id,
            title: &item.title,
            description: &item.description,
            category: &item.category,
            location: item.location.as_deref(),
            image_url: item.image_url.as_deref(),
            phone: item.phone.as_deref(),
            website: item.website.as_deref(),
            rating: item.rating,
            price: item.price.as_deref(),
            metadata: item.metadata.as_ref(),
        }
    }
}

/// Saved set of the signed-in user, one row per (user_id, item_id).
pub struct RemoteSavedItems {
    client: PostgrestClient,
}

impl RemoteSavedItems {
    pub fn new(client: PostgrestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SavedItemsBackend for RemoteSavedItems {
    fn requires_user(&self) -> bool {
        true
    }

    async fn load(&self, user: Option<&AuthUser>) -> Result<Vec<SavedItem>, StoreError> {
        let user = require_user(user)?;
        let rows: Vec<SavedItemRow> = self.client.select(
            SAVED_ITEMS_TABLE,
            Some(user),
            &[Filter::eq("user_id", &user.id)],
            Some(Order::desc("created_at")),
            None
        ).await?;
        Ok(rows.into_iter().map(SavedItem::from).collect())
    }

    async fn insert(&self, user: Option<&AuthUser>, item: &SavedItem) -> Result<(), StoreError> {
        let user = require_user(user)?;
        let row = NewSavedItemRow::new(&user.id, item);
        match self.client.insert::<_, JsonValue>(SAVED_ITEMS_TABLE, Some(user), &row).await {
            Ok(_) => Ok(()),
            Err(StoreError::Conflict(body)) => {
                info!("Item {} was already saved for {}: {}", item.id, user.id, body);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn remove(&self, user: Option<&AuthUser>, item_id: &str) -> Result<(), StoreError> {
        let user = require_user(user)?;
        self.client.delete(
            SAVED_ITEMS_TABLE,
            Some(user),
            &[Filter::eq("user_id", &user.id), Filter::eq("item_id", item_id)]
        ).await
    }

    async fn clear(&self, user: Option<&AuthUser>) -> Result<(), StoreError> {
        let user = require_user(user)?;
        self.client.delete(SAVED_ITEMS_TABLE, Some(user), &[Filter::eq("user_id", &user.id)]).await
    }
}

#[derive(Deserialize)]
struct ChatHistoryRow {
    id: String,
    message: String,
    is_user: bool,
    response_data: Option<JsonValue>,
    created_at: DateTime<Utc>,
}

impl From<ChatHistoryRow> for ChatMessage {
    fn from(row: ChatHistoryRow) -> Self {
        ChatMessage {
            id: row.id,
            text: row.message,
            is_user: row.is_user,
            timestamp: row.created_at,
            response_data: row.response_data,
        }
    }
}

#[derive(Serialize)]
struct NewChatHistoryRow<'a> {
    user_id: &'a str,
    message: &'a str,
    is_user: bool,
    response_data: Option<&'a JsonValue>,
}

pub struct RemoteChatHistory {
    client: PostgrestClient,
}

impl RemoteChatHistory {
    pub fn new(client: PostgrestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatHistoryBackend for RemoteChatHistory {
    fn requires_user(&self) -> bool {
        true
    }

    async fn load_recent(
        &self,
        user: Option<&AuthUser>,
        limit: usize
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let user = require_user(user)?;
        let rows: Vec<ChatHistoryRow> = self.client.select(
            CHAT_HISTORY_TABLE,
            Some(user),
            &[Filter::eq("user_id", &user.id)],
            Some(Order::desc("created_at")),
            Some(limit)
        ).await?;
        let mut messages: Vec<ChatMessage> = rows.into_iter().map(ChatMessage::from).collect();
        messages.reverse();
        Ok(messages)
    }

    async fn append(
        &self,
        user: Option<&AuthUser>,
        message: NewChatMessage
    ) -> Result<ChatMessage, StoreError> {
        let user = require_user(user)?;
        let row = NewChatHistoryRow {
            user_id: &user.id,
            message: &message.text,
            is_user: message.is_user,
            response_data: message.response_data.as_ref(),
        };
        let stored: ChatHistoryRow = self.client.insert(CHAT_HISTORY_TABLE, Some(user), &row).await?;
        Ok(stored.into())
    }

    async fn clear(&self, user: Option<&AuthUser>) -> Result<(), StoreError> {
        let user = require_user(user)?;
        self.client.delete(CHAT_HISTORY_TABLE, Some(user), &[Filter::eq("user_id", &user.id)]).await
    }
}

#[derive(Serialize)]
struct OnboardingRow<'a> {
    id: &'a str,
    email: &'a str,
    full_name: Option<&'a str>,
    onboarding_completed: bool,
    onboarding_completed_at: DateTime<Utc>,
    user_type: Option<UserType>,
    country_of_origin: Option<&'a str>,
    duration_of_stay: Option<&'a str>,
    duration_unit: DurationUnit,
    preferred_language: &'a str,
    location_permission_granted: bool,
    current_location: Option<&'a GeoLocation>,
    interests: &'a [String],
    accommodation_preferences: &'a [String],
    activity_preferences: &'a [String],
    food_preferences: &'a [String],
    budget_range: Option<&'a str>,
    travel_style: &'a [String],
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|v| !v.is_empty())
}

/// Profile and onboarding answers of the signed-in user.
pub struct ProfileRepository {
    client: PostgrestClient,
}

impl ProfileRepository {
    pub fn new(client: PostgrestClient) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, user: Option<&AuthUser>) -> Result<Option<UserProfile>, StoreError> {
        let user = require_user(user)?;
        let rows: Vec<UserProfile> = self.client.select(
            PROFILES_TABLE,
            Some(user),
            &[Filter::eq("id", &user.id)],
            None,
            Some(1)
        ).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn complete_onboarding(
        &self,
        user: Option<&AuthUser>,
        data: &OnboardingData
    ) -> Result<UserProfile, StoreError> {
        let user = require_user(user)?;
        let email = user.email.as_deref().unwrap_or_default();
        if email.is_empty() {
            warn!("Completing onboarding for {} without an email on the session", user.id);
        }
        let row = OnboardingRow {
            id: &user.id,
            email,
            full_name: non_empty(&data.full_name),
            onboarding_completed: true,
            onboarding_completed_at: Utc::now(),
            user_type: data.user_type,
            country_of_origin: non_empty(&data.country_of_origin),
            duration_of_stay: non_empty(&data.duration_of_stay),
            duration_unit: data.duration_unit,
            preferred_language: &data.preferred_language,
            location_permission_granted: data.location_permission_granted,
            current_location: data.current_location.as_ref(),
            interests: &data.interests,
            accommodation_preferences: &data.accommodation_preferences,
            activity_preferences: &data.activity_preferences,
            food_preferences: &data.food_preferences,
            budget_range: non_empty(&data.budget_range),
            travel_style: &data.travel_style,
        };
        let profile = self.client.upsert(PROFILES_TABLE, Some(user), &row, "id").await?;
        info!("Onboarding completed for {}", user.id);
        Ok(profile)
    }
}
