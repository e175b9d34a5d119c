use serde_json::{ Map, Value as JsonValue };
use uuid::Uuid;

use crate::models::saved::SavedItem;
use crate::models::webhook::Suggestion;

const UNKNOWN_TITLE: &str = "Unknown";
const DEFAULT_CATEGORY: &str = "General";
const METADATA_FIELDS: [&str; 3] = ["duration", "highlights", "availability"];

fn text_field(item: &Map<String, JsonValue>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        match item.get(*key)? {
            JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    })
}

fn number_field(item: &Map<String, JsonValue>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| {
        match item.get(*key)? {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    })
}

fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// Id for a record the assistant sent without one. Built from the record's
/// own text so the same card gets the same id in every reply; records with no
/// usable text hash their whole body.
fn fallback_id(item: &Map<String, JsonValue>) -> String {
    let parts: Vec<String> = [
        &["name", "title"][..],
        &["short_description", "description"][..],
        &["address", "location"][..],
    ]
        .iter()
        .filter_map(|keys| text_field(item, keys))
        .collect();
    let id = slug(&parts.join(" "));
    if !id.is_empty() {
        return id;
    }
    let body = JsonValue::Object(item.clone()).to_string();
    format!("card-{}", Uuid::new_v5(&Uuid::NAMESPACE_OID, body.as_bytes()).simple())
}

/// Maps one loosely-shaped record from the assistant into a card.
pub fn card_from_value(value: &JsonValue, content_type: Option<&str>) -> Option<SavedItem> {
    let item = value.as_object()?;

    let title = text_field(item, &["name", "title"]).unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let id = text_field(item, &["id", "item_id"]).unwrap_or_else(|| fallback_id(item));

    let mut metadata = Map::new();
    for key in METADATA_FIELDS {
        if let Some(v) = item.get(key).filter(|v| !v.is_null()) {
            metadata.insert(key.to_string(), v.clone());
        }
    }

    Some(SavedItem {
        id,
        title,
        description: text_field(item, &["short_description", "description"]).unwrap_or_default(),
        category: text_field(item, &["category"])
            .or_else(|| content_type.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        location: text_field(item, &["address", "location"]),
        image_url: text_field(item, &["image", "imageUrl", "image_url"]),
        phone: text_field(item, &["contact_phone", "phone"]),
        website: text_field(item, &["website_url", "website"]),
        rating: number_field(item, &["average_rating", "rating"]),
        price: text_field(item, &["price"]),
        metadata: if metadata.is_empty() { None } else { Some(JsonValue::Object(metadata)) },
    })
}

/// Cards carried by `richContent`: an array yields many, an object yields one.
pub fn cards_from_response(body: &JsonValue) -> Vec<SavedItem> {
    let Some(rich) = body.get("richContent").or_else(|| body.get("rich_content")) else {
        return Vec::new();
    };
    let content_type = rich.get("type").and_then(JsonValue::as_str);
    match rich.get("data") {
        Some(JsonValue::Array(entries)) =>
            entries
                .iter()
                .filter_map(|entry| card_from_value(entry, content_type))
                .collect(),
        Some(entry) if entry.is_object() =>
            card_from_value(entry, content_type).into_iter().collect(),
        _ => Vec::new(),
    }
}

pub fn suggestions_from_response(body: &JsonValue) -> Vec<Suggestion> {
    body.get("suggestions")
        .and_then(JsonValue::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let text = entry.get("text").and_then(JsonValue::as_str)?.to_string();
                    let query = entry
                        .get("query")
                        .and_then(JsonValue::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| text.clone());
                    Some(Suggestion { text, query })
                })
                .collect()
        })
        .unwrap_or_default()
}
