use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize, Deserializer };
use serde_json::Value as JsonValue;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Local,
    Tourist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    #[default]
    Days,
    Weeks,
    Months,
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(UserType::Local),
            "tourist" => Ok(UserType::Tourist),
            _ => Err(format!("Invalid user type: '{}'", s)),
        }
    }
}

impl FromStr for DurationUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "days" => Ok(DurationUnit::Days),
            "weeks" => Ok(DurationUnit::Weeks),
            "months" => Ok(DurationUnit::Months),
            _ => Err(format!("Invalid duration unit: '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Answers collected by the onboarding wizard.
#[derive(Debug, Clone, PartialEq)]
pub struct OnboardingData {
    pub user_type: Option<UserType>,
    pub full_name: String,
    pub country_of_origin: String,
    pub duration_of_stay: String,
    pub duration_unit: DurationUnit,
    pub preferred_language: String,
    pub interests: Vec<String>,
    pub accommodation_preferences: Vec<String>,
    pub activity_preferences: Vec<String>,
    pub food_preferences: Vec<String>,
    pub budget_range: String,
    pub travel_style: Vec<String>,
    pub location_permission_granted: bool,
    pub current_location: Option<GeoLocation>,
}

impl Default for OnboardingData {
    fn default() -> Self {
        Self {
            user_type: None,
            full_name: String::new(),
            country_of_origin: String::new(),
            duration_of_stay: String::new(),
            duration_unit: DurationUnit::Days,
            preferred_language: "English".to_string(),
            interests: Vec::new(),
            accommodation_preferences: Vec::new(),
            activity_preferences: Vec::new(),
            food_preferences: Vec::new(),
            budget_range: String::new(),
            travel_style: Vec::new(),
            location_permission_granted: false,
            current_location: None,
        }
    }
}

/// Row of the `profiles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub preferences: Option<JsonValue>,
    #[serde(default)]
    pub onboarding_completed: bool,
    #[serde(default)]
    pub user_type: Option<UserType>,
    #[serde(default)]
    pub country_of_origin: Option<String>,
    #[serde(default)]
    pub duration_of_stay: Option<String>,
    #[serde(default)]
    pub duration_unit: Option<DurationUnit>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub location_permission_granted: bool,
    #[serde(default)]
    pub current_location: Option<GeoLocation>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub interests: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub accommodation_preferences: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub activity_preferences: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub food_preferences: Vec<String>,
    #[serde(default)]
    pub budget_range: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub travel_style: Vec<String>,
    #[serde(default)]
    pub onboarding_completed_at: Option<DateTime<Utc>>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where D: Deserializer<'de>
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_row_accepts_null_json_lists() {
        let raw = serde_json::json!({
            "id": "u1",
            "email": "guest@example.com",
            "interests": null,
            "travel_style": ["relaxed"],
            "user_type": "tourist",
            "duration_unit": "weeks"
        });
        let profile: UserProfile = serde_json::from_value(raw).unwrap();
        assert!(profile.interests.is_empty());
        assert_eq!(profile.travel_style, vec!["relaxed".to_string()]);
        assert_eq!(profile.user_type, Some(UserType::Tourist));
        assert_eq!(profile.duration_unit, Some(DurationUnit::Weeks));
        assert!(!profile.onboarding_completed);
    }

    #[test]
    fn onboarding_enums_parse_case_insensitively() {
        assert_eq!("Tourist".parse::<UserType>(), Ok(UserType::Tourist));
        assert_eq!("months".parse::<DurationUnit>(), Ok(DurationUnit::Months));
        assert!("visitor".parse::<UserType>().is_err());
    }
}
