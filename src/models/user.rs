use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sizes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoes: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Sizes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_range: Option<(f64, f64)>,
}

impl Preferences {
    /// Gender is usable for try-on only when set to something other than
    /// "prefer-not-to-say".
    pub fn usable_gender(&self) -> Option<&str> {
        match self.gender.as_deref() {
            Some("prefer-not-to-say") | None => None,
            Some(g) => Some(g),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Opaque identifier issued by the external auth collaborator.
    pub auth_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_photo_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(auth_id: &str, email: &str, name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            auth_id: auth_id.to_string(),
            email: email.to_string(),
            name,
            preferences: None,
            primary_photo_id: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub is_primary: bool,
    pub uploaded_at: DateTime<Utc>,
}

impl Photo {
    pub fn new(user_id: &str, url: &str, is_primary: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            url: url.to_string(),
            is_primary,
            uploaded_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl Collection {
    pub fn new(user_id: &str, name: &str, is_default: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            is_default,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItem {
    pub id: String,
    pub collection_id: String,
    pub product_id: String,
    pub added_at: DateTime<Utc>,
}

impl CollectionItem {
    pub fn new(collection_id: &str, product_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            collection_id: collection_id.to_string(),
            product_id: product_id.to_string(),
            added_at: Utc::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swipe {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub direction: SwipeDirection,
    pub session_id: String,
    pub card_position: i32,
    pub swiped_at: DateTime<Utc>,
}
