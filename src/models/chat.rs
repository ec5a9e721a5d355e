use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use super::product::OutfitItem;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            last_message_at: now,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outfit_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outfit_items: Option<Vec<OutfitItem>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(conversation_id: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role: "user".to_string(),
            content: content.to_string(),
            outfit_image_url: None,
            outfit_items: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(
        conversation_id: &str,
        content: &str,
        outfit_image_url: Option<String>,
        outfit_items: Option<Vec<OutfitItem>>
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role: "assistant".to_string(),
            content: content.to_string(),
            outfit_image_url,
            outfit_items,
            created_at: Utc::now(),
        }
    }
}

/// One chat turn as posted by the client. Outfit state is client-echoed:
/// `prior_items` and `prior_outfit_image` are whatever the latest assistant
/// message handed back on the previous turn.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub prior_items: Vec<OutfitItem>,
    #[serde(default)]
    pub prior_outfit_image: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    pub id: String,
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outfit_image: Option<String>,
    pub products: Vec<OutfitItem>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub success: bool,
    pub message: AssistantReply,
    pub conversation_id: String,
}
