use clap::Parser;

use stylist_agent::agent::StylistAgent;
use stylist_agent::cli::Args;
use stylist_agent::error::ApiError;
use stylist_agent::models::chat::TurnRequest;
use stylist_agent::models::user::{ Photo, Preferences, User };
use stylist_agent::store::Store as _;

fn default_args() -> Args {
    Args::parse_from(["stylist-agent"])
}

fn turn(message: &str) -> TurnRequest {
    TurnRequest {
        message: message.to_string(),
        conversation_id: None,
        prior_items: Vec::new(),
        prior_outfit_image: None,
    }
}

async fn agent_with_user(gender: Option<&str>, with_photo: bool) -> (StylistAgent, User) {
    let agent = StylistAgent::new(&default_args()).await.expect("agent");
    let store = agent.store();

    let mut user = User::new("tok-ada", "ada@example.com", Some("Ada".to_string()));
    user.preferences = Some(Preferences {
        gender: gender.map(String::from),
        sizes: None,
        budget_range: None,
    });
    if with_photo {
        let photo = Photo::new(&user.id, "https://photos.example.com/ada.jpg", true);
        user.primary_photo_id = Some(photo.id.clone());
        store.save_photos(&user.id, &[photo]).await.expect("photos");
    }
    store.put_user(&user).await.expect("user");

    (agent, user)
}

#[tokio::test]
async fn first_turn_builds_an_outfit_from_the_catalog() {
    let (agent, user) = agent_with_user(Some("women"), true).await;

    let response = agent.chat_turn(&user, turn("red jacket")).await.expect("turn");
    assert!(response.success);
    assert_eq!(response.message.role, "assistant");
    assert_eq!(response.message.products.len(), 1);
    assert!(response.message.products[0].name.to_lowercase().contains("jacket"));
    assert!(response.message.content.starts_with("Here's your look with:"));
    // No try-on endpoint configured, so no composite is produced.
    assert!(response.message.outfit_image.is_none());

    let messages = agent
        .store()
        .list_messages(&response.conversation_id).await
        .expect("messages");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[1].role, "assistant");
    assert!(messages[1].outfit_items.is_some());
}

#[tokio::test]
async fn same_category_turn_replaces_the_prior_item() {
    let (agent, user) = agent_with_user(Some("women"), true).await;

    let first = agent.chat_turn(&user, turn("red jacket")).await.expect("first turn");
    assert_eq!(first.message.products.len(), 1);

    let second = agent
        .chat_turn(&user, TurnRequest {
            message: "denim jacket".to_string(),
            conversation_id: Some(first.conversation_id.clone()),
            prior_items: first.message.products.clone(),
            prior_outfit_image: None,
        }).await
        .expect("second turn");

    assert_eq!(second.conversation_id, first.conversation_id);
    assert_eq!(second.message.products.len(), 1);
    assert!(second.message.content.starts_with("Updated your outfit!"));

    let messages = agent
        .store()
        .list_messages(&second.conversation_id).await
        .expect("messages");
    assert_eq!(messages.len(), 4);
}

#[tokio::test]
async fn different_category_turn_adds_to_the_outfit() {
    let (agent, user) = agent_with_user(Some("women"), true).await;

    let first = agent.chat_turn(&user, turn("red jacket")).await.expect("first turn");
    let second = agent
        .chat_turn(&user, TurnRequest {
            message: "black jeans".to_string(),
            conversation_id: Some(first.conversation_id.clone()),
            prior_items: first.message.products.clone(),
            prior_outfit_image: None,
        }).await
        .expect("second turn");

    assert_eq!(second.message.products.len(), 2);
    assert!(second.message.content.starts_with("Added to your outfit!"));
}

#[tokio::test]
async fn no_matches_yield_a_gendered_hint() {
    let (agent, user) = agent_with_user(Some("women"), true).await;

    let response = agent
        .chat_turn(&user, turn("something utterly unfindable"))
        .await
        .expect("turn");
    assert!(response.message.products.is_empty());
    assert!(response.message.content.contains("couldn't find good matches for women"));
}

#[tokio::test]
async fn missing_photo_blocks_the_turn() {
    let (agent, user) = agent_with_user(Some("women"), false).await;
    let err = agent.chat_turn(&user, turn("red jacket")).await.unwrap_err();
    assert!(matches!(err, ApiError::PhotoRequired));
}

#[tokio::test]
async fn withheld_gender_blocks_the_turn() {
    let (agent, user) = agent_with_user(Some("prefer-not-to-say"), true).await;
    let err = agent.chat_turn(&user, turn("red jacket")).await.unwrap_err();
    assert!(matches!(err, ApiError::GenderRequired));
}

#[tokio::test]
async fn unknown_conversation_is_not_found() {
    let (agent, user) = agent_with_user(Some("women"), true).await;
    let err = agent
        .chat_turn(&user, TurnRequest {
            message: "red jacket".to_string(),
            conversation_id: Some("not-a-conversation".to_string()),
            prior_items: Vec::new(),
            prior_outfit_image: None,
        }).await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}
