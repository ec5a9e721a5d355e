use axum::extract::{ Path, Query, State };
use axum::http::{ header, HeaderMap, StatusCode };
use axum::response::{ IntoResponse, Response };
use axum::routing::{ get, post, put };
use axum::{ Json, Router };
use governor::{ clock::DefaultClock, state::{ InMemoryState, NotKeyed }, Quota, RateLimiter };
use lazy_static::lazy_static;
use log::info;
use serde::Deserialize;
use serde_json::{ json, Value };
use std::error::Error;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tower_http::cors::{ Any, CorsLayer };
use uuid::Uuid;

use crate::agent::StylistAgent;
use crate::cli::Args;
use crate::error::ApiError;
use crate::models::chat::TurnRequest;
use crate::models::product::ProductFilter;
use crate::models::user::{
    Collection,
    CollectionItem,
    Photo,
    Preferences,
    Swipe,
    SwipeDirection,
    User,
};
use crate::store::Store;

const MAX_PHOTOS_PER_USER: usize = 5;
const DEFAULT_LIST_COUNT: usize = 15;

lazy_static! {
    static ref CHAT_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> = RateLimiter::direct(
        Quota::per_second(NonZeroU32::new(10).unwrap())
    );
}

#[derive(Clone)]
struct AppState {
    agent: Arc<StylistAgent>,
    store: Arc<dyn Store>,
}

pub async fn serve(
    addr: &str,
    agent: Arc<StylistAgent>,
    args: &Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr: SocketAddr = addr.parse()?;

    let state = AppState {
        store: agent.store(),
        agent,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_post).get(chat_get).delete(chat_delete))
        .route("/api/products", get(products_get))
        .route("/api/search/products", get(search_products_get))
        .route("/api/user/profile", post(profile_post).get(profile_get).put(profile_put))
        .route("/api/user/photos", post(photos_post).get(photos_get))
        .route("/api/user/photos/{photo_id}", axum::routing::delete(photo_delete).put(photo_put))
        .route("/api/user/photos/{photo_id}/primary", put(photo_primary_put))
        .route("/api/collections", get(collections_get).post(collections_post))
        .route(
            "/api/collections/{collection_id}/items/{item_id}",
            axum::routing::delete(collection_item_delete)
        )
        .route("/api/swipes", post(swipes_post).get(swipes_get))
        .layer(cors)
        .with_state(state);

    if args.enable_tls && args.tls_cert_path.is_some() && args.tls_key_path.is_some() {
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            args.tls_cert_path.as_ref().unwrap(),
            args.tls_key_path.as_ref().unwrap()
        ).await?;
        info!("HTTPS server listening on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("HTTP server listening on: http://{}", addr);
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolve the bearer token (the opaque user identifier issued by the
/// external auth collaborator) to a stored user.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    state.store
        .get_user(&token).await
        .map_err(|e| ApiError::internal("Failed to load user", e))?
        .ok_or(ApiError::UserNotFound)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// --- Chat ---

async fn chat_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TurnRequest>
) -> Result<Response, ApiError> {
    if CHAT_LIMITER.check().is_err() {
        return Ok(
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Too many requests" })),
            ).into_response()
        );
    }
    let user = authenticate(&state, &headers).await?;
    let response = state.agent.chat_turn(&user, body).await?;
    Ok(Json(response).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatHistoryParams {
    conversation_id: Option<String>,
    #[serde(default)]
    all: bool,
}

async fn chat_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ChatHistoryParams>
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;

    if params.all {
        let conversations = state.store
            .list_conversations(&user.id).await
            .map_err(|e| ApiError::internal("Failed to load conversations", e))?;
        return Ok(Json(json!({ "success": true, "conversations": conversations })));
    }

    let conversation = match &params.conversation_id {
        Some(id) =>
            state.store
                .get_conversation(id).await
                .map_err(|e| ApiError::internal("Failed to load conversation", e))?
                .filter(|c| c.user_id == user.id),
        None =>
            state.store
                .list_conversations(&user.id).await
                .map_err(|e| ApiError::internal("Failed to load conversations", e))?
                .into_iter()
                .next(),
    };

    let messages = match &conversation {
        Some(c) =>
            state.store
                .list_messages(&c.id).await
                .map_err(|e| ApiError::internal("Failed to load messages", e))?,
        None => Vec::new(),
    };

    Ok(
        Json(
            json!({
                "success": true,
                "conversation": conversation,
                "messages": messages,
            })
        )
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatDeleteParams {
    conversation_id: Option<String>,
}

async fn chat_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ChatDeleteParams>
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let conversation_id = params.conversation_id.ok_or_else(||
        ApiError::BadRequest("conversationId is required".to_string())
    )?;

    let conversation = state.store
        .get_conversation(&conversation_id).await
        .map_err(|e| ApiError::internal("Failed to load conversation", e))?
        .filter(|c| c.user_id == user.id)
        .ok_or(ApiError::NotFound("Conversation"))?;

    state.store
        .delete_conversation(&conversation.id).await
        .map_err(|e| ApiError::internal("Failed to delete conversation", e))?;
    Ok(Json(json!({ "success": true })))
}

// --- Products & search ---

#[derive(Deserialize)]
struct ProductListParams {
    filter: Option<String>,
    count: Option<usize>,
}

async fn products_get(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>
) -> Result<Json<Value>, ApiError> {
    let filter: ProductFilter = params.filter
        .as_deref()
        .unwrap_or("")
        .parse()
        .unwrap_or(ProductFilter::Any);
    let count = params.count.unwrap_or(DEFAULT_LIST_COUNT);

    let products = state.store
        .list_products(filter, count).await
        .map_err(|e| ApiError::internal("Failed to fetch products", e))?;
    Ok(Json(json!({ "products": products, "count": products.len() })))
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    count: Option<usize>,
}

async fn search_products_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>
) -> Result<Json<Value>, ApiError> {
    // Anonymous search is allowed; preferences only enhance the query when
    // the caller authenticates.
    let preferences: Option<Preferences> = match authenticate(&state, &headers).await {
        Ok(user) => user.preferences,
        Err(_) => None,
    };

    let q = params.q.unwrap_or_default();
    let count = params.count.unwrap_or(DEFAULT_LIST_COUNT);

    let candidates = if q.trim().is_empty() {
        let mut products = state.store
            .list_products(ProductFilter::Trending, count).await
            .map_err(|e| ApiError::internal("Failed to fetch products", e))?;
        if products.is_empty() {
            products = state.store
                .list_products(ProductFilter::Any, count).await
                .map_err(|e| ApiError::internal("Failed to fetch products", e))?;
        }
        products
            .iter()
            .map(|p| p.to_candidate())
            .collect()
    } else {
        state.agent.search_adapter().search_with_limit(&q, preferences.as_ref(), count).await
    };

    let source = if candidates.first().map(|c| c.is_external).unwrap_or(false) {
        "external"
    } else {
        "internal"
    };
    Ok(
        Json(
            json!({
                "products": candidates,
                "count": candidates.len(),
                "source": source,
            })
        )
    )
}

// --- Profile ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRequest {
    name: Option<String>,
    email: Option<String>,
    preferences: Option<Preferences>,
    #[serde(default)]
    photo_urls: Vec<String>,
    primary_photo_index: Option<usize>,
}

async fn profile_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ProfileRequest>
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::Unauthorized)?;

    let existing = state.store
        .get_user(&token).await
        .map_err(|e| ApiError::internal("Failed to load user", e))?;

    let mut user = match existing {
        Some(mut user) => {
            if body.name.is_some() {
                user.name = body.name.clone();
            }
            if body.preferences.is_some() {
                user.preferences = body.preferences.clone();
            }
            user
        }
        None => {
            let mut user = User::new(
                &token,
                body.email.as_deref().unwrap_or(""),
                body.name.clone()
            );
            user.preferences = body.preferences.clone();
            state.store
                .create_collection(&Collection::new(&user.id, "Likes", true)).await
                .map_err(|e| ApiError::internal("Failed to create default collection", e))?;
            user
        }
    };

    if !body.photo_urls.is_empty() {
        let mut photos = state.store
            .list_photos(&user.id).await
            .map_err(|e| ApiError::internal("Failed to load photos", e))?;
        let had_no_photos = photos.is_empty();
        let primary_index = body.primary_photo_index.unwrap_or(0);
        let room = MAX_PHOTOS_PER_USER.saturating_sub(photos.len());
        for (i, url) in body.photo_urls.iter().take(room).enumerate() {
            let is_primary = had_no_photos && i == primary_index;
            let photo = Photo::new(&user.id, url, is_primary);
            if is_primary {
                user.primary_photo_id = Some(photo.id.clone());
            }
            photos.push(photo);
        }
        // A primary index past the provided list falls back to the first.
        if had_no_photos && user.primary_photo_id.is_none() {
            if let Some(first) = photos.first_mut() {
                first.is_primary = true;
                user.primary_photo_id = Some(first.id.clone());
            }
        }
        state.store
            .save_photos(&user.id, &photos).await
            .map_err(|e| ApiError::internal("Failed to save photos", e))?;
    }

    state.store
        .put_user(&user).await
        .map_err(|e| ApiError::internal("Failed to save user", e))?;

    Ok(Json(json!({ "success": true, "user": user, "message": "Profile saved" })))
}

async fn profile_get(
    State(state): State<AppState>,
    headers: HeaderMap
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let photos = state.store
        .list_photos(&user.id).await
        .map_err(|e| ApiError::internal("Failed to load photos", e))?;

    let mut user_value = serde_json
        ::to_value(&user)
        .map_err(|e| ApiError::internal("Failed to serialize user", e))?;
    user_value["photos"] = serde_json
        ::to_value(&photos)
        .map_err(|e| ApiError::internal("Failed to serialize photos", e))?;
    Ok(Json(json!({ "user": user_value })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUpdate {
    name: Option<String>,
    preferences: Option<Preferences>,
}

async fn profile_put(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ProfileUpdate>
) -> Result<Json<Value>, ApiError> {
    let mut user = authenticate(&state, &headers).await?;
    if body.name.is_some() {
        user.name = body.name;
    }
    if body.preferences.is_some() {
        user.preferences = body.preferences;
    }
    state.store
        .put_user(&user).await
        .map_err(|e| ApiError::internal("Failed to save user", e))?;
    Ok(Json(json!({ "success": true, "user": user })))
}

// --- Photos ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotosRequest {
    #[serde(default)]
    photo_urls: Vec<String>,
}

async fn photos_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PhotosRequest>
) -> Result<Json<Value>, ApiError> {
    let mut user = authenticate(&state, &headers).await?;
    if body.photo_urls.is_empty() {
        return Err(ApiError::BadRequest("No photo URLs provided".to_string()));
    }

    let mut photos = state.store
        .list_photos(&user.id).await
        .map_err(|e| ApiError::internal("Failed to load photos", e))?;
    if photos.len() >= MAX_PHOTOS_PER_USER {
        return Err(
            ApiError::BadRequest(format!("Maximum {} photos allowed", MAX_PHOTOS_PER_USER))
        );
    }

    let had_no_photos = photos.is_empty();
    let room = MAX_PHOTOS_PER_USER - photos.len();
    let mut has_set_primary = false;
    for url in body.photo_urls.iter().take(room) {
        // Only the first inserted photo becomes primary, and only when the
        // user had none.
        let is_primary = had_no_photos && !has_set_primary;
        let photo = Photo::new(&user.id, url, is_primary);
        if is_primary {
            user.primary_photo_id = Some(photo.id.clone());
            has_set_primary = true;
        }
        photos.push(photo);
    }

    state.store
        .save_photos(&user.id, &photos).await
        .map_err(|e| ApiError::internal("Failed to save photos", e))?;
    if has_set_primary {
        state.store
            .put_user(&user).await
            .map_err(|e| ApiError::internal("Failed to save user", e))?;
    }
    Ok(Json(json!({ "success": true, "message": "Photos added successfully" })))
}

async fn photos_get(
    State(state): State<AppState>,
    headers: HeaderMap
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let photos = state.store
        .list_photos(&user.id).await
        .map_err(|e| ApiError::internal("Failed to load photos", e))?;
    Ok(Json(json!({ "success": true, "photos": photos })))
}

async fn photo_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(photo_id): Path<String>
) -> Result<Json<Value>, ApiError> {
    let mut user = authenticate(&state, &headers).await?;
    let photo_id = photo_id.trim();
    if photo_id.is_empty() {
        return Err(ApiError::BadRequest("Invalid photo id".to_string()));
    }

    let mut photos = state.store
        .list_photos(&user.id).await
        .map_err(|e| ApiError::internal("Failed to load photos", e))?;
    let target = photos
        .iter()
        .find(|p| p.id == photo_id)
        .cloned()
        .ok_or(ApiError::NotFound("Photo"))?;
    photos.retain(|p| p.id != photo_id);

    // Deleting the primary promotes the first remaining photo, if any.
    if target.is_primary {
        if let Some(next) = photos.first_mut() {
            next.is_primary = true;
            user.primary_photo_id = Some(next.id.clone());
            info!("Promoted new primary photo: {}", next.id);
        } else {
            user.primary_photo_id = None;
        }
    }

    state.store
        .save_photos(&user.id, &photos).await
        .map_err(|e| ApiError::internal("Failed to save photos", e))?;
    state.store
        .put_user(&user).await
        .map_err(|e| ApiError::internal("Failed to save user", e))?;

    Ok(
        Json(
            json!({
                "success": true,
                "message": "Photo deleted successfully",
                "deletedPhotoId": photo_id,
            })
        )
    )
}

#[derive(Deserialize)]
struct PhotoUpdate {
    url: Option<String>,
}

async fn photo_put(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(photo_id): Path<String>,
    Json(body): Json<PhotoUpdate>
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let url = body.url.filter(|u| !u.is_empty()).ok_or_else(||
        ApiError::BadRequest("url is required to replace a photo".to_string())
    )?;

    let mut photos = state.store
        .list_photos(&user.id).await
        .map_err(|e| ApiError::internal("Failed to load photos", e))?;
    let photo = photos
        .iter_mut()
        .find(|p| p.id == photo_id)
        .ok_or(ApiError::NotFound("Photo"))?;
    photo.url = url;
    let updated = photo.clone();

    state.store
        .save_photos(&user.id, &photos).await
        .map_err(|e| ApiError::internal("Failed to save photos", e))?;
    Ok(Json(json!({ "success": true, "photo": updated })))
}

async fn photo_primary_put(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(photo_id): Path<String>
) -> Result<Json<Value>, ApiError> {
    let mut user = authenticate(&state, &headers).await?;
    let mut photos = state.store
        .list_photos(&user.id).await
        .map_err(|e| ApiError::internal("Failed to load photos", e))?;
    if !photos.iter().any(|p| p.id == photo_id) {
        return Err(ApiError::NotFound("Photo"));
    }

    for photo in photos.iter_mut() {
        photo.is_primary = photo.id == photo_id;
    }
    user.primary_photo_id = Some(photo_id.clone());

    state.store
        .save_photos(&user.id, &photos).await
        .map_err(|e| ApiError::internal("Failed to save photos", e))?;
    state.store
        .put_user(&user).await
        .map_err(|e| ApiError::internal("Failed to save user", e))?;
    Ok(Json(json!({ "success": true, "primaryPhotoId": photo_id })))
}

// --- Collections ---

async fn collections_get(
    State(state): State<AppState>,
    headers: HeaderMap
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let collections = state.store
        .list_collections(&user.id).await
        .map_err(|e| ApiError::internal("Failed to fetch collections", e))?;

    let mut payload = Vec::with_capacity(collections.len());
    for collection in &collections {
        let items = state.store
            .list_collection_items(&collection.id).await
            .map_err(|e| ApiError::internal("Failed to fetch collection items", e))?;
        let mut item_values = Vec::with_capacity(items.len());
        for item in &items {
            let product = state.store
                .get_product(&item.product_id).await
                .map_err(|e| ApiError::internal("Failed to fetch product", e))?;
            let mut value = serde_json
                ::to_value(item)
                .map_err(|e| ApiError::internal("Failed to serialize item", e))?;
            value["product"] = serde_json
                ::to_value(&product)
                .map_err(|e| ApiError::internal("Failed to serialize product", e))?;
            item_values.push(value);
        }
        let mut value = serde_json
            ::to_value(collection)
            .map_err(|e| ApiError::internal("Failed to serialize collection", e))?;
        value["items"] = Value::Array(item_values);
        payload.push(value);
    }

    Ok(Json(json!({ "collections": payload, "message": "Collections retrieved" })))
}

#[derive(Deserialize)]
struct CollectionRequest {
    name: Option<String>,
}

async fn collections_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CollectionRequest>
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let name = body.name.filter(|n| !n.trim().is_empty()).ok_or_else(||
        ApiError::BadRequest("Collection name is required".to_string())
    )?;

    let collection = Collection::new(&user.id, name.trim(), false);
    state.store
        .create_collection(&collection).await
        .map_err(|e| ApiError::internal("Failed to create collection", e))?;
    Ok(Json(json!({ "success": true, "collection": collection })))
}

async fn collection_item_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((collection_id, item_id)): Path<(String, String)>
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let owns = state.store
        .list_collections(&user.id).await
        .map_err(|e| ApiError::internal("Failed to fetch collections", e))?
        .iter()
        .any(|c| c.id == collection_id);
    if !owns {
        return Err(ApiError::NotFound("Collection"));
    }

    let removed = state.store
        .remove_collection_item(&collection_id, &item_id).await
        .map_err(|e| ApiError::internal("Failed to remove item", e))?;
    if !removed {
        return Err(ApiError::NotFound("Item"));
    }
    Ok(Json(json!({ "success": true })))
}

// --- Swipes ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwipeRequest {
    product_id: String,
    direction: SwipeDirection,
    session_id: String,
    card_position: i32,
}

async fn swipes_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SwipeRequest>
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;

    let swipe = Swipe {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        product_id: body.product_id.clone(),
        direction: body.direction,
        session_id: body.session_id,
        card_position: body.card_position,
        swiped_at: chrono::Utc::now(),
    };
    state.store
        .record_swipe(&swipe).await
        .map_err(|e| ApiError::internal("Failed to record swipe", e))?;

    // Right-swipes land in the default collection, once.
    if body.direction == SwipeDirection::Right {
        let default_collection = state.store
            .list_collections(&user.id).await
            .map_err(|e| ApiError::internal("Failed to fetch collections", e))?
            .into_iter()
            .find(|c| c.is_default);
        if let Some(collection) = default_collection {
            let already_saved = state.store
                .list_collection_items(&collection.id).await
                .map_err(|e| ApiError::internal("Failed to fetch collection items", e))?
                .iter()
                .any(|i| i.product_id == body.product_id);
            if !already_saved {
                state.store
                    .add_collection_item(
                        &CollectionItem::new(&collection.id, &body.product_id)
                    ).await
                    .map_err(|e| ApiError::internal("Failed to save item", e))?;
            }
        }
    }

    Ok(Json(json!({ "success": true, "message": "Swipe recorded successfully" })))
}

async fn swipes_get(
    State(state): State<AppState>,
    headers: HeaderMap
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let swipes = state.store
        .list_swipes(&user.id).await
        .map_err(|e| ApiError::internal("Failed to fetch swipes", e))?;
    Ok(Json(json!({ "success": true, "swipes": swipes })))
}
