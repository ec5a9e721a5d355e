pub mod memory;
pub mod redis;

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use log::info;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::cli::Args;
use crate::models::chat::{ Conversation, Message };
use crate::models::product::{ Product, ProductFilter };
use crate::models::user::{ Collection, CollectionItem, Photo, Swipe, User };

/// Stand-in for the externally provided relational store. All reads and
/// writes the service performs go through here; backends are selected by
/// type string at startup.
#[async_trait]
pub trait Store: Send + Sync {
    // Users are keyed by the opaque identifier the auth collaborator issues.
    async fn get_user(&self, auth_id: &str) -> Result<Option<User>, Box<dyn Error + Send + Sync>>;
    async fn put_user(&self, user: &User) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn list_photos(&self, user_id: &str) -> Result<Vec<Photo>, Box<dyn Error + Send + Sync>>;
    /// Replaces the user's photo list wholesale; primary-flag maintenance is
    /// the caller's job.
    async fn save_photos(
        &self,
        user_id: &str,
        photos: &[Photo]
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn put_product(&self, product: &Product) -> Result<(), Box<dyn Error + Send + Sync>>;
    async fn get_product(
        &self,
        id: &str
    ) -> Result<Option<Product>, Box<dyn Error + Send + Sync>>;
    async fn list_products(
        &self,
        filter: ProductFilter,
        limit: usize
    ) -> Result<Vec<Product>, Box<dyn Error + Send + Sync>>;
    /// Case-insensitive substring search over name, brand, category and
    /// description.
    async fn search_products(
        &self,
        term: &str,
        limit: usize
    ) -> Result<Vec<Product>, Box<dyn Error + Send + Sync>>;

    async fn create_conversation(
        &self,
        conversation: &Conversation
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
    async fn get_conversation(
        &self,
        id: &str
    ) -> Result<Option<Conversation>, Box<dyn Error + Send + Sync>>;
    /// The user's conversations, most recently active first.
    async fn list_conversations(
        &self,
        user_id: &str
    ) -> Result<Vec<Conversation>, Box<dyn Error + Send + Sync>>;
    async fn touch_conversation(
        &self,
        id: &str,
        at: DateTime<Utc>
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
    async fn delete_conversation(&self, id: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn append_message(&self, message: &Message) -> Result<(), Box<dyn Error + Send + Sync>>;
    /// Messages in creation order.
    async fn list_messages(
        &self,
        conversation_id: &str
    ) -> Result<Vec<Message>, Box<dyn Error + Send + Sync>>;

    async fn create_collection(
        &self,
        collection: &Collection
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
    /// The user's collections, newest first.
    async fn list_collections(
        &self,
        user_id: &str
    ) -> Result<Vec<Collection>, Box<dyn Error + Send + Sync>>;
    async fn add_collection_item(
        &self,
        item: &CollectionItem
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
    async fn list_collection_items(
        &self,
        collection_id: &str
    ) -> Result<Vec<CollectionItem>, Box<dyn Error + Send + Sync>>;
    async fn remove_collection_item(
        &self,
        collection_id: &str,
        item_id: &str
    ) -> Result<bool, Box<dyn Error + Send + Sync>>;

    async fn record_swipe(&self, swipe: &Swipe) -> Result<(), Box<dyn Error + Send + Sync>>;
    /// The user's swipes, newest first.
    async fn list_swipes(&self, user_id: &str) -> Result<Vec<Swipe>, Box<dyn Error + Send + Sync>>;
}

pub fn create_store(args: &Args) -> Result<Arc<dyn Store>, Box<dyn Error + Send + Sync>> {
    info!("Application data will be stored in: {}", args.store_type);
    match args.store_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(memory::MemoryStore::new())),
        "redis" => Ok(Arc::new(redis::RedisStore::new(args)?)),
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported store type: {}", args.store_type)
                    )
                )
            ),
    }
}

/// Load the product catalog seed file into an empty store. A populated store
/// or a missing file is a no-op, so restarts against redis do not duplicate
/// anything.
pub async fn seed_catalog(
    store: &Arc<dyn Store>,
    path: &str
) -> Result<usize, Box<dyn Error + Send + Sync>> {
    if !Path::new(path).exists() {
        info!("Seed file '{}' not found, skipping catalog seed", path);
        return Ok(0);
    }
    if !store.list_products(ProductFilter::Any, 1).await?.is_empty() {
        return Ok(0);
    }

    let content = fs
        ::read_to_string(path)
        .map_err(|e| format!("Failed to read seed file '{}': {}", path, e))?;
    let products: Vec<Product> = serde_json
        ::from_str(&content)
        .map_err(|e| format!("Failed to parse seed file '{}': {}", path, e))?;

    let count = products.len();
    for product in &products {
        store.put_product(product).await?;
    }
    info!("Seeded catalog with {} products from {}", count, path);
    Ok(count)
}
