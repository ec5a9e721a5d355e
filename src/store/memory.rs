use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use std::collections::HashMap;
use std::error::Error;
use tokio::sync::RwLock;

use super::Store;
use crate::models::chat::{ Conversation, Message };
use crate::models::product::{ Product, ProductFilter };
use crate::models::user::{ Collection, CollectionItem, Photo, Swipe, User };

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    photos: HashMap<String, Vec<Photo>>,
    products: Vec<Product>,
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, Vec<Message>>,
    collections: HashMap<String, Vec<Collection>>,
    collection_items: HashMap<String, Vec<CollectionItem>>,
    swipes: HashMap<String, Vec<Swipe>>,
}

/// In-memory backend. The default for development and tests; everything is
/// lost on restart.
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_filter(product: &Product, filter: ProductFilter) -> bool {
    match filter {
        ProductFilter::Trending => product.trending,
        ProductFilter::New => product.is_new,
        ProductFilter::Editorial => product.is_editorial,
        ProductFilter::Any => true,
    }
}

fn matches_term(product: &Product, term: &str) -> bool {
    let term = term.to_lowercase();
    product.name.to_lowercase().contains(&term) ||
        product.brand.to_lowercase().contains(&term) ||
        product.category.to_lowercase().contains(&term) ||
        product.description
            .as_deref()
            .map(|d| d.to_lowercase().contains(&term))
            .unwrap_or(false)
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, auth_id: &str) -> Result<Option<User>, Box<dyn Error + Send + Sync>> {
        Ok(self.tables.read().await.users.get(auth_id).cloned())
    }

    async fn put_user(&self, user: &User) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.tables.write().await.users.insert(user.auth_id.clone(), user.clone());
        Ok(())
    }

    async fn list_photos(
        &self,
        user_id: &str
    ) -> Result<Vec<Photo>, Box<dyn Error + Send + Sync>> {
        Ok(self.tables.read().await.photos.get(user_id).cloned().unwrap_or_default())
    }

    async fn save_photos(
        &self,
        user_id: &str,
        photos: &[Photo]
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.tables.write().await.photos.insert(user_id.to_string(), photos.to_vec());
        Ok(())
    }

    async fn put_product(&self, product: &Product) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.products.iter_mut().find(|p| p.id == product.id) {
            *existing = product.clone();
        } else {
            tables.products.push(product.clone());
        }
        Ok(())
    }

    async fn get_product(
        &self,
        id: &str
    ) -> Result<Option<Product>, Box<dyn Error + Send + Sync>> {
        Ok(
            self.tables
                .read().await
                .products.iter()
                .find(|p| p.id == id)
                .cloned()
        )
    }

    async fn list_products(
        &self,
        filter: ProductFilter,
        limit: usize
    ) -> Result<Vec<Product>, Box<dyn Error + Send + Sync>> {
        Ok(
            self.tables
                .read().await
                .products.iter()
                .filter(|p| matches_filter(p, filter))
                .take(limit)
                .cloned()
                .collect()
        )
    }

    async fn search_products(
        &self,
        term: &str,
        limit: usize
    ) -> Result<Vec<Product>, Box<dyn Error + Send + Sync>> {
        Ok(
            self.tables
                .read().await
                .products.iter()
                .filter(|p| matches_term(p, term))
                .take(limit)
                .cloned()
                .collect()
        )
    }

    async fn create_conversation(
        &self,
        conversation: &Conversation
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.tables
            .write().await
            .conversations.insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn get_conversation(
        &self,
        id: &str
    ) -> Result<Option<Conversation>, Box<dyn Error + Send + Sync>> {
        Ok(self.tables.read().await.conversations.get(id).cloned())
    }

    async fn list_conversations(
        &self,
        user_id: &str
    ) -> Result<Vec<Conversation>, Box<dyn Error + Send + Sync>> {
        let mut conversations: Vec<Conversation> = self.tables
            .read().await
            .conversations.values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(conversations)
    }

    async fn touch_conversation(
        &self,
        id: &str,
        at: DateTime<Utc>
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(conversation) = self.tables.write().await.conversations.get_mut(id) {
            conversation.last_message_at = at;
        }
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut tables = self.tables.write().await;
        tables.conversations.remove(id);
        tables.messages.remove(id);
        Ok(())
    }

    async fn append_message(&self, message: &Message) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.tables
            .write().await
            .messages.entry(message.conversation_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn list_messages(
        &self,
        conversation_id: &str
    ) -> Result<Vec<Message>, Box<dyn Error + Send + Sync>> {
        Ok(self.tables.read().await.messages.get(conversation_id).cloned().unwrap_or_default())
    }

    async fn create_collection(
        &self,
        collection: &Collection
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.tables
            .write().await
            .collections.entry(collection.user_id.clone())
            .or_default()
            .push(collection.clone());
        Ok(())
    }

    async fn list_collections(
        &self,
        user_id: &str
    ) -> Result<Vec<Collection>, Box<dyn Error + Send + Sync>> {
        let mut collections = self.tables
            .read().await
            .collections.get(user_id)
            .cloned()
            .unwrap_or_default();
        collections.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(collections)
    }

    async fn add_collection_item(
        &self,
        item: &CollectionItem
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.tables
            .write().await
            .collection_items.entry(item.collection_id.clone())
            .or_default()
            .push(item.clone());
        Ok(())
    }

    async fn list_collection_items(
        &self,
        collection_id: &str
    ) -> Result<Vec<CollectionItem>, Box<dyn Error + Send + Sync>> {
        Ok(
            self.tables
                .read().await
                .collection_items.get(collection_id)
                .cloned()
                .unwrap_or_default()
        )
    }

    async fn remove_collection_item(
        &self,
        collection_id: &str,
        item_id: &str
    ) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let mut tables = self.tables.write().await;
        if let Some(items) = tables.collection_items.get_mut(collection_id) {
            let before = items.len();
            items.retain(|i| i.id != item_id);
            return Ok(items.len() < before);
        }
        Ok(false)
    }

    async fn record_swipe(&self, swipe: &Swipe) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.tables
            .write().await
            .swipes.entry(swipe.user_id.clone())
            .or_default()
            .push(swipe.clone());
        Ok(())
    }

    async fn list_swipes(
        &self,
        user_id: &str
    ) -> Result<Vec<Swipe>, Box<dyn Error + Send + Sync>> {
        let mut swipes = self.tables.read().await.swipes.get(user_id).cloned().unwrap_or_default();
        swipes.reverse();
        Ok(swipes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn photo_list_is_replaced_wholesale() {
        let store = MemoryStore::new();
        let a = Photo::new("u1", "https://img/a.jpg", true);
        store.save_photos("u1", &[a.clone()]).await.unwrap();
        let b = Photo::new("u1", "https://img/b.jpg", true);
        store.save_photos("u1", &[b.clone()]).await.unwrap();
        let photos = store.list_photos("u1").await.unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].id, b.id);
    }

    #[tokio::test]
    async fn conversations_sort_by_recency() {
        let store = MemoryStore::new();
        let older = Conversation::new("u1");
        store.create_conversation(&older).await.unwrap();
        let newer = Conversation::new("u1");
        store.create_conversation(&newer).await.unwrap();
        store
            .touch_conversation(&newer.id, Utc::now() + chrono::Duration::seconds(5)).await
            .unwrap();
        let listed = store.list_conversations("u1").await.unwrap();
        assert_eq!(listed[0].id, newer.id);
    }

    #[tokio::test]
    async fn deleting_a_conversation_drops_its_messages() {
        let store = MemoryStore::new();
        let conversation = Conversation::new("u1");
        store.create_conversation(&conversation).await.unwrap();
        store.append_message(&Message::user(&conversation.id, "hi")).await.unwrap();
        store.delete_conversation(&conversation.id).await.unwrap();
        assert!(store.get_conversation(&conversation.id).await.unwrap().is_none());
        assert!(store.list_messages(&conversation.id).await.unwrap().is_empty());
    }
}
