use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use log::error;
use redis::{ AsyncCommands, Client };
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;

use super::Store;
use crate::cli::Args;
use crate::models::chat::{ Conversation, Message };
use crate::models::product::{ Product, ProductFilter };
use crate::models::user::{ Collection, CollectionItem, Photo, Swipe, User };

/// Redis backend. Entities are stored as JSON blobs under prefixed keys,
/// message and swipe streams as lists in append order, and id indexes as
/// sets. Durable enough for a single-node deployment; anything stronger is
/// the real relational store's job.
pub struct RedisStore {
    client: Client,
    prefix: String,
}

impl RedisStore {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(Self {
            client: Client::open(args.store_redis_url.as_str())?,
            prefix: args.store_redis_prefix.clone(),
        })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, suffix)
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        key: &str
    ) -> Result<Option<T>, Box<dyn Error + Send + Sync>> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn write_json<T: Serialize>(
        &self,
        key: &str,
        value: &T
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conn = self.conn().await?;
        let json = serde_json::to_string(value)?;
        let _: () = conn.set(key, json).await?;
        Ok(())
    }

    async fn read_list<T: DeserializeOwned>(
        &self,
        key: &str
    ) -> Result<Vec<T>, Box<dyn Error + Send + Sync>> {
        let mut conn = self.conn().await?;
        let entries: Vec<String> = conn.lrange(key, 0, -1).await?;
        let mut values = Vec::with_capacity(entries.len());
        for entry in &entries {
            match serde_json::from_str::<T>(entry) {
                Ok(value) => values.push(value),
                Err(e) => error!("Skipping malformed entry under '{}': {}", key, e),
            }
        }
        Ok(values)
    }

    async fn push_json<T: Serialize>(
        &self,
        key: &str,
        value: &T
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conn = self.conn().await?;
        let json = serde_json::to_string(value)?;
        let _: i64 = conn.rpush(key, json).await?;
        Ok(())
    }

    async fn products_by_ids(&self) -> Result<Vec<Product>, Box<dyn Error + Send + Sync>> {
        let mut conn = self.conn().await?;
        let ids: Vec<String> = conn.smembers(self.key("products")).await?;
        drop(conn);
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(product) = self.read_json::<Product>(&self.key(&format!("product:{}", id))).await? {
                products.push(product);
            }
        }
        Ok(products)
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
impl Store for RedisStore {
    async fn get_user(&self, auth_id: &str) -> Result<Option<User>, Box<dyn Error + Send + Sync>> {
        self.read_json(&self.key(&format!("user:{}", auth_id))).await
    }

    async fn put_user(&self, user: &User) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.write_json(&self.key(&format!("user:{}", user.auth_id)), user).await
    }

    async fn list_photos(
        &self,
        user_id: &str
    ) -> Result<Vec<Photo>, Box<dyn Error + Send + Sync>> {
        Ok(self.read_json(&self.key(&format!("photos:{}", user_id))).await?.unwrap_or_default())
    }

    async fn save_photos(
        &self,
        user_id: &str,
        photos: &[Photo]
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.write_json(&self.key(&format!("photos:{}", user_id)), &photos.to_vec()).await
    }

    async fn put_product(&self, product: &Product) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.write_json(&self.key(&format!("product:{}", product.id)), product).await?;
        let mut conn = self.conn().await?;
        let _: () = conn.sadd(self.key("products"), &product.id).await?;
        Ok(())
    }

    async fn get_product(
        &self,
        id: &str
    ) -> Result<Option<Product>, Box<dyn Error + Send + Sync>> {
        self.read_json(&self.key(&format!("product:{}", id))).await
    }

    async fn list_products(
        &self,
        filter: ProductFilter,
        limit: usize
    ) -> Result<Vec<Product>, Box<dyn Error + Send + Sync>> {
        Ok(
            self
                .products_by_ids().await?
                .into_iter()
                .filter(|p| matches_filter(p, filter))
                .take(limit)
                .collect()
        )
    }

    async fn search_products(
        &self,
        term: &str,
        limit: usize
    ) -> Result<Vec<Product>, Box<dyn Error + Send + Sync>> {
        Ok(
            self
                .products_by_ids().await?
                .into_iter()
                .filter(|p| matches_term(p, term))
                .take(limit)
                .collect()
        )
    }

    async fn create_conversation(
        &self,
        conversation: &Conversation
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.write_json(&self.key(&format!("conv:{}", conversation.id)), conversation).await?;
        let mut conn = self.conn().await?;
        let _: () = conn.sadd(self.key(&format!("convs:{}", conversation.user_id)), &conversation.id).await?;
        Ok(())
    }

    async fn get_conversation(
        &self,
        id: &str
    ) -> Result<Option<Conversation>, Box<dyn Error + Send + Sync>> {
        self.read_json(&self.key(&format!("conv:{}", id))).await
    }

    async fn list_conversations(
        &self,
        user_id: &str
    ) -> Result<Vec<Conversation>, Box<dyn Error + Send + Sync>> {
        let mut conn = self.conn().await?;
        let ids: Vec<String> = conn.smembers(self.key(&format!("convs:{}", user_id))).await?;
        drop(conn);
        let mut conversations = Vec::with_capacity(ids.len());
        for id in ids {
            if
                let Some(conversation) = self.read_json::<Conversation>(
                    &self.key(&format!("conv:{}", id))
                ).await?
            {
                conversations.push(conversation);
            }
        }
        conversations.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(conversations)
    }

    async fn touch_conversation(
        &self,
        id: &str,
        at: DateTime<Utc>
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let key = self.key(&format!("conv:{}", id));
        if let Some(mut conversation) = self.read_json::<Conversation>(&key).await? {
            conversation.last_message_at = at;
            self.write_json(&key, &conversation).await?;
        }
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let conv_key = self.key(&format!("conv:{}", id));
        let conversation = self.read_json::<Conversation>(&conv_key).await?;
        let mut conn = self.conn().await?;
        let _: () = conn.del(&[conv_key, self.key(&format!("msgs:{}", id))]).await?;
        if let Some(conversation) = conversation {
            let _: () = conn
                .srem(self.key(&format!("convs:{}", conversation.user_id)), id).await?;
        }
        Ok(())
    }

    async fn append_message(&self, message: &Message) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.push_json(&self.key(&format!("msgs:{}", message.conversation_id)), message).await
    }

    async fn list_messages(
        &self,
        conversation_id: &str
    ) -> Result<Vec<Message>, Box<dyn Error + Send + Sync>> {
        self.read_list(&self.key(&format!("msgs:{}", conversation_id))).await
    }

    async fn create_collection(
        &self,
        collection: &Collection
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let key = self.key(&format!("collections:{}", collection.user_id));
        let mut collections: Vec<Collection> = self.read_json(&key).await?.unwrap_or_default();
        collections.push(collection.clone());
        self.write_json(&key, &collections).await
    }

    async fn list_collections(
        &self,
        user_id: &str
    ) -> Result<Vec<Collection>, Box<dyn Error + Send + Sync>> {
        let mut collections: Vec<Collection> = self
            .read_json(&self.key(&format!("collections:{}", user_id))).await?
            .unwrap_or_default();
        collections.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(collections)
    }

    async fn add_collection_item(
        &self,
        item: &CollectionItem
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let key = self.key(&format!("collitems:{}", item.collection_id));
        let mut items: Vec<CollectionItem> = self.read_json(&key).await?.unwrap_or_default();
        items.push(item.clone());
        self.write_json(&key, &items).await
    }

    async fn list_collection_items(
        &self,
        collection_id: &str
    ) -> Result<Vec<CollectionItem>, Box<dyn Error + Send + Sync>> {
        Ok(
            self
                .read_json(&self.key(&format!("collitems:{}", collection_id))).await?
                .unwrap_or_default()
        )
    }

    async fn remove_collection_item(
        &self,
        collection_id: &str,
        item_id: &str
    ) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let key = self.key(&format!("collitems:{}", collection_id));
        let mut items: Vec<CollectionItem> = self.read_json(&key).await?.unwrap_or_default();
        let before = items.len();
        items.retain(|i| i.id != item_id);
        let removed = items.len() < before;
        if removed {
            self.write_json(&key, &items).await?;
        }
        Ok(removed)
    }

    async fn record_swipe(&self, swipe: &Swipe) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.push_json(&self.key(&format!("swipes:{}", swipe.user_id)), swipe).await
    }

    async fn list_swipes(
        &self,
        user_id: &str
    ) -> Result<Vec<Swipe>, Box<dyn Error + Send + Sync>> {
        let mut swipes: Vec<Swipe> = self
            .read_list(&self.key(&format!("swipes:{}", user_id))).await?;
        swipes.reverse();
        Ok(swipes)
    }
}
