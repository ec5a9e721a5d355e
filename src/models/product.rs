use serde::{ Deserialize, Serialize };
use std::str::FromStr;

/// A catalog product row. Mirrors what the seed data and the internal
/// product endpoints expose; external search results never become one of
/// these unless explicitly saved.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub name: String,
    pub brand: String,
    pub price: f64,
    pub currency: String,
    pub retailer: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub image_url: String,
    pub product_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub in_stock: bool,
    #[serde(default)]
    pub trending: bool,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_editorial: bool,
}

fn default_true() -> bool {
    true
}

impl Product {
    pub fn to_candidate(&self) -> ProductCandidate {
        ProductCandidate {
            name: self.name.clone(),
            brand: self.brand.clone(),
            price: self.price,
            currency: self.currency.clone(),
            retailer: self.retailer.clone(),
            category: self.category.clone(),
            image_url: self.image_url.clone(),
            product_url: self.product_url.clone(),
            is_external: false,
        }
    }
}

/// Transient search result in the common shape both the external shopping
/// service and the internal catalog normalize into. Never persisted unless
/// chosen for the outfit.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCandidate {
    pub name: String,
    pub brand: String,
    pub price: f64,
    pub currency: String,
    pub retailer: String,
    pub category: String,
    pub image_url: String,
    pub product_url: String,
    pub is_external: bool,
}

impl ProductCandidate {
    /// Promote a chosen candidate into the outfit state, with the category
    /// decided by the ranker (the candidate's own category field is not
    /// trusted for external results).
    pub fn into_outfit_item(self, category: String) -> OutfitItem {
        OutfitItem {
            name: if self.name.is_empty() { "Item".to_string() } else { self.name },
            image_url: self.image_url,
            product_url: if self.product_url.is_empty() { "#".to_string() } else { self.product_url },
            price: self.price,
            currency: self.currency,
            brand: self.brand,
            retailer: self.retailer,
            category,
        }
    }
}

/// One garment currently "worn" in a conversation's outfit state. The server
/// is stateless across turns: the client echoes these back as `priorItems`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitItem {
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub product_url: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub retailer: String,
    #[serde(default)]
    pub category: String,
}

/// Intermediate parse result, one per detected garment mention.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductRequest {
    pub query: String,
    pub brand: Option<String>,
    pub color: Option<String>,
    pub category: Option<String>,
}

/// Catalog listing filters exposed by `GET /api/products`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductFilter {
    Trending,
    New,
    Editorial,
    Any,
}

impl FromStr for ProductFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "trending" => ProductFilter::Trending,
            "new" => ProductFilter::New,
            "editorial" => ProductFilter::Editorial,
            _ => ProductFilter::Any,
        })
    }
}
