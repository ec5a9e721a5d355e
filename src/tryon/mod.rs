use async_trait::async_trait;
use log::info;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::error::Error;
use std::time::Duration;
use tokio::time::timeout;

use crate::models::product::OutfitItem;

/// Outcome of one image-generation call. `success=false` or a missing image
/// is an ordinary result, not an error; the turn proceeds without a new
/// composite either way.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnResult {
    pub success: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait TryOnClient: Send + Sync {
    /// Compose the given garments onto the base image reference. The base is
    /// either the user's primary photo or a previously generated composite.
    async fn generate(
        &self,
        base_image: &str,
        items: &[OutfitItem]
    ) -> Result<TryOnResult, Box<dyn Error + Send + Sync>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TryOnRequest<'a> {
    base_image: &'a str,
    items: &'a [OutfitItem],
}

/// HTTP client for the external image-generation service.
pub struct HttpTryOnClient {
    http: HttpClient,
    endpoint: String,
    api_key: Option<String>,
    call_timeout: Duration,
}

impl HttpTryOnClient {
    pub fn new(endpoint: &str, api_key: Option<String>, call_timeout: Duration) -> Self {
        Self {
            http: HttpClient::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            call_timeout,
        }
    }
}

#[async_trait]
impl TryOnClient for HttpTryOnClient {
    async fn generate(
        &self,
        base_image: &str,
        items: &[OutfitItem]
    ) -> Result<TryOnResult, Box<dyn Error + Send + Sync>> {
        info!(
            "Requesting try-on composite: {} item(s), base={}",
            items.len(),
            &base_image.chars().take(60).collect::<String>()
        );

        let mut req = self.http.post(&self.endpoint).json(&(TryOnRequest { base_image, items }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = timeout(self.call_timeout, req.send()).await
            .map_err(|_| format!("Try-on request timed out after {:?}", self.call_timeout))??
            .error_for_status()?;
        let result = resp.json::<TryOnResult>().await?;
        Ok(result)
    }
}
