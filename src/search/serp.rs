use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::error::Error;
use url::Url;

use crate::models::product::ProductCandidate;

static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z$£€₹]{0,3})\s*([0-9][0-9,.]*)").unwrap()
});

/// Parse a shopping-result price string like "$49.99" or "€1,299" into an
/// amount and ISO currency code. Unrecognized symbols and unparsable strings
/// collapse to 0 USD rather than failing the result.
pub fn parse_price(raw: &str) -> (f64, String) {
    if let Some(caps) = PRICE_RE.captures(raw) {
        let symbol = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let amount = caps
            .get(2)
            .map(|m| m.as_str())
            .unwrap_or("0")
            .replace(',', "");
        let price = amount.parse::<f64>().unwrap_or(0.0);
        let currency = if symbol.contains('$') {
            "USD"
        } else if symbol.contains('€') {
            "EUR"
        } else if symbol.contains('£') {
            "GBP"
        } else if symbol.contains('₹') {
            "INR"
        } else {
            "USD"
        };
        let price = if price.is_finite() { price } else { 0.0 };
        return (price, currency.to_string());
    }
    (0.0, "USD".to_string())
}

#[derive(Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    shopping_results: Vec<ShoppingResult>,
}

#[derive(Deserialize)]
struct ShoppingResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    store: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    product_link: Option<String>,
}

impl ShoppingResult {
    fn into_candidate(self) -> ProductCandidate {
        let (price, currency) = parse_price(self.price.as_deref().unwrap_or(""));
        let seller = self.source
            .or(self.store)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        ProductCandidate {
            name: self.title.filter(|t| !t.is_empty()).unwrap_or_else(|| "Product".to_string()),
            brand: seller.clone(),
            price,
            currency,
            retailer: seller,
            category: "search".to_string(),
            image_url: self.thumbnail.or(self.image).unwrap_or_default(),
            product_url: self.link
                .or(self.product_link)
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| "#".to_string()),
            is_external: true,
        }
    }
}

/// Client for the external google-shopping-style search service. One GET per
/// query; the caller owns timeouts and fallback behavior.
#[derive(Clone)]
pub struct ShoppingSearchClient {
    http: HttpClient,
    endpoint: String,
    engine: String,
    api_key: String,
}

impl ShoppingSearchClient {
    pub fn new(endpoint: &str, engine: &str, api_key: &str) -> Self {
        Self {
            http: HttpClient::new(),
            endpoint: endpoint.to_string(),
            engine: engine.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn search(
        &self,
        query: &str,
        limit: usize
    ) -> Result<Vec<ProductCandidate>, Box<dyn Error + Send + Sync>> {
        let mut url = Url::parse(&self.endpoint)?;
        url.query_pairs_mut()
            .append_pair("engine", &self.engine)
            .append_pair("q", query)
            .append_pair("api_key", &self.api_key);

        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(format!("Shopping search HTTP {}: {}", status, snippet).into());
        }

        let envelope: SearchEnvelope = resp.json().await?;
        Ok(
            envelope.shopping_results
                .into_iter()
                .take(limit)
                .map(ShoppingResult::into_candidate)
                .collect()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_price() {
        assert_eq!(parse_price("$49.99"), (49.99, "USD".to_string()));
    }

    #[test]
    fn euro_price_without_decimals() {
        assert_eq!(parse_price("€120"), (120.0, "EUR".to_string()));
    }

    #[test]
    fn pound_price_with_thousands_separator() {
        assert_eq!(parse_price("£1,299.50"), (1299.5, "GBP".to_string()));
    }

    #[test]
    fn rupee_price() {
        assert_eq!(parse_price("₹999"), (999.0, "INR".to_string()));
    }

    #[test]
    fn unparsable_price_defaults_to_zero_usd() {
        assert_eq!(parse_price("price on request"), (0.0, "USD".to_string()));
    }

    #[test]
    fn bare_number_defaults_to_usd() {
        assert_eq!(parse_price("49.99"), (49.99, "USD".to_string()));
    }
}
