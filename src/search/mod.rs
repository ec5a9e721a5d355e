pub mod serp;

use log::{ error, info, warn };
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::lexicon::Lexicon;
use crate::extract::{ parse_user_query, ParsedQuery };
use crate::models::product::{ ProductCandidate, ProductRequest };
use crate::models::user::Preferences;
use crate::store::Store;
use self::serp::ShoppingSearchClient;

/// Append the stored gender term and a size token to a search query. The
/// size slot is chosen by category keywords (top / bottom / shoe); a query
/// matching no slot still gets the top size, then the bottom size, so even
/// generic searches narrow down.
pub fn enhance_query(query: &str, prefs: Option<&Preferences>, lexicon: &Lexicon) -> String {
    let prefs = match prefs {
        Some(p) => p,
        None => {
            return query.to_string();
        }
    };
    if query.trim().is_empty() {
        return query.to_string();
    }

    let mut parts = vec![query.to_string()];
    let query_lower = query.to_lowercase();

    if let Some(gender) = prefs.usable_gender() {
        let term = match gender {
            "men" => Some("men"),
            "women" => Some("women"),
            "unisex" | "non-binary" => Some("unisex"),
            _ => None,
        };
        if let Some(term) = term {
            if !query_lower.contains(term) {
                parts.push(term.to_string());
            }
        }
    }

    if let Some(sizes) = &prefs.sizes {
        let is_top = lexicon.top_size_terms.iter().any(|t| query_lower.contains(t.as_str()));
        let is_bottom = lexicon.bottom_size_terms.iter().any(|t| query_lower.contains(t.as_str()));
        let is_shoe = lexicon.shoe_size_terms.iter().any(|t| query_lower.contains(t.as_str()));

        let size = if is_top && sizes.top.is_some() {
            sizes.top.clone()
        } else if is_bottom && sizes.bottom.is_some() {
            sizes.bottom.clone()
        } else if is_shoe && sizes.shoes.is_some() {
            sizes.shoes.clone()
        } else {
            sizes.top.clone().or_else(|| sizes.bottom.clone())
        };
        if let Some(size) = size {
            parts.push(format!("size {}", size));
        }
    }

    parts.join(" ")
}

/// The fixed relaxation ladder: brand+color+category, brand+category,
/// color+category, category. Empty candidates are skipped; the caller stops
/// at the first non-empty result set.
pub fn relaxation_queries(parsed: &ParsedQuery) -> Vec<String> {
    fn join(parts: &[Option<&str>]) -> String {
        parts
            .iter()
            .filter_map(|p| *p)
            .collect::<Vec<_>>()
            .join(" ")
    }

    let brand = parsed.brand.as_deref();
    let color = parsed.color.as_deref();
    let category = parsed.category.as_deref();

    let mut queries = vec![
        join(&[brand, color, category]),
        join(&[brand, category]),
        join(&[color, category]),
        join(&[category])
    ];
    queries.retain(|q| !q.is_empty());
    queries
}

/// Resolves free-text queries into candidate lists: external shopping search
/// when configured, internal catalog as the fallback, both behind the same
/// normalized shape. Every external call is bounded by `call_timeout` and
/// any failure degrades to the catalog.
pub struct SearchAdapter {
    shopping: Option<ShoppingSearchClient>,
    store: Arc<dyn Store>,
    lexicon: Arc<Lexicon>,
    limit: usize,
    call_timeout: Duration,
}

impl SearchAdapter {
    pub fn new(
        shopping: Option<ShoppingSearchClient>,
        store: Arc<dyn Store>,
        lexicon: Arc<Lexicon>,
        limit: usize,
        call_timeout: Duration
    ) -> Self {
        Self {
            shopping,
            store,
            lexicon,
            limit,
            call_timeout,
        }
    }

    /// One search round: enhance, try external, fall back to the catalog.
    /// Never errors; an empty vec means both paths came up dry.
    pub async fn search(
        &self,
        query: &str,
        prefs: Option<&Preferences>
    ) -> Vec<ProductCandidate> {
        self.search_with_limit(query, prefs, self.limit).await
    }

    pub async fn search_with_limit(
        &self,
        query: &str,
        prefs: Option<&Preferences>,
        limit: usize
    ) -> Vec<ProductCandidate> {
        let enhanced = enhance_query(query, prefs, &self.lexicon);
        if enhanced.trim().is_empty() {
            return Vec::new();
        }
        info!("Searching products with q=\"{}\"", enhanced);

        if let Some(client) = &self.shopping {
            match timeout(self.call_timeout, client.search(&enhanced, limit)).await {
                Ok(Ok(found)) if !found.is_empty() => {
                    info!("External search returned {} candidates", found.len());
                    return found;
                }
                Ok(Ok(_)) => info!("External search returned no results for \"{}\"", enhanced),
                Ok(Err(e)) => error!("External search failed: {}", e),
                Err(_) => warn!("External search timed out after {:?}", self.call_timeout),
            }
        }

        match self.store.search_products(&enhanced, limit).await {
            Ok(products) => {
                info!("Catalog fallback returned {} products", products.len());
                products
                    .iter()
                    .map(|p| p.to_candidate())
                    .collect()
            }
            Err(e) => {
                error!("Catalog search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Resolve one product request, applying progressive relaxation when the
    /// full-specificity query finds nothing.
    pub async fn resolve(
        &self,
        request: &ProductRequest,
        prefs: Option<&Preferences>
    ) -> Vec<ProductCandidate> {
        let mut candidates = self.search(&request.query, prefs).await;
        if !candidates.is_empty() {
            return candidates;
        }

        let parsed = if
            request.brand.is_some() ||
            request.color.is_some() ||
            request.category.is_some()
        {
            ParsedQuery {
                brand: request.brand.clone(),
                color: request.color.clone(),
                category: request.category.clone(),
            }
        } else {
            parse_user_query(&request.query, &self.lexicon)
        };

        for candidate_query in relaxation_queries(&parsed) {
            candidates = self.search(&candidate_query, prefs).await;
            if !candidates.is_empty() {
                break;
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Sizes;
    use crate::store::memory::MemoryStore;
    use crate::models::product::Product;

    fn prefs(gender: &str, top: Option<&str>, bottom: Option<&str>, shoes: Option<&str>) -> Preferences {
        Preferences {
            gender: Some(gender.to_string()),
            sizes: Some(Sizes {
                top: top.map(String::from),
                bottom: bottom.map(String::from),
                shoes: shoes.map(String::from),
            }),
            budget_range: None,
        }
    }

    #[test]
    fn gender_term_appended_once() {
        let lexicon = Lexicon::default();
        let p = prefs("women", None, None, None);
        assert_eq!(enhance_query("red jacket", Some(&p), &lexicon), "red jacket women");
        assert_eq!(enhance_query("red jacket women", Some(&p), &lexicon), "red jacket women");
    }

    #[test]
    fn prefer_not_to_say_adds_nothing() {
        let lexicon = Lexicon::default();
        let p = Preferences {
            gender: Some("prefer-not-to-say".to_string()),
            sizes: None,
            budget_range: None,
        };
        assert_eq!(enhance_query("red jacket", Some(&p), &lexicon), "red jacket");
    }

    #[test]
    fn size_slot_matches_category_keywords() {
        let lexicon = Lexicon::default();
        let p = prefs("men", Some("M"), Some("32"), Some("10"));
        assert_eq!(enhance_query("black jeans", Some(&p), &lexicon), "black jeans men size 32");
        assert_eq!(enhance_query("white sneakers", Some(&p), &lexicon), "white sneakers men size 10");
        assert_eq!(enhance_query("wool scarf", Some(&p), &lexicon), "wool scarf men size M");
    }

    #[test]
    fn generic_query_falls_back_to_bottom_size() {
        let lexicon = Lexicon::default();
        let p = prefs("men", None, Some("32"), None);
        assert_eq!(enhance_query("wool scarf", Some(&p), &lexicon), "wool scarf men size 32");
    }

    #[test]
    fn relaxation_ladder_in_fixed_order() {
        let parsed = ParsedQuery {
            brand: Some("Zara".to_string()),
            color: Some("red".to_string()),
            category: Some("jacket".to_string()),
        };
        assert_eq!(
            relaxation_queries(&parsed),
            vec!["Zara red jacket", "Zara jacket", "red jacket", "jacket"]
        );
    }

    #[test]
    fn relaxation_skips_empty_candidates() {
        let parsed = ParsedQuery {
            brand: None,
            color: Some("red".to_string()),
            category: None,
        };
        assert_eq!(relaxation_queries(&parsed), vec!["red", "red"]);
    }

    fn seed_product(name: &str, category: &str) -> Product {
        Product {
            id: uuid::Uuid::new_v4().to_string(),
            external_id: None,
            name: name.to_string(),
            brand: "Acme".to_string(),
            price: 10.0,
            currency: "USD".to_string(),
            retailer: "Acme".to_string(),
            category: category.to_string(),
            subcategory: None,
            image_url: "https://img.example/x.jpg".to_string(),
            product_url: "https://shop.example/x".to_string(),
            description: None,
            in_stock: true,
            trending: false,
            is_new: false,
            is_editorial: false,
        }
    }

    #[tokio::test]
    async fn resolve_relaxes_until_catalog_hit() {
        let store = Arc::new(MemoryStore::new());
        store.put_product(&seed_product("Classic Puffer Jacket", "jacket")).await.unwrap();
        let adapter = SearchAdapter::new(
            None,
            store,
            Arc::new(Lexicon::default()),
            10,
            Duration::from_secs(5)
        );
        let request = ProductRequest {
            query: "Zara red jacket".to_string(),
            brand: Some("Zara".to_string()),
            color: Some("red".to_string()),
            category: Some("jacket".to_string()),
        };
        // Full specificity misses; only the bare category query matches.
        let candidates = adapter.resolve(&request, None).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Classic Puffer Jacket");
        assert!(!candidates[0].is_external);
    }
}
