use futures::stream::{ self, StreamExt };
use log::{ error, info, warn };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::Args;
use crate::config::lexicon::{ load_lexicon, Lexicon };
use crate::error::ApiError;
use crate::extract::{ ParsedQuery, QueryExtractor };
use crate::llm::chat::{ new_client as new_chat_client, ChatClient };
use crate::llm::{ parse_llm_type, LlmConfig, LlmType };
use crate::models::chat::{ AssistantReply, Conversation, Message, TurnRequest, TurnResponse };
use crate::models::product::{ OutfitItem, ProductCandidate };
use crate::models::user::{ Preferences, User };
use crate::outfit::{ merge_outfit_items, normalize_category, plan_try_on, replacement_occurred };
use crate::rank;
use crate::search::serp::ShoppingSearchClient;
use crate::search::SearchAdapter;
use crate::store::{ create_store, seed_catalog, Store };
use crate::tryon::{ HttpTryOnClient, TryOnClient };

/// Orchestrates one chat turn: extraction, per-request search, ranking,
/// outfit merge, try-on composition and response assembly. Stateless across
/// turns; everything it needs arrives in the request or lives in the store.
pub struct StylistAgent {
    extractor: QueryExtractor,
    search: SearchAdapter,
    tryon: Option<Arc<dyn TryOnClient>>,
    store: Arc<dyn Store>,
    lexicon: Arc<Lexicon>,
    search_concurrency: usize,
}

impl StylistAgent {
    fn initialize_extraction_client(
        args: &Args
    ) -> Result<Option<Arc<dyn ChatClient>>, Box<dyn Error + Send + Sync>> {
        let llm_type = parse_llm_type(&args.extract_llm_type)?;
        let api_key = Some(args.extract_api_key.clone()).filter(|k| !k.is_empty());
        if api_key.is_none() && llm_type != LlmType::Ollama {
            warn!("No extraction API key configured; query parsing will use keyword heuristics only.");
            return Ok(None);
        }

        let config = LlmConfig {
            llm_type,
            api_key,
            completion_model: args.extract_model.clone(),
            base_url: args.extract_base_url.clone(),
        };
        let client = new_chat_client(&config)?;
        info!(
            "Extraction client configured: Type={}, Model={:?}, BaseURL={:?}",
            args.extract_llm_type,
            config.completion_model.as_deref().unwrap_or("adapter default"),
            config.base_url.as_deref().unwrap_or("adapter default")
        );
        Ok(Some(client))
    }

    pub async fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let lexicon = load_lexicon(&args.lexicon_path)?;
        let store = create_store(args)?;
        seed_catalog(&store, &args.seed_products_path).await?;

        let extraction_client = Self::initialize_extraction_client(args)?;
        let extractor = QueryExtractor::new(extraction_client, Arc::clone(&lexicon));

        let shopping = if args.shopping_api_key.is_empty() {
            warn!("No shopping search API key configured; all searches will use the internal catalog.");
            None
        } else {
            info!("Shopping search configured: {}", args.shopping_endpoint);
            Some(
                ShoppingSearchClient::new(
                    &args.shopping_endpoint,
                    &args.shopping_engine,
                    &args.shopping_api_key
                )
            )
        };
        let search = SearchAdapter::new(
            shopping,
            Arc::clone(&store),
            Arc::clone(&lexicon),
            args.search_limit,
            Duration::from_secs(args.search_timeout_secs)
        );

        let tryon: Option<Arc<dyn TryOnClient>> = match args.tryon_endpoint.as_deref() {
            Some(endpoint) if !endpoint.trim().is_empty() => {
                info!("Try-on service configured: {}", endpoint);
                Some(
                    Arc::new(
                        HttpTryOnClient::new(
                            endpoint,
                            Some(args.tryon_api_key.clone()),
                            Duration::from_secs(args.tryon_timeout_secs)
                        )
                    )
                )
            }
            _ => {
                warn!("No try-on endpoint configured; turns will not produce composite images.");
                None
            }
        };

        Ok(Self {
            extractor,
            search,
            tryon,
            store,
            lexicon,
            search_concurrency: args.search_concurrency.max(1),
        })
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    pub fn search_adapter(&self) -> &SearchAdapter {
        &self.search
    }

    pub fn lexicon(&self) -> Arc<Lexicon> {
        Arc::clone(&self.lexicon)
    }

    /// Run the whole pipeline for one chat turn. Auth has already happened;
    /// photo and gender preconditions are checked here because the try-on
    /// stages cannot work without them.
    pub async fn chat_turn(
        &self,
        user: &User,
        request: TurnRequest
    ) -> Result<TurnResponse, ApiError> {
        if request.message.trim().is_empty() {
            return Err(ApiError::BadRequest("Message is required".to_string()));
        }

        let photos = self.store
            .list_photos(&user.id).await
            .map_err(|e| ApiError::internal("Failed to load photos", e))?;
        let primary_photo = photos
            .iter()
            .find(|p| p.is_primary)
            .or_else(|| photos.first())
            .cloned()
            .ok_or(ApiError::PhotoRequired)?;

        if user.preferences.as_ref().and_then(|p| p.usable_gender()).is_none() {
            return Err(ApiError::GenderRequired);
        }

        let conversation = match &request.conversation_id {
            Some(id) => {
                self.store
                    .get_conversation(id).await
                    .map_err(|e| ApiError::internal("Failed to load conversation", e))?
                    .filter(|c| c.user_id == user.id)
                    .ok_or(ApiError::NotFound("Conversation"))?
            }
            None => {
                let conversation = Conversation::new(&user.id);
                self.store
                    .create_conversation(&conversation).await
                    .map_err(|e| ApiError::internal("Failed to create conversation", e))?;
                conversation
            }
        };

        let user_message = Message::user(&conversation.id, &request.message);
        self.store
            .append_message(&user_message).await
            .map_err(|e| ApiError::internal("Failed to save message", e))?;
        self.store
            .touch_conversation(&conversation.id, user_message.created_at).await
            .map_err(|e| ApiError::internal("Failed to update conversation", e))?;

        let requests = self.extractor.extract(&request.message).await;
        info!(
            "Turn resolved into {} product request(s): {:?}",
            requests.len(),
            requests
                .iter()
                .map(|r| r.query.as_str())
                .collect::<Vec<_>>()
        );

        // Searches are independent idempotent reads; run them with a bounded
        // worker pool, keeping results in request order.
        let prefs = user.preferences.as_ref();
        let candidate_sets: Vec<Vec<ProductCandidate>> = stream
            ::iter(requests.clone())
            .map(|req| async move { self.search.resolve(&req, prefs).await })
            .buffered(self.search_concurrency)
            .collect::<Vec<_>>().await;

        let mut incoming: Vec<OutfitItem> = Vec::new();
        for (req, candidates) in requests.iter().zip(candidate_sets) {
            if candidates.is_empty() {
                warn!("No products found for request: {}", req.query);
                continue;
            }
            let parsed = ParsedQuery {
                brand: req.brand.clone(),
                color: req.color.clone(),
                category: req.category.clone(),
            };
            if let Some(best) = rank::pick_best(&candidates, &parsed) {
                let category = rank::infer_category(
                    req.category.as_deref(),
                    &best.name,
                    &request.message,
                    &self.lexicon
                );
                info!(
                    "Chosen product: '{}' ({} → {})",
                    best.name,
                    category,
                    normalize_category(&category, &self.lexicon)
                );
                incoming.push(best.clone().into_outfit_item(category));
            }
        }

        let prior = request.prior_items.clone();
        let merged = merge_outfit_items(prior.clone(), incoming.clone(), &self.lexicon);

        let mut outfit_image_url: Option<String> = None;
        match
            plan_try_on(
                &prior,
                &incoming,
                &merged,
                request.prior_outfit_image.as_deref(),
                &primary_photo.url,
                &self.lexicon
            )
        {
            Some(job) => {
                if let Some(client) = &self.tryon {
                    info!("Try-on decision: {:?} with {} item(s)", job.decision, job.items.len());
                    match client.generate(&job.base_image, &job.items).await {
                        Ok(result) if result.success && result.image_url.is_some() => {
                            outfit_image_url = result.image_url;
                        }
                        Ok(result) =>
                            warn!(
                                "Image generation returned no image: {}",
                                result.error.as_deref().unwrap_or("no error detail")
                            ),
                        Err(e) => error!("Image generation failed: {}", e),
                    }
                }
            }
            None => info!("Skipping image generation: no items with an image to apply"),
        }

        let replaced = replacement_occurred(&prior, &incoming, &self.lexicon);
        let content = render_response(
            &request.message,
            &merged,
            &incoming,
            &prior,
            replaced,
            user.preferences.as_ref(),
            &self.lexicon
        );

        let assistant = Message::assistant(
            &conversation.id,
            &content,
            outfit_image_url.clone(),
            (!merged.is_empty()).then(|| merged.clone())
        );
        self.store
            .append_message(&assistant).await
            .map_err(|e| ApiError::internal("Failed to save message", e))?;
        self.store
            .touch_conversation(&conversation.id, assistant.created_at).await
            .map_err(|e| ApiError::internal("Failed to update conversation", e))?;

        Ok(TurnResponse {
            success: true,
            message: AssistantReply {
                id: assistant.id,
                role: "assistant".to_string(),
                content,
                outfit_image: outfit_image_url,
                products: merged,
                timestamp: assistant.created_at,
            },
            conversation_id: conversation.id,
        })
    }
}

/// Deterministic response templates. Always lists the current items with
/// their normalized category; the empty case carries a gender-aware hint.
fn render_response(
    message: &str,
    merged: &[OutfitItem],
    incoming: &[OutfitItem],
    prior: &[OutfitItem],
    replaced: bool,
    prefs: Option<&Preferences>,
    lexicon: &Lexicon
) -> String {
    if merged.is_empty() {
        let hint = match prefs.and_then(|p| p.usable_gender()) {
            Some("men") => " for men",
            Some("women") => " for women",
            Some(_) => " for you",
            None => "",
        };
        return format!(
            "I couldn't find good matches{} for \"{}\". Try something like 'red crop top from Zara', 'black jeans from H&M', or include specific brands and colors.",
            hint,
            message
        );
    }

    let items_list = merged
        .iter()
        .map(|i| format!("{} ({})", i.name, normalize_category(&i.category, lexicon)))
        .collect::<Vec<_>>()
        .join(", ");

    if !incoming.is_empty() && !prior.is_empty() {
        if replaced {
            format!(
                "Updated your outfit! Now wearing: {}. Want to add or replace anything else?",
                items_list
            )
        } else {
            format!(
                "Added to your outfit! Now wearing: {}. Keep building your look by adding more items!",
                items_list
            )
        }
    } else {
        format!(
            "Here's your look with: {}. Add more items to complete your outfit (e.g., 'black jeans', 'white sneakers')!",
            items_list
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, category: &str) -> OutfitItem {
        OutfitItem {
            name: name.to_string(),
            image_url: "img".to_string(),
            product_url: "#".to_string(),
            price: 0.0,
            currency: "USD".to_string(),
            brand: String::new(),
            retailer: String::new(),
            category: category.to_string(),
        }
    }

    fn prefs(gender: &str) -> Preferences {
        Preferences {
            gender: Some(gender.to_string()),
            sizes: None,
            budget_range: None,
        }
    }

    #[test]
    fn empty_outfit_carries_gender_hint() {
        let lexicon = Lexicon::default();
        let text = render_response("warm socks", &[], &[], &[], false, Some(&prefs("women")), &lexicon);
        assert!(text.contains("for women"));
        assert!(text.contains("\"warm socks\""));
    }

    #[test]
    fn replacement_text_wins_over_addition() {
        let lexicon = Lexicon::default();
        let prior = vec![item("Old Jacket", "jacket")];
        let incoming = vec![item("New Jacket", "jacket")];
        let merged = vec![item("New Jacket", "jacket")];
        let text = render_response("", &merged, &incoming, &prior, true, None, &lexicon);
        assert!(text.starts_with("Updated your outfit!"));
        assert!(text.contains("New Jacket (outerwear)"));
    }

    #[test]
    fn pure_addition_text() {
        let lexicon = Lexicon::default();
        let prior = vec![item("Jacket", "jacket")];
        let incoming = vec![item("Jeans", "jeans")];
        let merged = vec![item("Jacket", "jacket"), item("Jeans", "jeans")];
        let text = render_response("", &merged, &incoming, &prior, false, None, &lexicon);
        assert!(text.starts_with("Added to your outfit!"));
    }

    #[test]
    fn first_items_use_heres_your_look() {
        let lexicon = Lexicon::default();
        let incoming = vec![item("Jacket", "jacket")];
        let text = render_response("", &incoming.clone(), &incoming, &[], false, None, &lexicon);
        assert!(text.starts_with("Here's your look with:"));
    }
}
