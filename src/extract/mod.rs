use log::{ info, warn };
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::sync::Arc;

use crate::config::lexicon::Lexicon;
use crate::llm::chat::ChatClient;
use crate::models::product::ProductRequest;

static CONJUNCTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\band\b|,|\bthen\b|\balso\b|\bplus\b").unwrap()
});

/// Last-resort literal queries are capped so a rambling message does not
/// become the search string wholesale.
const LITERAL_QUERY_MAX_CHARS: usize = 80;

const EXTRACTION_INSTRUCTION: &str = r#"You are a fashion shopping assistant. Extract structured search terms from the user's message.

If the message mentions MULTIPLE clothing items (e.g., "jacket and jeans"), return:
{"items": [{"brand":string, "color":string, "category":string, "style":string[]}, ...]}

If the message mentions ONE item, return:
{"brand":string, "color":string, "category":string, "style":string[]}

Fields:
- brand: retail brand if mentioned (H&M, Zara, UNIQLO, etc.)
- color: main color (lowercase)
- category: jacket, top, jeans, pants, dress, skirt, hoodie, sweater, shoes
- style: extra terms like puffer, cropped, oversized, slim

Return ONLY valid JSON. No prose."#;

/// Lightweight keyword parse of one message or fragment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedQuery {
    pub brand: Option<String>,
    pub color: Option<String>,
    pub category: Option<String>,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.brand.is_none() && self.color.is_none() && self.category.is_none()
    }
}

/// Lower-case, strip everything but letters/digits/`&` (kept for "h&m"),
/// collapse whitespace.
fn normalize_text(message: &str) -> String {
    let lowered = message.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '&' { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn parse_user_query(message: &str, lexicon: &Lexicon) -> ParsedQuery {
    let text = normalize_text(message);
    ParsedQuery {
        brand: lexicon.detect_brand(&text),
        color: lexicon.detect_color(&text),
        category: lexicon.detect_category(&text),
    }
}

fn build_query(
    brand: &Option<String>,
    color: &Option<String>,
    category: &Option<String>,
    style: &[String]
) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(b) = brand.as_deref() {
        parts.push(b);
    }
    if let Some(c) = color.as_deref() {
        parts.push(c);
    }
    if let Some(c) = category.as_deref() {
        parts.push(c);
    }
    for s in style {
        if !s.is_empty() {
            parts.push(s);
        }
    }
    parts.join(" ").trim().to_string()
}

fn request_from(parsed: ParsedQuery, style: &[String]) -> Option<ProductRequest> {
    let query = build_query(&parsed.brand, &parsed.color, &parsed.category, style);
    if query.is_empty() {
        return None;
    }
    Some(ProductRequest {
        query,
        brand: parsed.brand,
        color: parsed.color,
        category: parsed.category,
    })
}

#[derive(Debug, Deserialize)]
struct ExtractedItem {
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    style: Vec<String>,
}

/// Strict shape for the language-model response: either a flat single item
/// or an `items` array. Anything else is a parse failure, which the caller
/// swallows; the extractor must never dead-end on a flaky model reply.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Extraction {
    Multi {
        items: Vec<ExtractedItem>,
    },
    Single(ExtractedItem),
}

fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let opened = trimmed
        .strip_prefix("```")
        .map(|rest| rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()).trim_start())
        .unwrap_or(trimmed);
    let closed = opened.trim_end().strip_suffix("```").unwrap_or(opened);
    closed.trim().to_string()
}

fn parse_extraction(raw: &str) -> Result<Extraction, serde_json::Error> {
    serde_json::from_str(&strip_code_fences(raw))
}

fn extraction_to_requests(extraction: Extraction) -> Vec<ProductRequest> {
    let items = match extraction {
        Extraction::Multi { items } => items,
        Extraction::Single(item) => vec![item],
    };
    items
        .into_iter()
        .filter_map(|item| {
            request_from(
                ParsedQuery {
                    brand: item.brand.filter(|s| !s.is_empty()),
                    color: item.color.filter(|s| !s.is_empty()),
                    category: item.category.filter(|s| !s.is_empty()),
                },
                &item.style
            )
        })
        .collect()
}

/// Turns a free-text message into an ordered list of product requests.
/// Strategies in order, first non-empty wins: conjunction split with keyword
/// parsing, language-model extraction, keyword parse of the whole message,
/// and finally the trimmed message itself as a literal query.
pub struct QueryExtractor {
    chat_client: Option<Arc<dyn ChatClient>>,
    lexicon: Arc<Lexicon>,
}

impl QueryExtractor {
    pub fn new(chat_client: Option<Arc<dyn ChatClient>>, lexicon: Arc<Lexicon>) -> Self {
        Self { chat_client, lexicon }
    }

    fn split_conjunctions(&self, message: &str) -> Vec<ProductRequest> {
        if !CONJUNCTION_RE.is_match(message) {
            return Vec::new();
        }
        info!("Detected multiple garment mentions in message");
        CONJUNCTION_RE.split(message)
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .filter_map(|part| request_from(parse_user_query(part, &self.lexicon), &[]))
            .collect()
    }

    async fn extract_with_llm(
        &self,
        client: &dyn ChatClient,
        message: &str
    ) -> Result<Vec<ProductRequest>, Box<dyn Error + Send + Sync>> {
        let prompt = format!("{}\n\nUser: {}", EXTRACTION_INSTRUCTION, message);
        let completion = client.complete(&prompt).await?;
        let extraction = parse_extraction(&completion.response)?;
        Ok(extraction_to_requests(extraction))
    }

    pub async fn extract(&self, message: &str) -> Vec<ProductRequest> {
        let mut requests = self.split_conjunctions(message);

        if requests.is_empty() {
            if let Some(client) = &self.chat_client {
                match self.extract_with_llm(client.as_ref(), message).await {
                    Ok(parsed) => {
                        requests = parsed;
                    }
                    Err(e) => warn!("Language-model parse failed: {}", e),
                }
            }
        }

        if requests.is_empty() {
            if let Some(request) = request_from(parse_user_query(message, &self.lexicon), &[]) {
                info!("Using fallback keyword query: {}", request.query);
                requests.push(request);
            }
        }

        if requests.is_empty() {
            let literal: String = message.trim().chars().take(LITERAL_QUERY_MAX_CHARS).collect();
            info!("No parsed query, using whole message: {}", literal);
            requests.push(ProductRequest {
                query: literal,
                brand: None,
                color: None,
                category: None,
            });
        }

        requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> QueryExtractor {
        QueryExtractor::new(None, Arc::new(Lexicon::default()))
    }

    #[tokio::test]
    async fn conjunction_yields_one_request_per_mention() {
        let requests = extractor().extract("red jacket and black jeans").await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].color.as_deref(), Some("red"));
        assert_eq!(requests[0].category.as_deref(), Some("jacket"));
        assert_eq!(requests[1].color.as_deref(), Some("black"));
        assert_eq!(requests[1].category.as_deref(), Some("jeans"));
    }

    #[tokio::test]
    async fn fragments_without_fields_are_dropped() {
        let requests = extractor().extract("something nice, and a zara dress").await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].brand.as_deref(), Some("Zara"));
        assert_eq!(requests[0].category.as_deref(), Some("dress"));
        assert_eq!(requests[0].query, "Zara dress");
    }

    #[tokio::test]
    async fn whole_message_keyword_fallback() {
        let requests = extractor().extract("navy hoodie").await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].color.as_deref(), Some("navy"));
        assert_eq!(requests[0].category.as_deref(), Some("hoodie"));
    }

    #[tokio::test]
    async fn literal_last_resort_is_capped() {
        let long = "something stylish for a gallery opening ".repeat(4);
        let requests = extractor().extract(&long).await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].query.chars().count() <= LITERAL_QUERY_MAX_CHARS);
        assert!(requests[0].brand.is_none());
    }

    #[test]
    fn parses_fenced_single_item() {
        let raw = "```json\n{\"brand\":\"Zara\",\"color\":\"red\",\"category\":\"jacket\",\"style\":[\"puffer\"]}\n```";
        let requests = extraction_to_requests(parse_extraction(raw).unwrap());
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query, "Zara red jacket puffer");
    }

    #[test]
    fn parses_items_array() {
        let raw = "{\"items\":[{\"color\":\"red\",\"category\":\"jacket\"},{\"color\":\"black\",\"category\":\"jeans\"}]}";
        let requests = extraction_to_requests(parse_extraction(raw).unwrap());
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].query, "black jeans");
    }

    #[test]
    fn malformed_model_reply_is_a_parse_failure() {
        assert!(parse_extraction("sure! here are the items you asked for").is_err());
    }
}
