use log::info;
use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::outfit::NormalizedCategory;

/// Keyword tables driving the string-heuristic side of the pipeline: brand
/// aliases, color vocabulary, category synonyms, the normalized-category
/// buckets and the size-slot terms. The tables live outside control flow so
/// they can be extended from a JSON file without touching logic.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Lexicon {
    pub brand_aliases: Vec<BrandAlias>,
    pub colors: Vec<String>,
    pub category_synonyms: Vec<CategorySynonym>,
    pub normalize_rules: Vec<NormalizeRule>,
    pub name_rules: Vec<NameRule>,
    pub top_size_terms: Vec<String>,
    pub bottom_size_terms: Vec<String>,
    pub shoe_size_terms: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BrandAlias {
    pub alias: String,
    pub brand: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CategorySynonym {
    pub term: String,
    pub category: String,
}

/// One normalized-category bucket. No keyword may appear in two buckets, so
/// the order rules are checked in is immaterial.
#[derive(Clone, Debug, Deserialize)]
pub struct NormalizeRule {
    pub bucket: NormalizedCategory,
    pub keywords: Vec<String>,
}

/// Category inference from a product name once a candidate is chosen.
/// `match_query` extends the check to the user's message text, which the
/// top bucket needs (queries like "crop top" often pick products whose
/// names omit the word).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameRule {
    pub category: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub match_query: bool,
}

fn aliases(pairs: &[(&str, &str)]) -> Vec<BrandAlias> {
    pairs
        .iter()
        .map(|(alias, brand)| BrandAlias {
            alias: alias.to_string(),
            brand: brand.to_string(),
        })
        .collect()
}

fn synonyms(pairs: &[(&str, &str)]) -> Vec<CategorySynonym> {
    pairs
        .iter()
        .map(|(term, category)| CategorySynonym {
            term: term.to_string(),
            category: category.to_string(),
        })
        .collect()
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            brand_aliases: aliases(
                &[
                    ("h&m", "H&M"),
                    ("h & m", "H&M"),
                    ("h and m", "H&M"),
                    ("hm", "H&M"),
                    ("zara", "Zara"),
                    ("uniqlo", "UNIQLO"),
                    ("nike", "Nike"),
                    ("adidas", "Adidas"),
                    ("patagonia", "Patagonia"),
                    ("gap", "GAP"),
                    ("hollister", "Hollister"),
                ]
            ),
            colors: strings(
                &[
                    "black",
                    "blue",
                    "red",
                    "white",
                    "green",
                    "pink",
                    "purple",
                    "yellow",
                    "orange",
                    "brown",
                    "grey",
                    "gray",
                    "navy",
                    "beige",
                    "cream",
                    "tan",
                ]
            ),
            category_synonyms: synonyms(
                &[
                    ("jacket", "jacket"),
                    ("coat", "jacket"),
                    ("puffer", "jacket"),
                    ("parka", "jacket"),
                    ("top", "top"),
                    ("t shirt", "top"),
                    ("tshirt", "top"),
                    ("tee", "top"),
                    ("blouse", "top"),
                    ("shirt", "top"),
                    ("jeans", "jeans"),
                    ("denim", "jeans"),
                    ("trousers", "pants"),
                    ("pants", "pants"),
                    ("dress", "dress"),
                    ("skirt", "skirt"),
                    ("hoodie", "hoodie"),
                    ("sweater", "sweater"),
                ]
            ),
            normalize_rules: vec![
                // Each bucket lists its own name first so normalization is
                // idempotent on bucket names.
                NormalizeRule {
                    bucket: NormalizedCategory::Outerwear,
                    keywords: strings(
                        &["outerwear", "jacket", "coat", "puffer", "parka", "blazer", "cardigan"]
                    ),
                },
                NormalizeRule {
                    bucket: NormalizedCategory::Top,
                    keywords: strings(
                        &["top", "t-shirt", "tshirt", "tee", "blouse", "shirt", "sweater", "hoodie"]
                    ),
                },
                NormalizeRule {
                    bucket: NormalizedCategory::Bottom,
                    keywords: strings(&["bottom", "jeans", "pants", "trousers", "chinos", "joggers"]),
                },
                NormalizeRule {
                    bucket: NormalizedCategory::Dress,
                    keywords: strings(&["dress", "gown"]),
                },
                NormalizeRule {
                    bucket: NormalizedCategory::Skirt,
                    keywords: strings(&["skirt"]),
                },
                NormalizeRule {
                    bucket: NormalizedCategory::Footwear,
                    keywords: strings(&["footwear", "shoes", "sneakers", "boots", "sandals", "heels"]),
                },
                NormalizeRule {
                    bucket: NormalizedCategory::Bag,
                    keywords: strings(&["bag", "purse", "backpack", "tote"]),
                },
                NormalizeRule {
                    bucket: NormalizedCategory::Headwear,
                    keywords: strings(&["headwear", "hat", "cap", "beanie"]),
                },
                NormalizeRule {
                    bucket: NormalizedCategory::Accessories,
                    keywords: strings(
                        &["accessories", "necklace", "bracelet", "earrings", "ring", "watch", "jewelry"]
                    ),
                }
            ],
            name_rules: vec![
                NameRule {
                    category: "jacket".into(),
                    keywords: strings(&["jacket", "coat", "puffer", "parka", "blazer", "cardigan"]),
                    match_query: false,
                },
                NameRule {
                    category: "jeans".into(),
                    keywords: strings(&["jean", "pants", "trouser", "chino", "jogger"]),
                    match_query: false,
                },
                NameRule {
                    category: "top".into(),
                    keywords: strings(&["top", "t-shirt", "tshirt", "tee", "blouse", "shirt", "cami"]),
                    match_query: true,
                },
                NameRule {
                    category: "dress".into(),
                    keywords: strings(&["dress", "gown"]),
                    match_query: false,
                },
                NameRule {
                    category: "skirt".into(),
                    keywords: strings(&["skirt"]),
                    match_query: false,
                },
                NameRule {
                    category: "shoes".into(),
                    keywords: strings(&["shoe", "sneaker", "boot", "sandal", "heel"]),
                    match_query: false,
                },
                NameRule {
                    category: "sweater".into(),
                    keywords: strings(&["sweater", "hoodie", "sweatshirt", "pullover"]),
                    match_query: false,
                }
            ],
            top_size_terms: strings(
                &[
                    "shirt",
                    "top",
                    "t-shirt",
                    "blouse",
                    "sweater",
                    "hoodie",
                    "jacket",
                    "coat",
                    "sweatshirt",
                    "cardigan",
                    "blazer",
                    "dress",
                    "apparel",
                ]
            ),
            bottom_size_terms: strings(
                &["pants", "jeans", "trousers", "shorts", "skirt", "leggings", "tights"]
            ),
            shoe_size_terms: strings(
                &[
                    "shoe",
                    "shoes",
                    "sneaker",
                    "sneakers",
                    "boot",
                    "boots",
                    "sandal",
                    "sandals",
                    "heel",
                    "heels",
                    "slipper",
                    "slippers",
                ]
            ),
        }
    }
}

impl Lexicon {
    /// Exact word-boundary brand detection first, then a fuzzy pass that
    /// tolerates typos on the longer aliases. Expects space-normalized
    /// lower-case text.
    pub fn detect_brand(&self, text: &str) -> Option<String> {
        let padded = format!(" {} ", text);
        for entry in &self.brand_aliases {
            if padded.contains(&format!(" {} ", entry.alias)) {
                return Some(entry.brand.clone());
            }
        }
        for token in text.split_whitespace() {
            for entry in &self.brand_aliases {
                if entry.alias.chars().count() < 4 {
                    continue;
                }
                if strsim::jaro_winkler(token, &entry.alias) >= 0.92 {
                    return Some(entry.brand.clone());
                }
            }
        }
        None
    }

    pub fn detect_color(&self, text: &str) -> Option<String> {
        let padded = format!(" {} ", text);
        self.colors
            .iter()
            .find(|c| padded.contains(&format!(" {} ", c)))
            .cloned()
    }

    /// Longest synonym wins so "t shirt" is not shadowed by "shirt".
    pub fn detect_category(&self, text: &str) -> Option<String> {
        let padded = format!(" {} ", text);
        let mut terms: Vec<&CategorySynonym> = self.category_synonyms.iter().collect();
        terms.sort_by(|a, b| b.term.len().cmp(&a.term.len()));
        terms
            .iter()
            .find(|s| padded.contains(&format!(" {} ", s.term)))
            .map(|s| s.category.clone())
    }
}

/// Load the lexicon from a JSON override file, falling back to the built-in
/// tables when the file does not exist. A present-but-malformed file is an
/// error: silently ignoring it would leave search running on different
/// vocabulary than the operator intended.
pub fn load_lexicon(path: &str) -> Result<Arc<Lexicon>, Box<dyn Error + Send + Sync>> {
    if !Path::new(path).exists() {
        info!("Lexicon file '{}' not found, using built-in tables", path);
        return Ok(Arc::new(Lexicon::default()));
    }
    let content = fs
        ::read_to_string(path)
        .map_err(|e| format!("Failed to read lexicon file '{}': {}", path, e))?;
    let lexicon: Lexicon = serde_json
        ::from_str(&content)
        .map_err(|e| format!("Failed to parse lexicon file '{}': {}", path, e))?;
    info!("Loaded lexicon from: {}", path);
    Ok(Arc::new(lexicon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn normalize_buckets_share_no_keywords() {
        let lexicon = Lexicon::default();
        let mut seen = HashSet::new();
        for rule in &lexicon.normalize_rules {
            for keyword in &rule.keywords {
                assert!(
                    seen.insert(keyword.clone()),
                    "keyword '{}' appears in more than one bucket",
                    keyword
                );
            }
        }
    }

    #[test]
    fn longest_synonym_wins() {
        let lexicon = Lexicon::default();
        assert_eq!(lexicon.detect_category("red t shirt"), Some("top".to_string()));
        assert_eq!(lexicon.detect_category("denim and leather"), Some("jeans".to_string()));
    }

    #[test]
    fn brand_detection_handles_aliases_and_typos() {
        let lexicon = Lexicon::default();
        assert_eq!(lexicon.detect_brand("red h&m jacket"), Some("H&M".to_string()));
        assert_eq!(lexicon.detect_brand("h and m puffer"), Some("H&M".to_string()));
        assert_eq!(lexicon.detect_brand("adiddas hoodie"), Some("Adidas".to_string()));
        assert_eq!(lexicon.detect_brand("plain black jacket"), None);
    }
}
