use crate::config::lexicon::Lexicon;
use crate::extract::ParsedQuery;
use crate::models::product::ProductCandidate;

/// Score candidates by lexical overlap with the parsed request and return
/// the best one. Scoring: 3 for a brand hit in name or retailer, 2 for a
/// color hit in the name, 2 for a category hit in the name, 1 for having an
/// image. Stable scan, so ties keep the first candidate seen. A non-empty
/// input always yields a candidate: with nothing matching, the first one is
/// the deliberate default (showing something beats showing nothing).
pub fn pick_best<'a>(
    candidates: &'a [ProductCandidate],
    parsed: &ParsedQuery
) -> Option<&'a ProductCandidate> {
    let brand = parsed.brand.as_deref().unwrap_or("").to_lowercase();
    let color = parsed.color.as_deref().unwrap_or("").to_lowercase();
    let category = parsed.category.as_deref().unwrap_or("").to_lowercase();

    let mut best: Option<&ProductCandidate> = None;
    let mut best_score = -1i32;
    for candidate in candidates {
        let name = candidate.name.to_lowercase();
        let retailer = candidate.retailer.to_lowercase();
        let mut score = 0;
        if !brand.is_empty() && (name.contains(&brand) || retailer.contains(&brand)) {
            score += 3;
        }
        if !color.is_empty() && name.contains(&color) {
            score += 2;
        }
        if !category.is_empty() && name.contains(&category) {
            score += 2;
        }
        if !candidate.image_url.is_empty() {
            score += 1;
        }
        if score > best_score {
            best_score = score;
            best = Some(candidate);
        }
    }
    best
}

/// Decide the category a chosen candidate is filed under. The parsed request
/// category wins when present; otherwise the product name (and for tops, the
/// message text) is matched against the lexicon's name rules. External
/// results tag everything "search", which is treated as absent.
pub fn infer_category(
    parsed_category: Option<&str>,
    product_name: &str,
    message: &str,
    lexicon: &Lexicon
) -> String {
    if let Some(cat) = parsed_category {
        if !cat.is_empty() && cat != "search" {
            return cat.to_string();
        }
    }

    let name = product_name.to_lowercase();
    let query = message.to_lowercase();
    for rule in &lexicon.name_rules {
        let hit = rule.keywords
            .iter()
            .any(|k| {
                name.contains(k.as_str()) || (rule.match_query && query.contains(k.as_str()))
            });
        if hit {
            return rule.category.clone();
        }
    }
    "other".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, retailer: &str, image: &str) -> ProductCandidate {
        ProductCandidate {
            name: name.to_string(),
            brand: retailer.to_string(),
            price: 0.0,
            currency: "USD".to_string(),
            retailer: retailer.to_string(),
            category: "search".to_string(),
            image_url: image.to_string(),
            product_url: "#".to_string(),
            is_external: true,
        }
    }

    fn parsed(brand: Option<&str>, color: Option<&str>, category: Option<&str>) -> ParsedQuery {
        ParsedQuery {
            brand: brand.map(String::from),
            color: color.map(String::from),
            category: category.map(String::from),
        }
    }

    #[test]
    fn brand_match_outranks_image_only() {
        let candidates = vec![
            candidate("Plain Tee", "Unknown", "img.jpg"),
            candidate("Zara Red Jacket", "Zara", "")
        ];
        let best = pick_best(&candidates, &parsed(Some("Zara"), None, Some("jacket"))).unwrap();
        assert_eq!(best.name, "Zara Red Jacket");
    }

    #[test]
    fn irrelevant_candidates_still_yield_the_first() {
        let candidates = vec![
            candidate("Garden Hose", "HardwareMart", ""),
            candidate("Lawn Mower", "HardwareMart", "")
        ];
        let best = pick_best(&candidates, &parsed(Some("Zara"), Some("red"), Some("jacket")));
        assert_eq!(best.unwrap().name, "Garden Hose");
    }

    #[test]
    fn ties_keep_the_first_seen() {
        let candidates = vec![
            candidate("Red Jacket A", "X", "img"),
            candidate("Red Jacket B", "Y", "img")
        ];
        let best = pick_best(&candidates, &parsed(None, Some("red"), Some("jacket"))).unwrap();
        assert_eq!(best.name, "Red Jacket A");
    }

    #[test]
    fn empty_input_yields_none() {
        assert!(pick_best(&[], &parsed(None, None, None)).is_none());
    }

    #[test]
    fn parsed_category_wins_over_name() {
        let lexicon = Lexicon::default();
        assert_eq!(infer_category(Some("jeans"), "Puffer Jacket", "", &lexicon), "jeans");
    }

    #[test]
    fn search_tag_is_treated_as_absent() {
        let lexicon = Lexicon::default();
        assert_eq!(
            infer_category(Some("search"), "Warm Puffer Jacket", "", &lexicon),
            "jacket"
        );
    }

    #[test]
    fn top_rule_also_matches_the_message() {
        let lexicon = Lexicon::default();
        assert_eq!(
            infer_category(None, "Soft Ribbed Piece", "black crop top", &lexicon),
            "top"
        );
    }

    #[test]
    fn unknown_name_falls_back_to_other() {
        let lexicon = Lexicon::default();
        assert_eq!(infer_category(None, "Mystery Thing", "mystery", &lexicon), "other");
    }
}
