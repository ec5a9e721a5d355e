use log::info;
use serde::{ Deserialize, Serialize };
use std::collections::HashSet;
use std::fmt;

use crate::config::lexicon::Lexicon;
use crate::models::product::OutfitItem;

/// The fixed garment buckets used as the merge/conflict key. Derived from
/// free-form category strings, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizedCategory {
    Outerwear,
    Top,
    Bottom,
    Dress,
    Skirt,
    Footwear,
    Bag,
    Headwear,
    Accessories,
    Other,
}

impl NormalizedCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizedCategory::Outerwear => "outerwear",
            NormalizedCategory::Top => "top",
            NormalizedCategory::Bottom => "bottom",
            NormalizedCategory::Dress => "dress",
            NormalizedCategory::Skirt => "skirt",
            NormalizedCategory::Footwear => "footwear",
            NormalizedCategory::Bag => "bag",
            NormalizedCategory::Headwear => "headwear",
            NormalizedCategory::Accessories => "accessories",
            NormalizedCategory::Other => "other",
        }
    }
}

impl fmt::Display for NormalizedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Total, idempotent mapping of a free-form category string onto one of the
/// fixed buckets. Containment check against the lexicon table; no keyword
/// belongs to two buckets, so rule order does not matter. Unknown → `Other`.
pub fn normalize_category(raw: &str, lexicon: &Lexicon) -> NormalizedCategory {
    let cat = raw.to_lowercase();
    if cat.is_empty() {
        return NormalizedCategory::Other;
    }
    for rule in &lexicon.normalize_rules {
        if rule.keywords.iter().any(|k| cat.contains(k.as_str())) {
            return rule.bucket;
        }
    }
    NormalizedCategory::Other
}

fn categories_of(items: &[OutfitItem], lexicon: &Lexicon) -> HashSet<NormalizedCategory> {
    items
        .iter()
        .map(|i| normalize_category(&i.category, lexicon))
        .collect()
}

/// True when at least one prior item shares a normalized category with the
/// incoming set, i.e. this turn displaces something already worn.
pub fn replacement_occurred(
    prior: &[OutfitItem],
    incoming: &[OutfitItem],
    lexicon: &Lexicon
) -> bool {
    if prior.is_empty() || incoming.is_empty() {
        return false;
    }
    let new_categories = categories_of(incoming, lexicon);
    prior.iter().any(|i| new_categories.contains(&normalize_category(&i.category, lexicon)))
}

/// Merge newly chosen items into the prior outfit state. Incoming items
/// displace every prior item sharing their normalized category; everything
/// else survives. Empty incoming is the identity.
pub fn merge_outfit_items(
    prior: Vec<OutfitItem>,
    incoming: Vec<OutfitItem>,
    lexicon: &Lexicon
) -> Vec<OutfitItem> {
    if incoming.is_empty() {
        return prior;
    }
    let new_categories = categories_of(&incoming, lexicon);
    let mut merged: Vec<OutfitItem> = prior
        .into_iter()
        .filter(|item| {
            let cat = normalize_category(&item.category, lexicon);
            let keep = !new_categories.contains(&cat);
            if !keep {
                info!("Replacing prior item '{}' ({})", item.name, cat);
            }
            keep
        })
        .collect();
    merged.extend(incoming);
    merged
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryOnDecision {
    /// An incoming item displaced a prior one; the cached composite still
    /// shows the replaced garment, so regenerate from the original photo
    /// with the full merged list.
    Replacement,
    /// Build incrementally on the prior composite with only the new items.
    Addition,
    /// No usable prior state; compose onto the original photo.
    FirstTime,
}

#[derive(Debug, Clone)]
pub struct TryOnJob {
    pub decision: TryOnDecision,
    pub base_image: String,
    pub items: Vec<OutfitItem>,
}

fn wearable(items: &[OutfitItem]) -> Vec<OutfitItem> {
    items
        .iter()
        .filter(|i| !i.image_url.is_empty())
        .cloned()
        .collect()
}

/// Decide base image and item subset for this turn's composition, or `None`
/// when there is nothing to send to image generation. Items without an image
/// URL stay in the outfit list but are never part of the visual composite.
pub fn plan_try_on(
    prior: &[OutfitItem],
    incoming: &[OutfitItem],
    merged: &[OutfitItem],
    prior_outfit_image: Option<&str>,
    primary_photo_url: &str,
    lexicon: &Lexicon
) -> Option<TryOnJob> {
    let merged_wearable = wearable(merged);
    if merged_wearable.is_empty() {
        return None;
    }

    let prior_image = prior_outfit_image.filter(|s| !s.is_empty());
    let job = if replacement_occurred(prior, incoming, lexicon) {
        TryOnJob {
            decision: TryOnDecision::Replacement,
            base_image: primary_photo_url.to_string(),
            items: merged_wearable,
        }
    } else if let (Some(image), false) = (prior_image, prior.is_empty()) {
        TryOnJob {
            decision: TryOnDecision::Addition,
            base_image: image.to_string(),
            items: wearable(incoming),
        }
    } else {
        TryOnJob {
            decision: TryOnDecision::FirstTime,
            base_image: primary_photo_url.to_string(),
            items: merged_wearable,
        }
    };

    if job.items.is_empty() {
        return None;
    }
    Some(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, category: &str, image: &str) -> OutfitItem {
        OutfitItem {
            name: name.to_string(),
            image_url: image.to_string(),
            product_url: "#".to_string(),
            price: 0.0,
            currency: "USD".to_string(),
            brand: String::new(),
            retailer: String::new(),
            category: category.to_string(),
        }
    }

    #[test]
    fn normalize_is_total_and_idempotent() {
        let lexicon = Lexicon::default();
        for raw in ["puffer", "t-shirt", "Joggers", "gown", "heels", "tote", "beanie", "watch", "???", ""] {
            let bucket = normalize_category(raw, &lexicon);
            assert_eq!(normalize_category(bucket.as_str(), &lexicon), bucket);
        }
        assert_eq!(normalize_category("mystery garment", &lexicon), NormalizedCategory::Other);
    }

    #[test]
    fn merge_with_empty_incoming_is_identity() {
        let lexicon = Lexicon::default();
        let prior = vec![item("Puffer", "jacket", "img")];
        let merged = merge_outfit_items(prior.clone(), vec![], &lexicon);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, prior[0].name);
    }

    #[test]
    fn incoming_displaces_same_category() {
        let lexicon = Lexicon::default();
        let prior = vec![item("Old Jacket", "jacket", "a"), item("Jeans", "jeans", "b")];
        let incoming = vec![item("New Coat", "coat", "c")];
        let merged = merge_outfit_items(prior, incoming, &lexicon);
        let names: Vec<&str> = merged.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Jeans", "New Coat"]);
    }

    #[test]
    fn merged_categories_are_unique() {
        let lexicon = Lexicon::default();
        let prior = vec![item("Jacket", "jacket", "a"), item("Jeans", "jeans", "b")];
        let incoming = vec![item("Coat", "coat", "c"), item("Sneakers", "sneakers", "d")];
        let merged = merge_outfit_items(prior, incoming, &lexicon);
        let mut seen = std::collections::HashSet::new();
        for i in &merged {
            assert!(seen.insert(normalize_category(&i.category, &lexicon)));
        }
    }

    #[test]
    fn merge_is_not_commutative() {
        let lexicon = Lexicon::default();
        let a = vec![item("A", "jacket", "a")];
        let b = vec![item("B", "coat", "b")];
        let ab = merge_outfit_items(a.clone(), b.clone(), &lexicon);
        let ba = merge_outfit_items(b, a, &lexicon);
        assert_eq!(ab[0].name, "B");
        assert_eq!(ba[0].name, "A");
    }

    #[test]
    fn replacement_beats_addition() {
        let lexicon = Lexicon::default();
        let prior = vec![item("Old Jacket", "jacket", "a")];
        let incoming = vec![item("New Jacket", "jacket", "b")];
        let merged = merge_outfit_items(prior.clone(), incoming.clone(), &lexicon);
        let job = plan_try_on(
            &prior,
            &incoming,
            &merged,
            Some("prior-composite.png"),
            "photo.png",
            &lexicon
        ).expect("job");
        assert_eq!(job.decision, TryOnDecision::Replacement);
        assert_eq!(job.base_image, "photo.png");
        assert_eq!(job.items.len(), merged.len());
    }

    #[test]
    fn addition_builds_on_prior_composite() {
        let lexicon = Lexicon::default();
        let prior = vec![item("Jacket", "jacket", "a")];
        let incoming = vec![item("Jeans", "jeans", "b")];
        let merged = merge_outfit_items(prior.clone(), incoming.clone(), &lexicon);
        let job = plan_try_on(
            &prior,
            &incoming,
            &merged,
            Some("prior-composite.png"),
            "photo.png",
            &lexicon
        ).expect("job");
        assert_eq!(job.decision, TryOnDecision::Addition);
        assert_eq!(job.base_image, "prior-composite.png");
        let names: Vec<&str> = job.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Jeans"]);
    }

    #[test]
    fn first_time_uses_primary_photo() {
        let lexicon = Lexicon::default();
        let incoming = vec![item("Top", "top", "b")];
        let merged = incoming.clone();
        let job = plan_try_on(&[], &incoming, &merged, None, "photo.png", &lexicon).expect("job");
        assert_eq!(job.decision, TryOnDecision::FirstTime);
        assert_eq!(job.base_image, "photo.png");
    }

    #[test]
    fn imageless_items_never_reach_generation() {
        let lexicon = Lexicon::default();
        let incoming = vec![item("Top", "top", "")];
        let merged = incoming.clone();
        assert!(plan_try_on(&[], &incoming, &merged, None, "photo.png", &lexicon).is_none());
    }
}
