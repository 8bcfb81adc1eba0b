//! Catalog and render data model.
//!
//! Field names and JSON shapes follow the discovery and render payloads that
//! external callers consume, so everything here derives serde.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a layer can receive a pattern fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Pattern,
    Fixed,
}

impl LayerType {
    pub fn is_customizable(self) -> bool {
        matches!(self, LayerType::Pattern)
    }
}

/// One maskable region of an item's artwork. Higher `index` paints on top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub index: u32,
    pub file: String,
    pub url: String,
    #[serde(rename = "type")]
    pub layer_type: LayerType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub collection_slug: String,
    pub folder_path: String,
    pub layers: Vec<Layer>,
}

impl Item {
    pub fn item_id(collection_slug: &str, item_slug: &str) -> String {
        format!("{collection_slug}-{item_slug}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub slug: String,
    pub name: String,
    pub item_count: usize,
    pub items: Vec<Item>,
}

impl Collection {
    pub fn new(slug: &str, items: Vec<Item>) -> Self {
        Self {
            slug: slug.to_string(),
            name: title_case_slug(slug),
            item_count: items.len(),
            items,
        }
    }
}

/// The discovery snapshot. Always replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub success: bool,
    pub collections: Vec<Collection>,
    pub total_items: usize,
    pub total_layers: usize,
    pub scanned_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
}

impl ScanResult {
    pub fn from_collections(collections: Vec<Collection>, scanned_at: DateTime<Utc>) -> Self {
        let total_items = collections.iter().map(|c| c.items.len()).sum();
        let total_layers = collections
            .iter()
            .flat_map(|c| c.items.iter())
            .map(|i| i.layers.len())
            .sum();
        Self {
            success: true,
            collections,
            total_items,
            total_layers,
            scanned_at,
            cached_at: None,
        }
    }

    pub fn collection(&self, slug: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.slug == slug)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.collections
            .iter()
            .flat_map(|c| c.items.iter())
            .find(|i| i.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub url: String,
}

/// A chosen pattern for one layer of a render request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerCustomization {
    pub layer_index: u32,
    pub pattern_id: String,
    pub pattern_url: String,
    #[serde(default)]
    pub pattern_name: String,
}

impl LayerCustomization {
    pub fn from_pattern(layer_index: u32, pattern: &Pattern) -> Self {
        Self {
            layer_index,
            pattern_id: pattern.id.clone(),
            pattern_url: pattern.url.clone(),
            pattern_name: pattern.name.clone(),
        }
    }
}

/// Customizations keyed by layer index. Built through `render::RenderRequest::validate`,
/// which rejects duplicates before anything reaches the composer.
pub type CustomizationMap = BTreeMap<u32, LayerCustomization>;

/// Canvas dimensions for one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::new(2000, 2000)
    }
}

/// "summer-dress-02" -> "Summer Dress 02"
pub fn title_case_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Numeric slugs compare by value and sort before everything else;
/// the rest compare lexicographically.
pub fn numeric_aware_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_handles_hyphens_and_empty_parts() {
        assert_eq!(title_case_slug("summer-dress"), "Summer Dress");
        assert_eq!(title_case_slug("a--b"), "A B");
        assert_eq!(title_case_slug("tee"), "Tee");
        assert_eq!(title_case_slug(""), "");
    }

    #[test]
    fn numeric_slugs_sort_by_value() {
        let mut slugs = vec!["10", "2", "alpha", "1", "beta"];
        slugs.sort_by(|a, b| numeric_aware_cmp(a, b));
        assert_eq!(slugs, vec!["1", "2", "10", "alpha", "beta"]);
    }

    #[test]
    fn layer_type_serializes_lowercase() {
        let json = serde_json::to_string(&LayerType::Pattern).unwrap();
        assert_eq!(json, "\"pattern\"");
        assert!(!LayerType::Fixed.is_customizable());
    }

    #[test]
    fn scan_result_totals_count_items_and_layers() {
        let layer = Layer {
            index: 0,
            file: "0.png".into(),
            url: "u".into(),
            layer_type: LayerType::Pattern,
        };
        let item = Item {
            id: "c-i".into(),
            slug: "i".into(),
            name: "I".into(),
            collection_slug: "c".into(),
            folder_path: "c/i".into(),
            layers: vec![layer.clone(), Layer { index: 1, ..layer }],
        };
        let result = ScanResult::from_collections(vec![Collection::new("c", vec![item])], Utc::now());
        assert_eq!(result.total_items, 1);
        assert_eq!(result.total_layers, 2);
        assert!(result.item("c-i").is_some());
    }
}
