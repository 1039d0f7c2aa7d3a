// Goods catalog (goods.json), latest snapshot (latest.json) and the built-in item table
use crate::model::FeedValue;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    #[serde(rename = "dataKey")]
    pub data_key: String,
    #[serde(default)]
    pub unit: Option<String>,
}

impl CatalogItem {
    /// Stand-in for a key that is not in the catalog; the feed decides whether it exists.
    pub fn ad_hoc(data_key: &str) -> Self {
        Self {
            name: data_key.to_string(),
            data_key: data_key.to_string(),
            unit: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub items: Vec<CatalogItem>,
}

/// Categories keyed by slug, each listing the items shown on that page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct GoodsCatalog {
    categories: BTreeMap<String, Category>,
}

const BUILTIN_ITEMS: &[(&str, &str, &str)] = &[
    ("Eggs", "eggs", "dozen"),
    ("Milk", "milk", "gallon"),
    ("Bread", "bread", "loaf"),
    ("Gas", "gas", "gallon"),
    ("Bacon", "bacon", "pound"),
    ("Chicken", "chicken", "pound"),
    ("Bananas", "bananas", "pound"),
    ("Oranges", "oranges", "pound"),
    ("Coffee", "coffee", "pound"),
    ("Electricity", "electricity", "KWH"),
];

const BUILTIN_GROUPS: &[(&str, &[&str])] = &[
    ("breakfast", &["eggs", "milk", "bread", "coffee"]),
    ("meats", &["bacon", "chicken"]),
    ("produce", &["bananas", "oranges"]),
    ("utilities", &["electricity", "gas"]),
];

impl GoodsCatalog {
    /// Catalog used when goods.json cannot be fetched.
    pub fn builtin() -> Self {
        let lookup = |key: &str| {
            BUILTIN_ITEMS
                .iter()
                .find(|(_, data_key, _)| *data_key == key)
                .map(|(name, data_key, unit)| CatalogItem {
                    name: name.to_string(),
                    data_key: data_key.to_string(),
                    unit: Some(unit.to_string()),
                })
        };

        let categories = BUILTIN_GROUPS
            .iter()
            .map(|(group, keys)| {
                let category = Category {
                    name: None,
                    items: keys.iter().filter_map(|k| lookup(*k)).collect(),
                };
                (group.to_string(), category)
            })
            .collect();

        Self { categories }
    }

    pub fn category(&self, slug: &str) -> Option<&Category> {
        self.categories.get(slug)
    }

    pub fn category_slugs(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Every item once, in category order.
    pub fn items(&self) -> Vec<&CatalogItem> {
        let mut seen = Vec::new();
        for category in self.categories.values() {
            for item in &category.items {
                if !seen.iter().any(|s: &&CatalogItem| s.data_key == item.data_key) {
                    seen.push(item);
                }
            }
        }
        seen
    }

    pub fn find(&self, data_key: &str) -> Option<&CatalogItem> {
        self.categories
            .values()
            .flat_map(|c| c.items.iter())
            .find(|item| item.data_key == data_key)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(|c| c.items.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SnapshotMetadata {
    #[serde(default, rename = "lastUpdated")]
    pub last_updated: Option<String>,
}

/// Body of `/latest.json`: current national price per data key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LatestSnapshot {
    #[serde(default)]
    pub current: BTreeMap<String, Option<FeedValue>>,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

impl LatestSnapshot {
    pub fn price(&self, data_key: &str) -> Option<f64> {
        self.current.get(data_key)?.as_ref()?.as_f64()
    }
}

/// Items of a category paired with their latest price; unknown groups yield nothing.
pub fn items_with_prices<'a>(
    catalog: &'a GoodsCatalog,
    group: &str,
    snapshot: &LatestSnapshot,
) -> Vec<(&'a CatalogItem, Option<f64>)> {
    catalog
        .category(group)
        .map(|c| {
            c.items
                .iter()
                .map(|item| (item, snapshot.price(&item.data_key)))
                .collect()
        })
        .unwrap_or_default()
}
