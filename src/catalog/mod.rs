//! Catalog records (dishes and wines) and the sources they are read from.
//!
//! Records are decoded once at the edge into [`CatalogRecord`]; nothing past
//! this module sees loosely typed rows.

mod json;
mod render;
mod sqlite;

pub use json::JsonCatalog;
pub use render::{render_record, MISSING_LIST, MISSING_TEXT};
pub use sqlite::SqliteCatalog;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Maximum number of flavor-profile entries kept per ingredient or main flavor.
pub const MAX_FLAVOR_PROFILES: usize = 6;

/// One `(index, remark)` pair describing a flavor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FlavorProfile {
    #[serde(default)]
    pub index: String,
    #[serde(default)]
    pub remark: String,
}

impl FlavorProfile {
    pub fn new(index: impl Into<String>, remark: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            remark: remark.into(),
        }
    }

    fn is_blank(&self) -> bool {
        self.index.trim().is_empty() && self.remark.trim().is_empty()
    }
}

/// An ingredient of a dish.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ingredient {
    pub name: String,
    pub story: Option<String>,
    pub flavor_profiles: Vec<FlavorProfile>,
}

/// A main flavor of a wine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MainFlavor {
    pub name: String,
    pub flavor_profiles: Vec<FlavorProfile>,
}

/// Flavor description of a wine, in either schema generation.
#[derive(Debug, Clone, PartialEq)]
pub enum WineFlavors {
    /// Main flavors with their own flavor profiles.
    Detailed(Vec<MainFlavor>),
    /// A flat list of flavor tags.
    Tags(Vec<String>),
}

/// A dish on the menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DishRow")]
pub struct Dish {
    pub id: i64,
    pub name: String,
    pub story: Option<String>,
    pub price: f64,
    pub in_stock: bool,
    pub ingredients: Vec<Ingredient>,
}

/// A wine on the wine list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WineRow", into = "WineRow")]
pub struct Wine {
    pub id: i64,
    pub name: String,
    pub story: Option<String>,
    pub price: f64,
    pub in_stock: bool,
    pub flavors: WineFlavors,
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CatalogRecord {
    Dish(Dish),
    Wine(Wine),
}

impl CatalogRecord {
    /// Stable key identifying the record across indexing runs (e.g. `dish-3`).
    pub fn key(&self) -> String {
        match self {
            CatalogRecord::Dish(d) => format!("dish-{}", d.id),
            CatalogRecord::Wine(w) => format!("wine-{}", w.id),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CatalogRecord::Dish(d) => &d.name,
            CatalogRecord::Wine(w) => &w.name,
        }
    }

    pub fn price(&self) -> f64 {
        match self {
            CatalogRecord::Dish(d) => d.price,
            CatalogRecord::Wine(w) => w.price,
        }
    }

    pub fn in_stock(&self) -> bool {
        match self {
            CatalogRecord::Dish(d) => d.in_stock,
            CatalogRecord::Wine(w) => w.in_stock,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CatalogRecord::Dish(_) => "dish",
            CatalogRecord::Wine(_) => "wine",
        }
    }
}

/// Trait for catalog record sources.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch every record in the catalog. Failures are `SourceUnavailable`.
    async fn fetch_all(&self) -> Result<Vec<CatalogRecord>>;
}

/// A fixed set of records held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    records: Vec<CatalogRecord>,
}

impl MemoryCatalog {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl CatalogSource for MemoryCatalog {
    async fn fetch_all(&self) -> Result<Vec<CatalogRecord>> {
        Ok(self.records.clone())
    }
}

// === Wire rows ===
//
// Rows mirror what the catalog database stores: nullable text and nullable
// JSON lists. Converting a row into a record applies the normalisation rules.

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub(crate) struct IngredientRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub story: Option<String>,
    #[serde(default)]
    pub flavor_profiles: Option<Vec<FlavorProfile>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub(crate) struct MainFlavorRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub flavor_profiles: Option<Vec<FlavorProfile>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct DishRow {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub story: Option<String>,
    pub price: f64,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    #[serde(default)]
    pub ingredients: Option<Vec<IngredientRow>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub(crate) struct WineRow {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub story: Option<String>,
    pub price: f64,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_flavors: Option<Vec<MainFlavorRow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavors: Option<Vec<String>>,
}

fn default_in_stock() -> bool {
    true
}

fn clean_text(text: Option<String>) -> Option<String> {
    text.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Drop blank entries and cap the list length.
fn clean_profiles(profiles: Option<Vec<FlavorProfile>>) -> Vec<FlavorProfile> {
    profiles
        .unwrap_or_default()
        .into_iter()
        .filter(|fp| !fp.is_blank())
        .map(|fp| FlavorProfile::new(fp.index.trim(), fp.remark.trim()))
        .take(MAX_FLAVOR_PROFILES)
        .collect()
}

impl From<DishRow> for Dish {
    fn from(row: DishRow) -> Self {
        let ingredients = row
            .ingredients
            .unwrap_or_default()
            .into_iter()
            .filter(|i| !i.name.trim().is_empty())
            .map(|i| Ingredient {
                name: i.name.trim().to_string(),
                story: clean_text(i.story),
                flavor_profiles: clean_profiles(i.flavor_profiles),
            })
            .collect();

        Self {
            id: row.id,
            name: row.name.trim().to_string(),
            story: clean_text(row.story),
            price: row.price,
            in_stock: row.in_stock,
            ingredients,
        }
    }
}

impl From<WineRow> for Wine {
    fn from(row: WineRow) -> Self {
        // The detailed schema wins when a row carries both shapes.
        let flavors = match (row.main_flavors, row.flavors) {
            (Some(main), _) => WineFlavors::Detailed(
                main.into_iter()
                    .filter(|mf| !mf.name.trim().is_empty())
                    .map(|mf| MainFlavor {
                        name: mf.name.trim().to_string(),
                        flavor_profiles: clean_profiles(mf.flavor_profiles),
                    })
                    .collect(),
            ),
            (None, Some(tags)) => WineFlavors::Tags(
                tags.into_iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
            ),
            (None, None) => WineFlavors::Detailed(Vec::new()),
        };

        Self {
            id: row.id,
            name: row.name.trim().to_string(),
            story: clean_text(row.story),
            price: row.price,
            in_stock: row.in_stock,
            flavors,
        }
    }
}

impl From<Wine> for WineRow {
    fn from(wine: Wine) -> Self {
        let (main_flavors, flavors) = match wine.flavors {
            WineFlavors::Detailed(main) => (
                Some(
                    main.into_iter()
                        .map(|mf| MainFlavorRow {
                            name: mf.name,
                            flavor_profiles: Some(mf.flavor_profiles),
                        })
                        .collect(),
                ),
                None,
            ),
            WineFlavors::Tags(tags) => (None, Some(tags)),
        };

        Self {
            id: wine.id,
            name: wine.name,
            story: wine.story,
            price: wine.price,
            in_stock: wine.in_stock,
            main_flavors,
            flavors,
        }
    }
}
