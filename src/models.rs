use serde::{Deserialize, Serialize};

/// Nutritional facts for one product, per 100 g.
///
/// A nutrient the source does not report is stored as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub protein: f64,
    pub fat: f64,
    pub carbohydrate: f64,
    pub kcal: i64,
}

impl Product {
    pub const COLUMNS: [&'static str; 5] = ["name", "protein", "fat", "carbohydrate", "kcal"];
}
