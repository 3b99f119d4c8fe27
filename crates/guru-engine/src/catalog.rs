//! Catalog collaborator boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A product as returned by the catalog collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    /// Price in GEL
    pub price: f64,
    pub category: String,
    #[serde(default = "default_true")]
    pub in_stock: bool,
}

fn default_true() -> bool {
    true
}

/// Dietary restrictions the search can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietaryTag {
    LactoseFree,
    Vegan,
    GlutenFree,
}

/// Filters forwarded to the catalog collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dietary: Vec<DietaryTag>,
    #[serde(default)]
    pub in_stock_only: bool,
}

/// Product catalog the engine searches on the user's behalf.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Free-text search with optional filters, best matches first.
    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<ProductRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_defaults_in_stock() {
        let product: ProductRecord = serde_json::from_value(serde_json::json!({
            "id": "p1",
            "name": "Whey Protein",
            "price": 120.0,
            "category": "protein",
        }))
        .unwrap();
        assert!(product.in_stock);
        assert!(product.brand.is_none());
    }

    #[test]
    fn test_filters_serialize_compactly() {
        let filters = SearchFilters::default();
        let json = serde_json::to_value(&filters).unwrap();
        assert!(json.get("max_price").is_none());
        assert!(json.get("dietary").is_none());
    }
}
