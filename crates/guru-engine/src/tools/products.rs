//! Catalog search exposed to the model.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::catalog::{CatalogSearch, DietaryTag, SearchFilters};
use crate::error::Result;
use crate::store::CallerIdentity;
use crate::tool::{Tool, ToolOutcome};

/// Upper bound on products returned per call
const MAX_RESULTS: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    max_price: Option<f64>,
    #[serde(default)]
    dietary: Vec<DietaryTag>,
}

pub struct SearchProductsTool {
    catalog: Arc<dyn CatalogSearch>,
}

impl SearchProductsTool {
    pub fn new(catalog: Arc<dyn CatalogSearch>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for SearchProductsTool {
    fn name(&self) -> &str {
        "search_products"
    }

    fn description(&self) -> &str {
        "Search the supplement catalog. Returns matching in-stock products \
         with prices in GEL. Use max_price to respect the user's budget and \
         dietary to filter (lactose_free, vegan, gluten_free)."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Free-text product search, e.g. 'whey protein'"
                },
                "max_price": {
                    "type": "number",
                    "description": "Maximum price in GEL"
                },
                "dietary": {
                    "type": "array",
                    "items": {
                        "type": "string",
                        "enum": ["lactose_free", "vegan", "gluten_free"]
                    }
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: Value, _caller: &CallerIdentity) -> Result<ToolOutcome> {
        let args: SearchArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(err) => return Ok(ToolOutcome::failure(format!("bad arguments: {err}"))),
        };

        let filters = SearchFilters {
            max_price: args.max_price,
            dietary: args.dietary,
            in_stock_only: true,
        };
        let mut products = self.catalog.search(&args.query, &filters).await?;
        products.retain(|p| p.in_stock);
        if let Some(max_price) = args.max_price {
            products.retain(|p| p.price <= max_price);
        }
        products.truncate(MAX_RESULTS);
        debug!(query = %args.query, found = products.len(), "catalog search");

        let content = serde_json::json!({
            "count": products.len(),
            "products": products.clone(),
        });
        Ok(ToolOutcome::json(content).with_products(products))
    }
}
