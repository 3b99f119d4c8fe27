//! Tool trait and outcome type.

use std::sync::Arc;

use async_trait::async_trait;
use guru_model::ToolSchema;
use serde_json::Value;

use crate::catalog::ProductRecord;
use crate::error::Result;
use crate::store::CallerIdentity;

/// What a tool produced. `is_error` outcomes are folded into the
/// conversation so the model can adjust; they never abort the turn.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// JSON payload handed back to the model
    pub content: Value,
    /// Products surfaced by this call, forwarded to the accumulator
    pub products: Vec<ProductRecord>,
    pub is_error: bool,
}

impl ToolOutcome {
    /// Successful outcome with a JSON payload
    pub fn json(content: Value) -> Self {
        Self {
            content,
            products: Vec::new(),
            is_error: false,
        }
    }

    /// Failed outcome; `message` goes to the model, not the user
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            content: serde_json::json!({ "error": message.into() }),
            products: Vec::new(),
            is_error: true,
        }
    }

    pub fn with_products(mut self, products: Vec<ProductRecord>) -> Self {
        self.products = products;
        self
    }
}

/// A capability the model can invoke during a turn.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call this tool
    fn name(&self) -> &str;

    /// Description shown to the model
    fn description(&self) -> &str;

    /// JSON Schema for the arguments
    fn parameters_schema(&self) -> Value;

    /// Run the tool for `caller`. Returns `Err` only for collaborator
    /// failures; domain-level misses are successful outcomes.
    async fn execute(&self, arguments: Value, caller: &CallerIdentity) -> Result<ToolOutcome>;
}

/// Shared tool handle
pub type BoxedTool = Arc<dyn Tool>;

/// Convert a tool to the schema handed to the model
pub fn to_schema(tool: &dyn Tool) -> ToolSchema {
    ToolSchema::new(tool.name(), tool.description(), tool.parameters_schema())
}
