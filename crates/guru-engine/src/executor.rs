//! Tool executor: registry, argument validation, retry-once semantics.

use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::Validator;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::CallerIdentity;
use crate::tool::{BoxedTool, ToolOutcome, to_schema};

/// Executes tool calls requested by the model.
///
/// Unknown tool names are hard errors. Collaborator failures are retried
/// once; a second failure becomes a failed [`ToolOutcome`] so the model
/// can see it and recover in the next round.
pub struct ToolExecutor {
    tools: HashMap<String, BoxedTool>,
    validators: HashMap<String, Arc<Validator>>,
}

impl ToolExecutor {
    pub fn new(tools: Vec<BoxedTool>) -> Self {
        let mut map = HashMap::new();
        let mut validators = HashMap::new();
        for tool in tools {
            let name = tool.name().to_string();
            // An uncompilable schema is a programming error in the tool;
            // such a tool simply skips validation.
            if let Ok(validator) = jsonschema::validator_for(&tool.parameters_schema()) {
                validators.insert(name.clone(), Arc::new(validator));
            } else {
                warn!(tool = %name, "tool parameter schema did not compile, skipping validation");
            }
            map.insert(name, tool);
        }
        Self {
            tools: map,
            validators,
        }
    }

    /// Schemas for every registered tool, for the model context
    pub fn schemas(&self) -> Vec<guru_model::ToolSchema> {
        let mut schemas: Vec<_> = self.tools.values().map(|t| to_schema(t.as_ref())).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute one call. See the type-level docs for the failure policy.
    pub async fn execute(
        &self,
        name: &str,
        arguments: Value,
        caller: &CallerIdentity,
    ) -> Result<ToolOutcome> {
        let tool = self.tools.get(name).ok_or_else(|| Error::UnknownTool {
            name: name.to_string(),
        })?;

        if let Some(validator) = self.validators.get(name) {
            let problems: Vec<String> = validator
                .iter_errors(&arguments)
                .map(|e| e.to_string())
                .collect();
            if !problems.is_empty() {
                debug!(tool = %name, ?problems, "tool arguments failed schema validation");
                return Ok(ToolOutcome::failure(format!(
                    "invalid arguments: {}",
                    problems.join("; ")
                )));
            }
        }

        match tool.execute(arguments.clone(), caller).await {
            Ok(outcome) => Ok(outcome),
            Err(first) => {
                warn!(tool = %name, error = %first, "tool failed, retrying once");
                match tool.execute(arguments, caller).await {
                    Ok(outcome) => Ok(outcome),
                    Err(second) => {
                        warn!(tool = %name, error = %second, "tool failed after retry");
                        Ok(ToolOutcome::failure(format!(
                            "tool {name} failed: {second}"
                        )))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::tool::Tool;

    struct CountingTool {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl CountingTool {
        fn new(fail_first: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first,
            }
        }
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "counting"
        }

        fn description(&self) -> &str {
            "Fails a configured number of times, then succeeds"
        }

        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": { "n": { "type": "integer" } },
            })
        }

        async fn execute(&self, _arguments: Value, _caller: &CallerIdentity) -> Result<ToolOutcome> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(Error::Catalog("transient".into()))
            } else {
                Ok(ToolOutcome::json(serde_json::json!({ "call": call })))
            }
        }
    }

    fn caller() -> CallerIdentity {
        CallerIdentity::new("u1", "s1")
    }

    #[tokio::test]
    async fn test_unknown_tool_is_hard_error() {
        let executor = ToolExecutor::new(vec![]);
        let err = executor
            .execute("nope", serde_json::json!({}), &caller())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTool { name } if name == "nope"));
    }

    #[tokio::test]
    async fn test_retry_once_recovers() {
        let executor = ToolExecutor::new(vec![Arc::new(CountingTool::new(1))]);
        let outcome = executor
            .execute("counting", serde_json::json!({}), &caller())
            .await
            .unwrap();
        assert!(!outcome.is_error);
        assert_eq!(outcome.content["call"], 1);
    }

    #[tokio::test]
    async fn test_second_failure_becomes_failed_outcome() {
        let executor = ToolExecutor::new(vec![Arc::new(CountingTool::new(2))]);
        let outcome = executor
            .execute("counting", serde_json::json!({}), &caller())
            .await
            .unwrap();
        assert!(outcome.is_error);
        let message = outcome.content["error"].as_str().unwrap();
        assert!(message.contains("counting"));
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_failed_outcome_without_execution() {
        let tool = Arc::new(CountingTool::new(0));
        let executor = ToolExecutor::new(vec![tool.clone()]);
        let outcome = executor
            .execute("counting", serde_json::json!({ "n": "not a number" }), &caller())
            .await
            .unwrap();
        assert!(outcome.is_error);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_schemas_sorted_by_name() {
        let executor = ToolExecutor::new(vec![Arc::new(CountingTool::new(0))]);
        let schemas = executor.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "counting");
        assert!(executor.has_tool("counting"));
    }
}
