//! Profile read/write tools over the document store.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::store::{CallerIdentity, DocumentStore, UserProfile};
use crate::tool::{Tool, ToolOutcome};

pub struct GetProfileTool {
    store: Arc<dyn DocumentStore>,
}

impl GetProfileTool {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetProfileTool {
    fn name(&self) -> &str {
        "get_profile"
    }

    fn description(&self) -> &str {
        "Read the current user's stored profile (age, weight, height, \
         occupation, allergies). Returns an empty object when nothing is \
         stored."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, _arguments: Value, caller: &CallerIdentity) -> Result<ToolOutcome> {
        let profile = self.store.load_profile(caller).await?.unwrap_or_default();
        match serde_json::to_value(&profile) {
            Ok(value) => Ok(ToolOutcome::json(value)),
            Err(err) => Ok(ToolOutcome::failure(format!(
                "profile serialization failed: {err}"
            ))),
        }
    }
}

pub struct UpdateProfileTool {
    store: Arc<dyn DocumentStore>,
}

impl UpdateProfileTool {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for UpdateProfileTool {
    fn name(&self) -> &str {
        "update_profile"
    }

    fn description(&self) -> &str {
        "Save profile facts the user just shared (age, weight_kg, height_cm, \
         occupation, allergies). Fields not provided keep their stored \
         values."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "age": { "type": "integer", "minimum": 1, "maximum": 120 },
                "weight_kg": { "type": "number", "minimum": 1 },
                "height_cm": { "type": "number", "minimum": 1 },
                "occupation": { "type": "string" },
                "allergies": { "type": "array", "items": { "type": "string" } }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: Value, caller: &CallerIdentity) -> Result<ToolOutcome> {
        let update: UserProfile = match serde_json::from_value(arguments) {
            Ok(update) => update,
            Err(err) => return Ok(ToolOutcome::failure(format!("bad arguments: {err}"))),
        };

        let mut profile = self.store.load_profile(caller).await?.unwrap_or_default();
        profile.merge(update);
        self.store.save_profile(caller, profile.clone()).await?;
        debug!(user = %caller.user_id, "profile updated");

        Ok(ToolOutcome::json(serde_json::json!({
            "saved": true,
            "profile": profile,
        })))
    }
}
