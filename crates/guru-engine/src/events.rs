//! Events the engine emits to subscribers while a turn runs.

use serde::{Deserialize, Serialize};

use crate::buffer::ResponseSnapshot;
use crate::catalog::ProductRecord;

/// Outgoing event vocabulary. Exactly one terminal event (`Done` or
/// `Error`) ends a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Thinking progress signal shown while the turn is in flight
    Progress {
        content: String,
        step: u32,
        is_final: bool,
    },
    /// Final display text (exactly one per successful turn)
    Text { text: String },
    /// Products attached to the response
    Products { products: Vec<ProductRecord> },
    /// Extracted tip (at most one per turn)
    Tip { tip: String },
    /// Suggested quick replies
    QuickReplies { replies: Vec<String> },
    /// Turn finished; carries the full response
    Done { snapshot: ResponseSnapshot },
    /// Turn failed terminally
    Error {
        message: String,
        retry_suggested: bool,
    },
}

impl EngineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}
