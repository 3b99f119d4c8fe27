//! Streaming event vocabulary produced by a [`ModelAdapter`].
//!
//! [`ModelAdapter`]: crate::adapter::ModelAdapter

use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use crate::types::{ToolCallRequest, Usage};

/// One typed part of a model consultation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelEvent {
    /// Display text
    Text { text: String },
    /// Thinking/reasoning text (not shown to the end user)
    Thinking { thinking: String },
    /// The model requests a tool invocation
    ToolCall { request: ToolCallRequest },
    /// Consultation finished normally
    Done { usage: Usage },
    /// Consultation failed mid-stream
    Error { message: String },
}

impl ModelEvent {
    /// Terminal events end the consultation stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// Boxed stream of model events, as returned by `ModelAdapter::converse`
pub type ModelEventStream = Pin<Box<dyn Stream<Item = ModelEvent> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        assert!(ModelEvent::Done {
            usage: Usage::default()
        }
        .is_terminal());
        assert!(ModelEvent::Error {
            message: "boom".into()
        }
        .is_terminal());
        assert!(!ModelEvent::Text { text: "hi".into() }.is_terminal());
        assert!(!ModelEvent::ToolCall {
            request: ToolCallRequest::new(None, "get_profile", serde_json::json!({})),
        }
        .is_terminal());
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = ModelEvent::Text { text: "hi".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hi");
    }
}
