//! The adapter trait concrete model providers implement.

use async_trait::async_trait;

use crate::error::Result;
use crate::stream::ModelEventStream;
use crate::types::{Message, ToolSchema};

/// Everything one consultation sends upstream.
#[derive(Debug, Clone, Default)]
pub struct ModelContext {
    /// System prompt (instructions, injected profile/analysis blocks)
    pub system_prompt: String,
    /// Conversation so far, oldest first
    pub messages: Vec<Message>,
    /// Tools the model may call this round; empty disables tool use
    pub tools: Vec<ToolSchema>,
}

impl ModelContext {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    /// Append a message to the context
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// A conversational model the engine can consult.
///
/// Implementations own transport, authentication and wire formats; the
/// engine only ever sees typed [`ModelEvent`]s.
///
/// [`ModelEvent`]: crate::stream::ModelEvent
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Provider identifier, for logging
    fn name(&self) -> &str;

    /// Run one consultation and stream back its typed parts.
    ///
    /// The returned stream ends with a terminal event (`Done` or `Error`).
    async fn converse(&self, context: ModelContext) -> Result<ModelEventStream>;
}
