//! Multi-round function-calling loop.
//!
//! Each round consults the model, folds any requested tool calls back
//! into the context, and stops once the model answers without tools.
//! The round bound is a hard cap; hitting it while the model still
//! wants tools is an error.

use std::collections::HashSet;
use std::sync::Arc;

use guru_model::{
    Content, Message, ModelAdapter, ModelContext, ModelEvent, ToolCallRequest, Usage,
};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::buffer::ResponseBuffer;
use crate::error::{Error, Result};
use crate::events::EngineEvent;
use crate::executor::ToolExecutor;
use crate::store::CallerIdentity;
use crate::thinking::ThinkingManager;

/// Localized directive for the single empty-response retry
const SUMMARIZE_NOW: &str =
    "შეაჯამე აქამდე ნაპოვნი ინფორმაცია ახლავე და უპასუხე მომხმარებელს. \
     ინსტრუმენტებს ნუღარ გამოიყენებ.";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Hard cap on model consultations per turn (retry excluded)
    pub max_rounds: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self { max_rounds: 3 }
    }
}

/// How one round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundResult {
    /// Tool calls were made; another round is needed
    Continue,
    /// The model answered with text and no tool calls
    Complete,
    /// Neither text nor tool calls
    Empty,
}

/// What the finished loop reports back to the engine.
#[derive(Debug, Clone, Default)]
pub struct LoopReport {
    pub rounds: usize,
    pub usage: Usage,
}

/// One consultation's collected output.
struct RoundOutput {
    text: String,
    calls: Vec<ToolCallRequest>,
    usage: Usage,
}

pub struct FunctionCallingLoop {
    config: LoopConfig,
    model: Arc<dyn ModelAdapter>,
    executor: Arc<ToolExecutor>,
}

impl FunctionCallingLoop {
    pub fn new(config: LoopConfig, model: Arc<dyn ModelAdapter>, executor: Arc<ToolExecutor>) -> Self {
        Self {
            config,
            model,
            executor,
        }
    }

    /// Drive the loop to completion over `context`.
    ///
    /// Cancellation is honored between rounds only; a consultation in
    /// flight always finishes.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        mut context: ModelContext,
        caller: &CallerIdentity,
        buffer: &ResponseBuffer,
        thinking: &mut ThinkingManager,
        events: &broadcast::Sender<EngineEvent>,
        cancel: &CancellationToken,
    ) -> Result<LoopReport> {
        let mut report = LoopReport::default();
        // Calls executed so far this turn, keyed by (name, canonical args)
        let mut seen: HashSet<(String, String)> = HashSet::new();
        // Tokenless calls carried over from the previous round
        let mut deferred: Vec<ToolCallRequest> = Vec::new();
        let mut result = RoundResult::Empty;

        for round in 1..=self.config.max_rounds {
            if cancel.is_cancelled() {
                info!(round, "turn cancelled between rounds");
                return Err(Error::Cancelled);
            }

            // Calls deferred from the last round run before the model
            // is consulted again, so it sees their results this round.
            for request in std::mem::take(&mut deferred) {
                self.run_call(&request, caller, buffer, thinking, events, &mut seen, &mut context)
                    .await?;
            }

            let output = self.consult(&context).await?;
            report.rounds = round;
            report.usage.accumulate(&output.usage);

            if !output.text.is_empty() {
                buffer.append_text(&output.text);
            }

            if output.calls.is_empty() {
                result = if output.text.is_empty() {
                    RoundResult::Empty
                } else {
                    RoundResult::Complete
                };
                break;
            }

            // Normalize: every call gets a concrete token in the context;
            // originally tokenless calls (all but calls that arrived with
            // one) are deferred to the next round.
            let mut content: Vec<Content> = Vec::new();
            if !output.text.is_empty() {
                content.push(Content::text(output.text.clone()));
            }
            let mut admitted = Vec::new();
            for call in output.calls {
                let (normalized, had_token) = match call.token {
                    Some(_) => (call, true),
                    None => (
                        ToolCallRequest {
                            token: Some(uuid::Uuid::new_v4().to_string()),
                            ..call
                        },
                        false,
                    ),
                };
                content.push(Content::tool_call(normalized.clone()));
                if had_token {
                    admitted.push(normalized);
                } else {
                    debug!(tool = %normalized.name, "call arrived without a token, deferring to next round");
                    deferred.push(normalized);
                }
            }
            context.push(Message::Assistant {
                content,
                timestamp: chrono::Utc::now().timestamp_millis(),
            });

            for request in admitted {
                self.run_call(&request, caller, buffer, thinking, events, &mut seen, &mut context)
                    .await?;
            }

            result = RoundResult::Continue;
        }

        if result == RoundResult::Continue {
            return Err(Error::MaxRoundsExceeded {
                rounds: self.config.max_rounds,
            });
        }

        if !buffer.has_text() {
            self.retry_for_summary(&mut context, buffer, thinking, events, &mut report)
                .await?;
        }

        Ok(report)
    }

    /// Execute one tool call and fold its result into the context.
    #[allow(clippy::too_many_arguments)]
    async fn run_call(
        &self,
        request: &ToolCallRequest,
        caller: &CallerIdentity,
        buffer: &ResponseBuffer,
        thinking: &mut ThinkingManager,
        events: &broadcast::Sender<EngineEvent>,
        seen: &mut HashSet<(String, String)>,
        context: &mut ModelContext,
    ) -> Result<()> {
        // Token presence is guaranteed by normalization in `run`
        let token = request.token.clone().unwrap_or_default();

        let key = (request.name.clone(), request.arguments.to_string());
        if !seen.insert(key) {
            debug!(tool = %request.name, "duplicate tool call skipped");
            context.push(Message::tool_result(
                token,
                &request.name,
                vec![Content::text(
                    serde_json::json!({ "skipped": "duplicate call" }).to_string(),
                )],
                false,
            ));
            return Ok(());
        }

        if let Some(signal) = thinking.tool_signal(&request.name) {
            let _ = events.send(signal.into_event());
        }

        let outcome = self
            .executor
            .execute(&request.name, request.arguments.clone(), caller)
            .await?;
        if !outcome.products.is_empty() {
            buffer.add_products(outcome.products.clone());
        }
        context.push(Message::tool_result(
            token,
            &request.name,
            vec![Content::text(outcome.content.to_string())],
            outcome.is_error,
        ));
        Ok(())
    }

    /// One extra consultation, tools disabled, asking for a summary.
    async fn retry_for_summary(
        &self,
        context: &mut ModelContext,
        buffer: &ResponseBuffer,
        thinking: &mut ThinkingManager,
        events: &broadcast::Sender<EngineEvent>,
        report: &mut LoopReport,
    ) -> Result<()> {
        warn!("no displayable text after loop, retrying once for a summary");
        if let Some(signal) = thinking.retry_signal(buffer.product_count()) {
            let _ = events.send(signal.into_event());
        }

        context.push(Message::user(SUMMARIZE_NOW));
        context.tools.clear();
        let output = self.consult(context).await?;
        report.usage.accumulate(&output.usage);

        if output.text.trim().is_empty() {
            return Err(Error::EmptyResponse);
        }
        buffer.replace_text(&output.text);
        Ok(())
    }

    /// Run one consultation to its terminal event.
    async fn consult(&self, context: &ModelContext) -> Result<RoundOutput> {
        let mut stream = self.model.converse(context.clone()).await?;
        let mut output = RoundOutput {
            text: String::new(),
            calls: Vec::new(),
            usage: Usage::default(),
        };

        while let Some(event) = stream.next().await {
            match event {
                ModelEvent::Text { text } => output.text.push_str(&text),
                ModelEvent::Thinking { .. } => {}
                ModelEvent::ToolCall { request } => output.calls.push(request),
                ModelEvent::Done { usage } => {
                    output.usage = usage;
                    break;
                }
                ModelEvent::Error { message } => {
                    return Err(Error::Model(guru_model::Error::Stream(message)));
                }
            }
        }
        Ok(output)
    }
}
