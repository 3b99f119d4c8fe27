//! Conversation engine: one entry point per user turn.
//!
//! Wires the query orchestrator, the function-calling loop, persistence
//! and the outgoing event channel together.

use std::sync::Arc;

use guru_model::{Message, ModelAdapter, ModelContext};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::buffer::{ResponseBuffer, ResponseSnapshot};
use crate::catalog::CatalogSearch;
use crate::error::Result;
use crate::events::EngineEvent;
use crate::executor::ToolExecutor;
use crate::query;
use crate::rounds::{FunctionCallingLoop, LoopConfig};
use crate::store::{CallerIdentity, DocumentStore, Turn, TurnRole};
use crate::thinking::{ThinkingManager, ThinkingStrategy};
use crate::tools::{GetProfileTool, SearchProductsTool, UpdateProfileTool};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_rounds: usize,
    /// History turns loaded into each consultation
    pub history_limit: usize,
    /// Products kept per category during constrained pre-search
    pub max_per_category: usize,
    pub system_prompt: String,
    pub thinking: ThinkingStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            history_limit: 20,
            max_per_category: 3,
            system_prompt: String::new(),
            thinking: ThinkingStrategy::FixedSequence,
        }
    }
}

/// One user turn. Identity always travels with the request.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub caller: CallerIdentity,
    pub message: String,
}

pub struct ConversationEngine {
    config: EngineConfig,
    model: Arc<dyn ModelAdapter>,
    store: Arc<dyn DocumentStore>,
    catalog: Arc<dyn CatalogSearch>,
    executor: Arc<ToolExecutor>,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl ConversationEngine {
    pub fn new(
        config: EngineConfig,
        model: Arc<dyn ModelAdapter>,
        store: Arc<dyn DocumentStore>,
        catalog: Arc<dyn CatalogSearch>,
    ) -> Self {
        let executor = Arc::new(ToolExecutor::new(vec![
            Arc::new(SearchProductsTool::new(Arc::clone(&catalog))),
            Arc::new(GetProfileTool::new(Arc::clone(&store))),
            Arc::new(UpdateProfileTool::new(Arc::clone(&store))),
        ]));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            model,
            store,
            catalog,
            executor,
            event_tx,
        }
    }

    /// Subscribe to the engine's event stream
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Run one user turn to completion.
    ///
    /// On failure an `Error` event is emitted and only the user's turn
    /// stays persisted.
    pub async fn run_turn(
        &self,
        request: TurnRequest,
        cancel: CancellationToken,
    ) -> Result<ResponseSnapshot> {
        match self.run_turn_inner(&request, &cancel).await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                warn!(error = %err, user = %request.caller.user_id, "turn failed");
                let _ = self.event_tx.send(EngineEvent::Error {
                    message: err.user_message().to_string(),
                    retry_suggested: err.retry_suggested(),
                });
                Err(err)
            }
        }
    }

    async fn run_turn_inner(
        &self,
        request: &TurnRequest,
        cancel: &CancellationToken,
    ) -> Result<ResponseSnapshot> {
        let caller = &request.caller;
        let history = self
            .store
            .load_history(caller, self.config.history_limit)
            .await?;
        let next_index = history.last().map(|t| t.index + 1).unwrap_or(0);

        // The user's turn is persisted up front so a failed turn still
        // leaves the question in the transcript.
        self.store
            .append_turn(caller, Turn::user(&request.message, next_index))
            .await?;

        // A missing profile degrades the turn, never fails it
        let profile = match self.store.load_profile(caller).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(error = %err, "profile load failed, continuing without");
                None
            }
        };

        let constraints = query::analyze(&request.message, &history);
        info!(
            intent = ?constraints.intent,
            budget = ?constraints.budget,
            products = constraints.products.len(),
            "query analyzed"
        );

        let presearch = if constraints.wants_presearch() {
            match query::search_with_constraints(
                &self.catalog,
                &constraints,
                self.config.max_per_category,
            )
            .await
            {
                Ok(result) => result,
                Err(err) => {
                    warn!(error = %err, "constrained pre-search failed, continuing without");
                    None
                }
            }
        } else {
            None
        };

        let system_prompt = query::inject_context(
            &self.config.system_prompt,
            profile.as_ref(),
            &constraints,
            presearch.as_ref(),
        );

        let mut thinking = ThinkingManager::new(self.config.thinking);
        for signal in thinking.initial_signals(constraints.intent) {
            let _ = self.event_tx.send(signal.into_event());
        }

        let mut context = ModelContext::new(system_prompt).with_tools(self.executor.schemas());
        for turn in &history {
            context.push(match turn.role {
                TurnRole::User => Message::user(&turn.text),
                TurnRole::Assistant => Message::assistant(&turn.text),
            });
        }
        context.push(Message::user(&request.message));

        let buffer = ResponseBuffer::new();
        if let Some(result) = &presearch {
            buffer.add_products(result.products.clone());
        }

        let looper = FunctionCallingLoop::new(
            LoopConfig {
                max_rounds: self.config.max_rounds,
            },
            Arc::clone(&self.model),
            Arc::clone(&self.executor),
        );
        let report = looper
            .run(context, caller, &buffer, &mut thinking, &self.event_tx, cancel)
            .await?;
        info!(rounds = report.rounds, output_tokens = report.usage.output, "loop finished");

        // Finalize: single extraction point for tip and quick replies
        let tip = buffer.extract_tip();
        let quick_replies = buffer.parse_quick_replies();
        let snapshot = buffer.snapshot();

        if let Some(signal) = thinking.completion_signal() {
            let _ = self.event_tx.send(signal.into_event());
        }
        let _ = self.event_tx.send(EngineEvent::Text {
            text: snapshot.text.clone(),
        });
        if !snapshot.products.is_empty() {
            let _ = self.event_tx.send(EngineEvent::Products {
                products: snapshot.products.clone(),
            });
        }
        if let Some(tip) = tip {
            let _ = self.event_tx.send(EngineEvent::Tip { tip });
        }
        if !quick_replies.is_empty() {
            let _ = self.event_tx.send(EngineEvent::QuickReplies {
                replies: quick_replies,
            });
        }

        // Assistant-turn persistence failure is logged, not fatal; the
        // user already has the answer.
        if let Err(err) = self
            .store
            .append_turn(caller, Turn::assistant(&snapshot.text, next_index + 1))
            .await
        {
            warn!(error = %err, "failed to persist assistant turn");
        }

        let _ = self.event_tx.send(EngineEvent::Done {
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }
}

impl std::fmt::Debug for ConversationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationEngine")
            .field("config", &self.config)
            .field("model", &self.model.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use guru_model::{ModelEvent, ToolCallRequest, Usage};
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::catalog::{ProductRecord, SearchFilters};
    use crate::error::Error;
    use crate::store::memory::MemoryStore;

    struct MockModel {
        scripts: Mutex<Vec<Vec<ModelEvent>>>,
        contexts: Mutex<Vec<ModelContext>>,
    }

    impl MockModel {
        fn new(scripts: Vec<Vec<ModelEvent>>) -> Self {
            Self {
                scripts: Mutex::new(scripts),
                contexts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelAdapter for MockModel {
        fn name(&self) -> &str {
            "mock"
        }

        async fn converse(
            &self,
            context: ModelContext,
        ) -> guru_model::Result<guru_model::ModelEventStream> {
            self.contexts.lock().push(context);
            let mut scripts = self.scripts.lock();
            let events = if scripts.is_empty() {
                vec![ModelEvent::Done {
                    usage: Usage::default(),
                }]
            } else {
                scripts.remove(0)
            };
            Ok(Box::pin(async_stream::stream! {
                for event in events {
                    yield event;
                }
            }))
        }
    }

    struct FixedCatalog;

    #[async_trait]
    impl CatalogSearch for FixedCatalog {
        async fn search(
            &self,
            query: &str,
            _filters: &SearchFilters,
        ) -> Result<Vec<ProductRecord>> {
            let products = vec![
                ProductRecord {
                    id: "w1".into(),
                    name: "Whey Isolate 900g".into(),
                    brand: None,
                    price: 120.0,
                    category: "protein".into(),
                    in_stock: true,
                },
                ProductRecord {
                    id: "c1".into(),
                    name: "Creatine Monohydrate".into(),
                    brand: None,
                    price: 45.0,
                    category: "creatine".into(),
                    in_stock: true,
                },
            ];
            Ok(products
                .into_iter()
                .filter(|p| p.category.contains(query.split_whitespace().next().unwrap_or("")))
                .collect())
        }
    }

    fn text(value: &str) -> ModelEvent {
        ModelEvent::Text { text: value.into() }
    }

    fn done() -> ModelEvent {
        ModelEvent::Done {
            usage: Usage::default(),
        }
    }

    fn engine(scripts: Vec<Vec<ModelEvent>>) -> (ConversationEngine, Arc<MockModel>, Arc<MemoryStore>) {
        let model = Arc::new(MockModel::new(scripts));
        let store = Arc::new(MemoryStore::new());
        let engine = ConversationEngine::new(
            EngineConfig {
                system_prompt: "შენ ხარ დანამატების კონსულტანტი.".into(),
                ..Default::default()
            },
            model.clone() as Arc<dyn ModelAdapter>,
            store.clone() as Arc<dyn DocumentStore>,
            Arc::new(FixedCatalog),
        );
        (engine, model, store)
    }

    fn request(message: &str) -> TurnRequest {
        TurnRequest {
            caller: CallerIdentity::new("u1", "s1"),
            message: message.into(),
        }
    }

    fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_simple_turn_emits_text_and_done() {
        let (engine, _, store) = engine(vec![vec![text("გამარჯობა!"), done()]]);
        let mut rx = engine.subscribe();

        let snapshot = engine
            .run_turn(request("გამარჯობა"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(snapshot.text, "გამარჯობა!");

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, EngineEvent::Text { .. })));
        assert!(matches!(events.last(), Some(EngineEvent::Done { .. })));

        // both turns persisted
        let caller = CallerIdentity::new("u1", "s1");
        let history = store.load_history(&caller, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(history[1].text, "გამარჯობა!");
    }

    #[tokio::test]
    async fn test_budget_constraints_injected_into_system_prompt() {
        let (engine, model, _) = engine(vec![vec![text("აი ვარიანტები"), done()]]);
        engine
            .run_turn(
                request("I have 150 in budget and dairy intolerance, want protein"),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let contexts = model.contexts.lock();
        let prompt = &contexts[0].system_prompt;
        assert!(prompt.contains("[ANALYSIS]"));
        assert!(prompt.contains("ბიუჯეტი: 150 ლარი"));
        assert!(prompt.contains("წინასწარი ძიება"));
        // lactose filter kept the isolate
        assert!(prompt.contains("Whey Isolate"));
    }

    #[tokio::test]
    async fn test_presearch_products_reach_snapshot_and_events() {
        let (engine, _, _) = engine(vec![vec![text("გირჩევთ ამას"), done()]]);
        let mut rx = engine.subscribe();
        let snapshot = engine
            .run_turn(
                request("I have 200 in budget, want protein and creatine"),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(snapshot.products.len(), 2);

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::Products { products } if products.len() == 2)));
    }

    #[tokio::test]
    async fn test_tool_call_turn_folds_products() {
        let (engine, _, _) = engine(vec![
            vec![
                ModelEvent::ToolCall {
                    request: ToolCallRequest::new(
                        Some("t1".into()),
                        "search_products",
                        json!({ "query": "creatine" }),
                    ),
                },
                done(),
            ],
            vec![text("ნაპოვნია კრეატინი"), done()],
        ]);
        let snapshot = engine
            .run_turn(request("მინდა კრეატინი"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(snapshot.text, "ნაპოვნია კრეატინი");
        assert_eq!(snapshot.products.len(), 1);
        assert_eq!(snapshot.products[0].id, "c1");
    }

    #[tokio::test]
    async fn test_tip_and_quick_replies_extracted_once() {
        let (engine, _, _) = engine(vec![vec![
            text("აი პასუხი [TIP]წყალი ბევრი დალიეთ[/TIP]\n[QUICK_REPLIES]\n- პროტეინი\n- კრეატინი\n"),
            done(),
        ]]);
        let mut rx = engine.subscribe();
        let snapshot = engine
            .run_turn(request("რა მირჩევ?"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(snapshot.tip.as_deref(), Some("წყალი ბევრი დალიეთ"));
        assert_eq!(snapshot.quick_replies, vec!["პროტეინი", "კრეატინი"]);
        assert!(!snapshot.text.contains("[TIP]"));

        let events = drain(&mut rx);
        let tips = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::Tip { .. }))
            .count();
        assert_eq!(tips, 1);
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::QuickReplies { replies } if replies.len() == 2)));
    }

    #[tokio::test]
    async fn test_failed_turn_emits_error_and_keeps_user_turn_only() {
        // empty round, then empty retry
        let (engine, _, store) = engine(vec![vec![done()], vec![done()]]);
        let mut rx = engine.subscribe();
        let err = engine
            .run_turn(request("რამე მითხარი"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyResponse));

        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(EngineEvent::Error {
                retry_suggested: true,
                ..
            })
        ));

        let caller = CallerIdentity::new("u1", "s1");
        let history = store.load_history(&caller, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, TurnRole::User);
    }

    #[tokio::test]
    async fn test_history_flows_into_context() {
        let (engine, model, store) = engine(vec![
            vec![text("პირველი პასუხი"), done()],
            vec![text("მეორე პასუხი"), done()],
        ]);
        engine
            .run_turn(request("პირველი კითხვა"), CancellationToken::new())
            .await
            .unwrap();
        engine
            .run_turn(request("მეორე კითხვა"), CancellationToken::new())
            .await
            .unwrap();

        let contexts = model.contexts.lock();
        let second = &contexts[1];
        // prior user + prior assistant + current user
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[0].text(), "პირველი კითხვა");
        assert_eq!(second.messages[1].text(), "პირველი პასუხი");

        let caller = CallerIdentity::new("u1", "s1");
        let history = store.load_history(&caller, 10).await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[3].index, 3);
    }
}
