//! guru-engine: conversation orchestration over a tool-calling model.
//!
//! A [`ConversationEngine`] mediates between a user and a generative
//! model: it analyzes each message for constraints before consulting
//! the model, drives a bounded multi-round function-calling loop,
//! accumulates the response (text, products, tip, quick replies) and
//! emits typed events while the turn runs.
//!
//! Collaborators are traits: [`ModelAdapter`] (from `guru-model`),
//! [`DocumentStore`] for history and profiles, [`CatalogSearch`] for
//! product lookup.
//!
//! [`ModelAdapter`]: guru_model::ModelAdapter

pub mod buffer;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod query;
pub mod rounds;
pub mod store;
pub mod thinking;
pub mod tool;
pub mod tools;

pub use buffer::{ResponseBuffer, ResponseSnapshot};
pub use catalog::{CatalogSearch, DietaryTag, ProductRecord, SearchFilters};
pub use engine::{ConversationEngine, EngineConfig, TurnRequest};
pub use error::{Error, Result};
pub use events::EngineEvent;
pub use executor::ToolExecutor;
pub use query::{QueryConstraints, analyze};
pub use rounds::{FunctionCallingLoop, LoopConfig, LoopReport};
pub use store::{CallerIdentity, DocumentStore, Turn, TurnRole, UserProfile};
pub use thinking::{ThinkingManager, ThinkingStrategy};
pub use tool::{BoxedTool, Tool, ToolOutcome};
