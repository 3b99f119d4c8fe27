//! Pre-model query orchestration: analysis, constrained pre-search and
//! context injection.

pub mod analyzer;
pub mod inject;
pub mod search;

pub use analyzer::{Intent, QueryConstraints, analyze};
pub use inject::inject_context;
pub use search::{BudgetStatus, ConstrainedSearchResult, search_with_constraints};
