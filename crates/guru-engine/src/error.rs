//! Engine error taxonomy.
//!
//! Tool collaborator failures never surface here; the executor folds them
//! into the conversation as failed tool results so the model can recover.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Localized message shown to the end user when a turn fails terminally.
pub const TERMINAL_FAILURE_MESSAGE: &str =
    "ბოდიში, პასუხის მომზადება ვერ მოხერხდა. სცადეთ კიდევ ერთხელ.";

#[derive(Debug, Error)]
pub enum Error {
    /// The model requested a tool the executor does not know
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    /// The model produced no display text, even after the summary retry
    #[error("model produced no displayable response")]
    EmptyResponse,

    /// The loop hit its round bound while the model still wanted tools
    #[error("tool-calling loop exceeded {rounds} rounds")]
    MaxRoundsExceeded { rounds: usize },

    /// The turn was cancelled between rounds
    #[error("turn cancelled")]
    Cancelled,

    /// Document store failure
    #[error("store error: {0}")]
    Store(String),

    /// Catalog collaborator failure
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Upstream model failure
    #[error(transparent)]
    Model(#[from] guru_model::Error),
}

impl Error {
    /// Whether the caller should offer the user an immediate retry
    pub fn retry_suggested(&self) -> bool {
        matches!(self, Self::EmptyResponse)
    }

    /// Localized user-facing message; never leaks upstream detail
    pub fn user_message(&self) -> &'static str {
        TERMINAL_FAILURE_MESSAGE
    }
}
