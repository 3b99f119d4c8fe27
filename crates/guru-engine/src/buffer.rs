//! Thread-safe response accumulator.
//!
//! Rounds and tool executions append concurrently; extraction of the tip
//! and quick replies happens exactly once, at finalization.

use std::collections::HashSet;
use std::sync::LazyLock;

use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::ProductRecord;

static TIP_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[TIP\](.*?)\[/TIP\]").unwrap());

static QUICK_REPLIES_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[QUICK_REPLIES\]\s*(.*?)\s*\z").unwrap());

/// Maximum quick replies surfaced to the client
const MAX_QUICK_REPLIES: usize = 3;

#[derive(Default)]
struct BufferState {
    text: String,
    products: Vec<ProductRecord>,
    seen_ids: HashSet<String>,
    tip: Option<String>,
    tip_extracted: bool,
    quick_replies: Vec<String>,
}

/// Immutable view of the finished response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub text: String,
    pub products: Vec<ProductRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<String>,
}

/// Accumulates text, products, tip and quick replies across rounds.
#[derive(Default)]
pub struct ResponseBuffer {
    state: Mutex<BufferState>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append display text from a round
    pub fn append_text(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        if !state.text.is_empty() && !state.text.ends_with('\n') {
            state.text.push('\n');
        }
        state.text.push_str(text);
    }

    /// Replace all accumulated text (used by the summary retry)
    pub fn replace_text(&self, text: &str) {
        self.state.lock().text = text.to_string();
    }

    /// Add products, first occurrence of each id wins
    pub fn add_products(&self, products: Vec<ProductRecord>) {
        let mut state = self.state.lock();
        for product in products {
            if state.seen_ids.insert(product.id.clone()) {
                state.products.push(product);
            }
        }
    }

    pub fn has_text(&self) -> bool {
        !self.state.lock().text.trim().is_empty()
    }

    pub fn product_count(&self) -> usize {
        self.state.lock().products.len()
    }

    /// Extract the `[TIP]…[/TIP]` span from the accumulated text.
    ///
    /// Idempotent. The first span becomes the tip; all spans are removed
    /// from the display text. Once extraction has run (even finding
    /// nothing) later calls never produce a tip.
    pub fn extract_tip(&self) -> Option<String> {
        let mut state = self.state.lock();
        if state.tip_extracted {
            return state.tip.clone();
        }
        state.tip_extracted = true;

        if let Some(captures) = TIP_SPAN.captures(&state.text) {
            let tip = captures[1].trim().to_string();
            state.text = TIP_SPAN.replace_all(&state.text, "").trim().to_string();
            if !tip.is_empty() {
                state.tip = Some(tip);
            }
        }
        state.tip.clone()
    }

    /// Pull a trailing `[QUICK_REPLIES]` block out of the display text.
    ///
    /// One reply per line, optional `- ` prefix, at most three kept.
    pub fn parse_quick_replies(&self) -> Vec<String> {
        let mut state = self.state.lock();
        if let Some(captures) = QUICK_REPLIES_BLOCK.captures(&state.text) {
            let replies: Vec<String> = captures[1]
                .lines()
                .map(|line| line.trim().trim_start_matches("- ").trim().to_string())
                .filter(|line| !line.is_empty())
                .take(MAX_QUICK_REPLIES)
                .collect();
            state.text = QUICK_REPLIES_BLOCK
                .replace(&state.text, "")
                .trim()
                .to_string();
            state.quick_replies = replies;
        }
        state.quick_replies.clone()
    }

    /// Snapshot the finished response
    pub fn snapshot(&self) -> ResponseSnapshot {
        let state = self.state.lock();
        ResponseSnapshot {
            text: state.text.trim().to_string(),
            products: state.products.clone(),
            tip: state.tip.clone(),
            quick_replies: state.quick_replies.clone(),
        }
    }
}
