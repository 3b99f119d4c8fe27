//! Thinking progress signals shown to the user while a turn runs.
//!
//! The fixed-sequence strategy fakes "reasoning" with a short localized
//! script keyed by detected intent; the native strategy reserves the
//! channel for real model thinking and emits no scripted signals.

use serde::{Deserialize, Serialize};

use crate::events::EngineEvent;
use crate::query::analyzer::Intent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingStrategy {
    /// No progress signals at all
    None,
    /// Scripted localized sequence keyed by intent
    #[default]
    FixedSequence,
    /// Real model thinking passes through; no scripted signals
    Native,
}

/// One progress signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingSignal {
    pub content: String,
    pub step: u32,
    pub is_final: bool,
}

impl ThinkingSignal {
    pub fn into_event(self) -> EngineEvent {
        EngineEvent::Progress {
            content: self.content,
            step: self.step,
            is_final: self.is_final,
        }
    }
}

/// Produces progress signals for one turn.
pub struct ThinkingManager {
    strategy: ThinkingStrategy,
    step: u32,
}

impl ThinkingManager {
    pub fn new(strategy: ThinkingStrategy) -> Self {
        Self { strategy, step: 0 }
    }

    fn next(&mut self, content: impl Into<String>, is_final: bool) -> ThinkingSignal {
        self.step += 1;
        ThinkingSignal {
            content: content.into(),
            step: self.step,
            is_final,
        }
    }

    fn scripted(&self) -> bool {
        self.strategy == ThinkingStrategy::FixedSequence
    }

    /// Opening signals, before the first consultation
    pub fn initial_signals(&mut self, intent: Intent) -> Vec<ThinkingSignal> {
        if !self.scripted() {
            return Vec::new();
        }
        let script: &[&str] = match intent {
            Intent::ProductSearch => &[
                "ვამუშავებ თქვენს მოთხოვნას...",
                "ვეძებ შესაფერის პროდუქტებს...",
            ],
            Intent::MedicalQuestion => &[
                "ვამოწმებ უსაფრთხოების ინფორმაციას...",
            ],
            Intent::MythQuestion => &[
                "ვამოწმებ სამეცნიერო მონაცემებს...",
            ],
            Intent::Greeting | Intent::General => &["ვფიქრობ..."],
        };
        script.iter().map(|s| self.next(*s, false)).collect()
    }

    /// Signal emitted when a tool starts running
    pub fn tool_signal(&mut self, tool_name: &str) -> Option<ThinkingSignal> {
        if !self.scripted() {
            return None;
        }
        let content = match tool_name {
            "search_products" => "ვათვალიერებ კატალოგს...".to_string(),
            "get_profile" => "ვიხსენებ თქვენს მონაცემებს...".to_string(),
            "update_profile" => "ვიმახსოვრებ თქვენს მონაცემებს...".to_string(),
            other => format!("ვასრულებ: {other}..."),
        };
        Some(self.next(content, false))
    }

    /// Signal ahead of the empty-response summary retry
    pub fn retry_signal(&mut self, product_count: usize) -> Option<ThinkingSignal> {
        if !self.scripted() {
            return None;
        }
        let content = if product_count > 0 {
            format!("ვაჯამებ ნაპოვნ {product_count} პროდუქტს...")
        } else {
            "ვაჯამებ პასუხს...".to_string()
        };
        Some(self.next(content, false))
    }

    /// Closing signal; always `is_final`
    pub fn completion_signal(&mut self) -> Option<ThinkingSignal> {
        if !self.scripted() {
            return None;
        }
        Some(self.next("მზადაა!", true))
    }
}
