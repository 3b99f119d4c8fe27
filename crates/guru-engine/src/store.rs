//! Document-store boundary: conversation history and user profiles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Who is making this turn. Always passed explicitly; the engine never
/// reads identity from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub user_id: String,
    pub session_id: String,
}

impl CallerIdentity {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One persisted conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub timestamp: i64,
    /// Position within the session, oldest = 0
    pub index: u32,
}

impl Turn {
    pub fn user(text: impl Into<String>, index: u32) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            index,
        }
    }

    pub fn assistant(text: impl Into<String>, index: u32) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            index,
        }
    }
}

/// Stored user profile. All fields optional; an empty profile is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allergies: Vec<String>,
}

impl UserProfile {
    /// Whether anything is known about this user
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.weight_kg.is_none()
            && self.height_cm.is_none()
            && self.occupation.is_none()
            && self.allergies.is_empty()
    }

    /// Merge non-empty fields of `update` over this profile
    pub fn merge(&mut self, update: UserProfile) {
        if update.name.is_some() {
            self.name = update.name;
        }
        if update.age.is_some() {
            self.age = update.age;
        }
        if update.weight_kg.is_some() {
            self.weight_kg = update.weight_kg;
        }
        if update.height_cm.is_some() {
            self.height_cm = update.height_cm;
        }
        if update.occupation.is_some() {
            self.occupation = update.occupation;
        }
        if !update.allergies.is_empty() {
            self.allergies = update.allergies;
        }
    }
}

/// Persistence boundary for history and profiles.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load the most recent `limit` turns for this session, oldest first
    async fn load_history(&self, caller: &CallerIdentity, limit: usize) -> Result<Vec<Turn>>;

    /// Append one turn to the session
    async fn append_turn(&self, caller: &CallerIdentity, turn: Turn) -> Result<()>;

    /// Load the caller's profile; `None` when nothing is stored yet
    async fn load_profile(&self, caller: &CallerIdentity) -> Result<Option<UserProfile>>;

    /// Persist the caller's profile, replacing any stored one
    async fn save_profile(&self, caller: &CallerIdentity, profile: UserProfile) -> Result<()>;
}

/// In-memory store, for tests and demos.
pub mod memory {
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Inner {
        history: HashMap<CallerIdentity, Vec<Turn>>,
        profiles: HashMap<String, UserProfile>,
    }

    #[derive(Default)]
    pub struct MemoryStore {
        inner: Mutex<Inner>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl DocumentStore for MemoryStore {
        async fn load_history(&self, caller: &CallerIdentity, limit: usize) -> Result<Vec<Turn>> {
            let inner = self.inner.lock();
            let turns = inner.history.get(caller).cloned().unwrap_or_default();
            let skip = turns.len().saturating_sub(limit);
            Ok(turns.into_iter().skip(skip).collect())
        }

        async fn append_turn(&self, caller: &CallerIdentity, turn: Turn) -> Result<()> {
            self.inner
                .lock()
                .history
                .entry(caller.clone())
                .or_default()
                .push(turn);
            Ok(())
        }

        async fn load_profile(&self, caller: &CallerIdentity) -> Result<Option<UserProfile>> {
            Ok(self.inner.lock().profiles.get(&caller.user_id).cloned())
        }

        async fn save_profile(&self, caller: &CallerIdentity, profile: UserProfile) -> Result<()> {
            self.inner
                .lock()
                .profiles
                .insert(caller.user_id.clone(), profile);
            Ok(())
        }
    }
}
