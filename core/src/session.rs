//! Conversation sessions keyed by an opaque id.
//!
//! Each session sits behind its own async mutex inside a `DashMap`, so a
//! turn for one session never blocks another, while two requests for the
//! same session queue on the lock instead of interleaving their appends.

use crate::{ParleyError, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful and friendly voice assistant. \
Answer concisely and naturally, as if you were speaking. Your replies will be \
converted to audio, so avoid markdown formatting and special characters.";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum number of turns kept per session, system turn included
    pub history_limit: usize,
    /// System prompt seeded into new sessions
    pub system_prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: std::env::var("CHAT_HISTORY_LIMIT")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(20),
            system_prompt: std::env::var("CHAT_SYSTEM_PROMPT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of a conversation. Serializes to the chat wire shape
/// `{"role": ..., "content": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    role: Role,
    content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered turns of one conversation, bounded by `limit`.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: String,
    turns: Vec<ConversationTurn>,
    limit: usize,
}

impl ConversationSession {
    pub fn new(id: impl Into<String>, system_prompt: &str, limit: usize) -> Self {
        let mut turns = Vec::new();
        if !system_prompt.is_empty() {
            turns.push(ConversationTurn::system(system_prompt));
        }
        Self {
            id: id.into(),
            turns,
            limit: limit.max(1),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn has_system_turn(&self) -> bool {
        self.turns
            .first()
            .map(|t| t.role == Role::System)
            .unwrap_or(false)
    }

    /// Append a turn, then drop the oldest non-system turns beyond the limit.
    ///
    /// A system turn is never appended at the end: it replaces the current
    /// system turn, or is inserted at index 0 when the session has none.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        let turn = ConversationTurn::new(role, content);
        if role == Role::System {
            if self.has_system_turn() {
                self.turns[0] = turn;
            } else {
                self.turns.insert(0, turn);
            }
        } else {
            self.turns.push(turn);
        }
        self.trim();
    }

    /// Reset to the system turn only (or to nothing if there never was one).
    pub fn clear(&mut self) {
        let keep = usize::from(self.has_system_turn());
        self.turns.truncate(keep);
    }

    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.turns.clone()
    }

    fn trim(&mut self) {
        if self.turns.len() <= self.limit {
            return;
        }
        let pinned = usize::from(self.has_system_turn());
        let excess = self.turns.len() - self.limit;
        // System turn stays at index 0; the drained range starts right after it.
        self.turns.drain(pinned..pinned + excess);
        debug!(
            target = "session_store",
            session_id = %self.id,
            dropped = excess,
            "Trimmed conversation history"
        );
    }
}

/// Owns every live session. Shared behind `Arc` by request handlers.
pub struct SessionStore {
    sessions: DashMap<String, Arc<Mutex<ConversationSession>>>,
    history_limit: usize,
}

impl SessionStore {
    pub fn new(history_limit: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            history_limit: history_limit.max(1),
        }
    }

    pub fn from_config(cfg: &SessionConfig) -> Self {
        Self::new(cfg.history_limit)
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Return the session handle, seeding a new session with `system_prompt` if absent.
    pub fn get_or_create(
        &self,
        session_id: &str,
        system_prompt: &str,
    ) -> Arc<Mutex<ConversationSession>> {
        // The entry guard is dropped before the caller ever awaits on the mutex.
        let entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(target = "session_store", session_id = %session_id, "Creating session");
                Arc::new(Mutex::new(ConversationSession::new(
                    session_id,
                    system_prompt,
                    self.history_limit,
                )))
            });
        Arc::clone(entry.value())
    }

    /// Exclusive access to a session for the duration of a whole turn.
    pub async fn lock(
        &self,
        session_id: &str,
        system_prompt: &str,
    ) -> OwnedMutexGuard<ConversationSession> {
        self.get_or_create(session_id, system_prompt)
            .lock_owned()
            .await
    }

    pub async fn append(&self, session_id: &str, role: Role, text: &str) -> Result<()> {
        let handle = self.handle(session_id)?;
        let mut session = handle.lock().await;
        session.append(role, text);
        Ok(())
    }

    pub async fn clear(&self, session_id: &str) -> Result<()> {
        let handle = self.handle(session_id)?;
        handle.lock().await.clear();
        debug!(target = "session_store", session_id = %session_id, "Cleared session history");
        Ok(())
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        let handle = self.handle(session_id)?;
        let session = handle.lock().await;
        Ok(session.snapshot())
    }

    /// Drop a session entirely.
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    fn handle(&self, session_id: &str) -> Result<Arc<Mutex<ConversationSession>>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ParleyError::SessionNotFound(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trim_keeps_system_turn_and_most_recent() {
        let mut session = ConversationSession::new("s", "sys", 20);
        for i in 0..25 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            session.append(role, format!("turn {i}"));
        }
        assert_eq!(session.len(), 20);
        assert_eq!(session.turns()[0], ConversationTurn::system("sys"));
        assert_eq!(session.turns()[1].content(), "turn 6");
        assert_eq!(session.turns()[19].content(), "turn 24");
    }

    #[test]
    fn trim_without_system_turn_keeps_latest() {
        let mut session = ConversationSession::new("s", "", 3);
        for i in 0..5 {
            session.append(Role::User, format!("{i}"));
        }
        let contents: Vec<_> = session.turns().iter().map(|t| t.content()).collect();
        assert_eq!(contents, vec!["2", "3", "4"]);
    }

    #[test]
    fn bound_holds_after_every_append() {
        for limit in 1..6 {
            let mut session = ConversationSession::new("s", "sys", limit);
            for i in 0..12 {
                session.append(Role::User, format!("{i}"));
                assert!(session.len() <= limit);
                assert_eq!(session.turns()[0].role(), Role::System);
            }
        }
    }

    #[test]
    fn clear_preserves_system_turn() {
        let mut session = ConversationSession::new("s", "sys", 10);
        session.append(Role::User, "hi");
        session.append(Role::Assistant, "hello");
        session.clear();
        assert_eq!(session.turns(), &[ConversationTurn::system("sys")]);

        let mut bare = ConversationSession::new("b", "", 10);
        bare.append(Role::User, "hi");
        bare.clear();
        assert!(bare.is_empty());
    }

    #[test]
    fn late_system_turn_is_pinned_first() {
        let mut session = ConversationSession::new("s", "", 3);
        for i in 0..4 {
            session.append(Role::User, format!("{i}"));
        }
        session.append(Role::System, "sys");
        assert_eq!(session.len(), 3);
        assert_eq!(session.turns()[0], ConversationTurn::system("sys"));
        assert_eq!(session.turns()[2].content(), "3");

        // Later user turns trim around it.
        session.append(Role::User, "4");
        assert_eq!(session.turns()[0].role(), Role::System);
        assert_eq!(session.turns()[2].content(), "4");
    }

    #[test]
    fn system_turn_replaces_existing_prompt() {
        let mut session = ConversationSession::new("s", "old", 10);
        session.append(Role::User, "hi");
        session.append(Role::System, "new");
        assert_eq!(session.len(), 2);
        assert_eq!(session.turns()[0], ConversationTurn::system("new"));
        assert_eq!(
            session.turns().iter().filter(|t| t.role() == Role::System).count(),
            1
        );
    }

    #[test]
    fn turns_serialize_to_wire_shape() {
        let json = serde_json::to_value(ConversationTurn::assistant("Hi there")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "assistant", "content": "Hi there"})
        );
    }
}
