use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Turns kept per session by default.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// ConversationTurn is one question and the answer given to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            created_at: Utc::now(),
        }
    }
}

type SessionTurns = Arc<Mutex<Vec<ConversationTurn>>>;

/// In-memory conversation histories, keyed by session id.
///
/// Each session has its own lock, so sessions never wait on each other while
/// appends to one session are applied in the order they acquire that lock.
/// Histories live for the process lifetime unless cleared.
#[derive(Debug)]
pub struct ConversationStore {
    sessions: RwLock<HashMap<String, SessionTurns>>,
    max_turns: usize,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl ConversationStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns: max_turns.max(1),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    async fn session(&self, session_id: &str) -> Option<SessionTurns> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn session_or_create(&self, session_id: &str) -> SessionTurns {
        if let Some(turns) = self.session(session_id).await {
            return turns;
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    /// Append a turn, evicting the oldest turns beyond the cap.
    /// Returns the session length after the append.
    pub async fn append(
        &self,
        session_id: &str,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> usize {
        let session = self.session_or_create(session_id).await;
        let mut turns = session.lock().await;
        turns.push(ConversationTurn::new(question, answer));
        if turns.len() > self.max_turns {
            let excess = turns.len() - self.max_turns;
            turns.drain(0..excess);
        }
        debug!(session_id, turns = turns.len(), "conversation turn appended");
        turns.len()
    }

    /// All turns for a session, oldest first. Unknown sessions are empty.
    pub async fn get(&self, session_id: &str) -> Vec<ConversationTurn> {
        match self.session(session_id).await {
            Some(session) => session.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// The last `n` turns, oldest first.
    pub async fn recent(&self, session_id: &str, n: usize) -> Vec<ConversationTurn> {
        match self.session(session_id).await {
            Some(session) => {
                let turns = session.lock().await;
                let start = turns.len().saturating_sub(n);
                turns[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    pub async fn turn_count(&self, session_id: &str) -> usize {
        match self.session(session_id).await {
            Some(session) => session.lock().await.len(),
            None => 0,
        }
    }

    /// Drop a session. Clearing an absent session is a no-op.
    pub async fn clear(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            debug!(session_id, "conversation cleared");
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
