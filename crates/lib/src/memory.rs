//! # Conversation Memory
//!
//! A bounded FIFO of recent question/answer turns, kept per session.

use crate::types::ConversationTurn;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
};
use tracing::debug;

/// The last `capacity` turns of one session, oldest first.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    capacity: usize,
    turns: VecDeque<ConversationTurn>,
}

impl ConversationMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            turns: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Adds a turn at the tail, evicting from the head past capacity.
    pub fn append(&mut self, turn: ConversationTurn) {
        if self.capacity == 0 {
            return;
        }
        while self.turns.len() >= self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    pub fn recent(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[derive(Debug)]
struct SessionEntry {
    memory: ConversationMemory,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Sessions {
    entries: HashMap<String, SessionEntry>,
    clock: u64,
}

/// Conversation memories keyed by session id.
///
/// Sessions are created on first append. At most `max_sessions` are kept; adding
/// one more evicts the session appended to least recently. The lock is never held
/// across an await.
#[derive(Debug)]
pub struct SessionMemories {
    capacity: usize,
    max_sessions: usize,
    sessions: Mutex<Sessions>,
}

impl SessionMemories {
    pub fn new(capacity: usize, max_sessions: usize) -> Self {
        Self {
            capacity,
            max_sessions,
            sessions: Mutex::new(Sessions::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sessions> {
        // A panic while holding the lock cannot leave a memory half-updated.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append(&self, session_id: &str, turn: ConversationTurn) {
        if self.capacity == 0 || self.max_sessions == 0 {
            return;
        }
        let mut sessions = self.lock();
        sessions.clock += 1;
        let now = sessions.clock;

        if !sessions.entries.contains_key(session_id) && sessions.entries.len() >= self.max_sessions {
            let oldest = sessions
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                sessions.entries.remove(&id);
                debug!(session_id = %id, "Evicted least recently used session memory.");
            }
        }

        let entry = sessions
            .entries
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                memory: ConversationMemory::new(self.capacity),
                last_used: now,
            });
        entry.last_used = now;
        entry.memory.append(turn);
    }

    /// Recent turns of a session, oldest first. Empty for unknown sessions.
    pub fn recent(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.lock()
            .entries
            .get(session_id)
            .map(|entry| entry.memory.recent())
            .unwrap_or_default()
    }

    /// Drops a session's memory. Returns whether the session existed.
    pub fn clear(&self, session_id: &str) -> bool {
        self.lock().entries.remove(session_id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.lock().entries.len()
    }
}
