//! # QA Settings
//!
//! Tunables of the question-answering core. The server deserializes these from the
//! `qa` section of its configuration; every field has a default.

use serde::{Deserialize, Serialize};

/// Which similarity backend to use for vector search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackendPreference {
    /// Use the native vector index when the probe succeeds, brute force otherwise.
    #[default]
    Auto,
    Native,
    BruteForce,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaSettings {
    /// Rows retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Datasets with fewer rows than this are answered by the data agent.
    #[serde(default = "default_agent_row_threshold")]
    pub agent_row_threshold: usize,
    /// Conversation turns kept per session.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    /// Sessions remembered at once; the least recently used is evicted past this.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    #[serde(default = "default_agent_max_steps")]
    pub agent_max_steps: usize,
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,
    /// Rows shown to the agent as a preview of the table.
    #[serde(default = "default_agent_preview_rows")]
    pub agent_preview_rows: usize,
    /// Route to the agent when the index holds no embeddings at all.
    #[serde(default = "default_true")]
    pub agent_when_no_embeddings: bool,
    #[serde(default)]
    pub index_backend: IndexBackendPreference,
    /// Concurrent embedding calls during an encode pass.
    #[serde(default = "default_embedding_concurrency")]
    pub embedding_concurrency: usize,
    /// Per-call timeout for model and embedding requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_top_k() -> usize {
    5
}
fn default_agent_row_threshold() -> usize {
    50
}
fn default_memory_capacity() -> usize {
    3
}
fn default_max_sessions() -> usize {
    1000
}
fn default_agent_max_steps() -> usize {
    8
}
fn default_agent_timeout_secs() -> u64 {
    60
}
fn default_agent_preview_rows() -> usize {
    5
}
fn default_true() -> bool {
    true
}
fn default_embedding_concurrency() -> usize {
    4
}
fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for QaSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            agent_row_threshold: default_agent_row_threshold(),
            memory_capacity: default_memory_capacity(),
            max_sessions: default_max_sessions(),
            agent_max_steps: default_agent_max_steps(),
            agent_timeout_secs: default_agent_timeout_secs(),
            agent_preview_rows: default_agent_preview_rows(),
            agent_when_no_embeddings: default_true(),
            index_backend: IndexBackendPreference::default(),
            embedding_concurrency: default_embedding_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
