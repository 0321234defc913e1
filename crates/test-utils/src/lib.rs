use anyhow::Result;
use async_trait::async_trait;
use excelqa::errors::PromptError;
use excelqa::providers::ai::{AiProvider, EmbeddingProvider};
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use turso::Database;

// --- Test Setup ---

/// A fresh, isolated in-memory database for the native vector index.
pub async fn in_memory_db() -> Result<Database> {
    Ok(turso::Builder::new_local(":memory:").build().await?)
}

// --- Prompt Keys ---

/// A substring of the default QA synthesis system prompt.
pub const QA_PROMPT_KEY: &str = "careful data analyst";
/// A substring of the default data agent system prompt.
pub const AGENT_PROMPT_KEY: &str = "You are a data agent";

// --- Mock AI Provider ---

/// A scripted language model.
///
/// Responses are keyed by a substring of the system prompt. Queued responses
/// (including failures) are consumed first, in order; afterwards the fixed
/// response for the key, if any, is returned on every call.
#[derive(Clone, Debug, Default)]
pub struct MockAiProvider {
    responses: Arc<Mutex<HashMap<String, String>>>,
    queued: Arc<Mutex<Vec<(String, VecDeque<Result<String, String>>)>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    delay: Option<Duration>,
}

impl MockAiProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the fixed response for system prompts containing `key`.
    pub fn add_response(&self, key: &str, response: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(key.to_string(), response.to_string());
    }

    /// Queues a one-shot response for system prompts containing `key`.
    pub fn queue_response(&self, key: &str, response: &str) {
        self.enqueue(key, Ok(response.to_string()));
    }

    /// Queues a one-shot failure for system prompts containing `key`.
    pub fn queue_failure(&self, key: &str, message: &str) {
        self.enqueue(key, Err(message.to_string()));
    }

    fn enqueue(&self, key: &str, entry: Result<String, String>) {
        let mut queued = self.queued.lock().unwrap();
        match queued.iter_mut().find(|(k, _)| k == key) {
            Some((_, queue)) => queue.push_back(entry),
            None => queued.push((key.to_string(), VecDeque::from([entry]))),
        }
    }

    /// Retrieves the recorded `(system, user)` prompts for assertion.
    pub fn get_calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, PromptError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = {
            let mut queued = self.queued.lock().unwrap();
            queued
                .iter_mut()
                .find(|(key, queue)| system_prompt.contains(key.as_str()) && !queue.is_empty())
                .and_then(|(_, queue)| queue.pop_front())
        };
        if let Some(entry) = queued {
            return entry.map_err(PromptError::AiApi);
        }

        let responses = self.responses.lock().unwrap();
        for (key, response) in responses.iter() {
            if system_prompt.contains(key) {
                return Ok(response.clone());
            }
        }

        Err(PromptError::AiApi(format!(
            "MockAiProvider: No response programmed for system prompt. Got: '{system_prompt}'"
        )))
    }
}

// --- Mock Embedding Providers ---

/// Deterministic bag-of-tokens embeddings.
///
/// Each lowercase alphanumeric token is hashed into one of `dimensions` buckets
/// and the vector is L2-normalized, so identical texts embed identically and texts
/// sharing tokens are close.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
    fail_when_contains: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            fail_when_contains: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fails any input containing `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_when_contains.push(needle.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this provider returns for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = token
                .to_lowercase()
                .bytes()
                .fold(0xcbf29ce484222325u64, |h, b| {
                    (h ^ u64::from(b)).wrapping_mul(0x100000001b3)
                });
            vector[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, input: &str) -> Result<Vec<f32>, PromptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_when_contains
            .iter()
            .any(|needle| input.contains(needle.as_str()))
        {
            return Err(PromptError::AiApi(
                "MockEmbeddingProvider: scripted failure".to_string(),
            ));
        }
        Ok(self.vector_for(input))
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }
}

/// An embedding provider that is always down.
#[derive(Clone, Debug, Default)]
pub struct FailingEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for FailingEmbeddingProvider {
    async fn embed(&self, _input: &str) -> Result<Vec<f32>, PromptError> {
        Err(PromptError::AiApi(
            "FailingEmbeddingProvider: unavailable".to_string(),
        ))
    }
}

// --- CSV Fixtures ---

/// A title row, a `Name,Age,City` header and three people.
pub const PEOPLE_CSV: &str = "People export,,\nName,Age,City\nAlice,30,Paris\nBob,25,Rome\nCara,35,Paris\n";

/// A title row, an `Id,Product,Region,Units` header and `rows` generated rows.
pub fn sales_csv(rows: usize) -> String {
    const PRODUCTS: [&str; 5] = ["widget", "gadget", "sprocket", "gizmo", "doohickey"];
    const REGIONS: [&str; 4] = ["north", "south", "east", "west"];
    let mut csv = String::from("Quarterly sales,,,\nId,Product,Region,Units\n");
    for i in 0..rows {
        csv.push_str(&format!(
            "{i},{}-{i},{},{}\n",
            PRODUCTS[i % PRODUCTS.len()],
            REGIONS[i % REGIONS.len()],
            (i * 7) % 100
        ));
    }
    csv
}
