#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Shared setup for the `excelqa` integration tests.

use excelqa::{
    index::IndexBuilder, loader::parse_csv, prompts::PromptTemplates, settings::QaSettings,
    DataQaExecutor, Dataset,
};
use excelqa_test_utils::{MockAiProvider, MockEmbeddingProvider};
use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber once per test binary.
pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub const EMBEDDING_DIMS: usize = 256;

pub fn dataset(csv: &str) -> Dataset {
    parse_csv(csv.as_bytes()).expect("fixture CSV should parse")
}

/// Settings that route every dataset to retrieval.
pub fn retrieval_settings() -> QaSettings {
    QaSettings {
        agent_row_threshold: 0,
        agent_when_no_embeddings: false,
        ..QaSettings::default()
    }
}

/// An executor with mock model and embeddings on the brute-force backend.
pub async fn executor_with(ai: &MockAiProvider, settings: QaSettings) -> DataQaExecutor {
    DataQaExecutor::builder(Box::new(ai.clone()))
        .embedding_provider(Box::new(MockEmbeddingProvider::new(EMBEDDING_DIMS)))
        .settings(settings)
        .prompts(PromptTemplates::default())
        .build()
        .await
}

pub fn brute_force_builder() -> IndexBuilder {
    IndexBuilder::brute_force()
}
