pub mod embedding;
pub mod gemini;
pub mod local;

use crate::errors::PromptError;
use async_trait::async_trait;
use dyn_clone::DynClone;
pub use embedding::HttpEmbeddingProvider;
use std::fmt::Debug;

/// A trait for interacting with an AI provider.
///
/// This trait defines a common interface for text generation across different
/// Large Language Models (e.g., Gemini, local OpenAI-compatible models).
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    /// Generates a response from a given system and user prompt.
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, PromptError>;
}

dyn_clone::clone_trait_object!(AiProvider);

/// A trait for turning text into a fixed-length embedding vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug + DynClone {
    /// Returns the embedding for `input`.
    async fn embed(&self, input: &str) -> Result<Vec<f32>, PromptError>;

    /// The expected vector length, when known up front.
    fn dimensions(&self) -> Option<usize> {
        None
    }
}

dyn_clone::clone_trait_object!(EmbeddingProvider);
