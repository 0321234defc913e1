use thiserror::Error;

/// Errors raised by the AI and embedding provider clients.
///
/// These stay at the collaborator boundary. The orchestration layer converts them
/// into the matching [`QaError`] kind so callers only ever see the QA taxonomy.
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Request to AI provider failed: {0}")]
    AiRequest(reqwest::Error),
    #[error("Failed to deserialize AI provider response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI provider returned an error: {0}")]
    AiApi(String),
    #[error("AI provider returned an empty response")]
    EmptyResponse,
    #[error("AI provider is not configured: {0}")]
    MissingAiProvider(String),
}

/// The error taxonomy of the question-answering core.
///
/// Each variant maps to one user-facing failure kind. The `Display` text is
/// human readable and never includes raw provider output.
#[derive(Error, Debug)]
pub enum QaError {
    /// The uploaded or loaded file could not be turned into a dataset.
    #[error("The data file is malformed: {0}")]
    DataFormat(String),
    /// A question was asked before any dataset was loaded.
    #[error("No dataset is loaded. Upload or load a CSV file first.")]
    NoDataLoaded,
    /// The embedding provider failed for every row, or is misconfigured.
    #[error("The embedding provider is unavailable: {0}")]
    EmbeddingProvider(String),
    /// The language-model call failed.
    #[error("The language model failed to generate an answer: {0}")]
    Generation(String),
    /// The agent exhausted its step or time budget.
    #[error("The data agent ran out of budget after {steps} step(s).")]
    AgentTimeout { steps: usize },
    /// The question was empty.
    #[error("Question cannot be empty.")]
    InvalidQuestion,
    /// The backing file or vector store could not be read or written.
    #[error("Storage operation failed: {0}")]
    Storage(String),
}

impl From<turso::Error> for QaError {
    fn from(err: turso::Error) -> Self {
        QaError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for QaError {
    fn from(err: std::io::Error) -> Self {
        QaError::Storage(err.to_string())
    }
}

impl From<csv::Error> for QaError {
    fn from(err: csv::Error) -> Self {
        QaError::DataFormat(err.to_string())
    }
}
