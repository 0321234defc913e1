//! # The Core Executor
//!
//! `DataQaExecutor` is the entry point consumers (like the `server` crate) use to
//! drive the question-answering core. It owns the dataset store and the
//! orchestrator and exposes the dataset lifecycle plus `ask` and `clear`.

use crate::{
    constants::DEFAULT_SESSION_ID,
    encoder::RowEncoder,
    errors::QaError,
    index::{BackendKind, IndexBuilder},
    loader,
    orchestrator::QaOrchestrator,
    prompts::PromptTemplates,
    providers::ai::{AiProvider, EmbeddingProvider},
    settings::QaSettings,
    store::DatasetStore,
    types::{Dataset, DatasetSummary, QueryResult},
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use turso::Database;

/// Assembles a [`DataQaExecutor`].
#[derive(Debug)]
pub struct DataQaExecutorBuilder {
    ai_provider: Box<dyn AiProvider>,
    agent_provider: Option<Box<dyn AiProvider>>,
    embedding_provider: Option<Box<dyn EmbeddingProvider>>,
    settings: QaSettings,
    prompts: PromptTemplates,
    db: Option<Database>,
    backing_file: Option<PathBuf>,
    default_dataset_path: Option<PathBuf>,
}

impl DataQaExecutorBuilder {
    pub fn new(ai_provider: Box<dyn AiProvider>) -> Self {
        Self {
            ai_provider,
            agent_provider: None,
            embedding_provider: None,
            settings: QaSettings::default(),
            prompts: PromptTemplates::default(),
            db: None,
            backing_file: None,
            default_dataset_path: None,
        }
    }

    /// Model used by the data agent. Defaults to the answering model.
    pub fn agent_provider(mut self, provider: Box<dyn AiProvider>) -> Self {
        self.agent_provider = Some(provider);
        self
    }

    /// Enables row and question embeddings.
    pub fn embedding_provider(mut self, provider: Box<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn settings(mut self, settings: QaSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn prompts(mut self, prompts: PromptTemplates) -> Self {
        self.prompts = prompts;
        self
    }

    /// The database probed for native vector support.
    pub fn database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    /// Where the current dataset is persisted and reloaded from.
    pub fn backing_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.backing_file = Some(path.into());
        self
    }

    /// Dataset loaded by [`DataQaExecutor::reload`] when no backing file exists.
    pub fn default_dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_dataset_path = Some(path.into());
        self
    }

    /// Probes the index backend and builds the executor. No dataset is loaded yet.
    pub async fn build(self) -> DataQaExecutor {
        let builder = IndexBuilder::probe(self.settings.index_backend, self.db).await;
        let encoder = RowEncoder::new(self.embedding_provider, self.settings.embedding_concurrency);
        let store = DatasetStore::new(encoder, builder, self.backing_file);
        let mut orchestrator = QaOrchestrator::new(self.ai_provider, self.prompts, self.settings);
        if let Some(agent_provider) = self.agent_provider {
            orchestrator = orchestrator.with_agent_provider(agent_provider);
        }
        DataQaExecutor {
            store,
            orchestrator,
            default_dataset_path: self.default_dataset_path,
        }
    }
}

#[derive(Debug)]
pub struct DataQaExecutor {
    store: DatasetStore,
    orchestrator: QaOrchestrator,
    default_dataset_path: Option<PathBuf>,
}

impl DataQaExecutor {
    pub fn builder(ai_provider: Box<dyn AiProvider>) -> DataQaExecutorBuilder {
        DataQaExecutorBuilder::new(ai_provider)
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn orchestrator(&self) -> &QaOrchestrator {
        &self.orchestrator
    }

    pub fn index_backend(&self) -> BackendKind {
        self.store.backend()
    }

    /// Publishes an already-parsed dataset as the new current generation.
    pub async fn replace(&self, dataset: Dataset) -> Result<DatasetSummary, QaError> {
        self.store.replace(dataset, None, None).await
    }

    /// Parses CSV bytes and publishes them. `source` is reported in the summary.
    pub async fn load_bytes(
        &self,
        bytes: &[u8],
        source: Option<String>,
    ) -> Result<DatasetSummary, QaError> {
        let dataset = loader::parse_csv(bytes)?;
        self.store.replace(dataset, Some(bytes), source).await
    }

    /// Downloads a CSV and publishes it.
    pub async fn load_url(&self, url: &str) -> Result<DatasetSummary, QaError> {
        let (dataset, bytes) = loader::fetch_url(url).await?;
        self.store
            .replace(dataset, Some(&bytes), Some(url.to_string()))
            .await
    }

    /// Loads the startup dataset: the backing file if present, else the default
    /// dataset, else nothing. Returns `None` when no data could be loaded.
    pub async fn reload(&self) -> Result<Option<DatasetSummary>, QaError> {
        let candidates: Vec<&Path> = self
            .store
            .backing_file()
            .into_iter()
            .chain(self.default_dataset_path.as_deref())
            .collect();

        for path in candidates {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                continue;
            }
            match loader::load_path(path).await {
                Ok((dataset, bytes)) => {
                    let source = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned());
                    let summary = self.store.replace(dataset, Some(&bytes), source).await?;
                    info!(
                        "Loaded startup dataset from {}: {} rows x {} columns",
                        path.display(),
                        summary.rows,
                        summary.columns
                    );
                    return Ok(Some(summary));
                }
                Err(e) => warn!("Could not load dataset from {}: {e}", path.display()),
            }
        }

        info!("No startup dataset found; waiting for data upload.");
        Ok(None)
    }

    pub async fn info(&self) -> Result<DatasetSummary, QaError> {
        self.store.info().await
    }

    /// Answers a question. A missing session id uses the shared default session.
    pub async fn ask(
        &self,
        question: &str,
        session_id: Option<&str>,
    ) -> Result<QueryResult, QaError> {
        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SESSION_ID);
        self.orchestrator.ask(&self.store, question, session_id).await
    }

    /// Drops a session's conversation memory.
    pub fn clear(&self, session_id: &str) -> bool {
        self.orchestrator.memories().clear(session_id)
    }
}
