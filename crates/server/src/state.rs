//! # Application State
//!
//! This module defines the shared application state (`AppState`) and the logic
//! for building it at startup: the AI providers named by the configured tasks,
//! the optional embedding provider, the vector database and the QA executor.

use crate::{
    auth::{CredentialStore, StaticCredentialStore},
    config::{AppConfig, ProviderConfig, TaskConfig},
};
use excelqa::{
    constants::CURRENT_DATASET_FILE,
    prompts::{PromptTemplates, TaskPrompts, DATA_AGENT_TASK, QA_SYNTHESIS_TASK},
    providers::ai::{
        embedding::RetryPolicy, gemini::GeminiProvider, local::LocalAiProvider, AiProvider,
        HttpEmbeddingProvider,
    },
    DataQaExecutor,
};
use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, warn};
use turso::Builder;

/// A fully resolved task configuration with non-optional fields.
#[derive(Clone, Debug)]
pub struct ResolvedTask {
    pub provider: String,
    pub prompts: TaskPrompts,
}

/// The shared application state, accessible from all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<AppConfig>,
    /// The question-answering core and its current dataset.
    pub executor: Arc<DataQaExecutor>,
    /// Checks `/login` requests.
    pub credentials: Arc<dyn CredentialStore>,
}

fn build_provider(
    name: &str,
    provider_config: &ProviderConfig,
    timeout: Duration,
) -> anyhow::Result<Box<dyn AiProvider>> {
    let provider: Box<dyn AiProvider> = match provider_config.provider.as_str() {
        "gemini" => {
            let api_key = provider_config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    anyhow::anyhow!("api_key is required for gemini provider '{name}'")
                })?;
            let api_url = provider_config
                .api_url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| GeminiProvider::endpoint_for_model(&provider_config.model_name));
            Box::new(GeminiProvider::new(api_url, api_key, timeout)?)
        }
        "local" => {
            let api_url = provider_config
                .api_url
                .clone()
                .filter(|u| !u.is_empty())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "api_url is required for local provider '{name}'. Please set LOCAL_AI_API_URL in your .env file."
                    )
                })?;
            Box::new(LocalAiProvider::new(
                api_url,
                provider_config.api_key.clone().filter(|k| !k.is_empty()),
                Some(provider_config.model_name.clone()),
                timeout,
            )?)
        }
        other => {
            return Err(anyhow::anyhow!(
                "Unsupported AI provider type '{other}' for provider '{name}'"
            ));
        }
    };
    Ok(provider)
}

fn resolve_task(name: &str, task_config: Option<&TaskConfig>) -> anyhow::Result<ResolvedTask> {
    let task_config =
        task_config.ok_or_else(|| anyhow::anyhow!("Configuration for task '{name}' not found."))?;
    let provider = task_config.provider.clone().ok_or_else(|| {
        anyhow::anyhow!("Resolved task '{name}' is missing required 'provider' field")
    })?;
    let system_prompt = task_config.system_prompt.clone().ok_or_else(|| {
        anyhow::anyhow!("Resolved task '{name}' is missing required 'system_prompt' field")
    })?;
    let user_prompt = task_config.user_prompt.clone().ok_or_else(|| {
        anyhow::anyhow!("Resolved task '{name}' is missing required 'user_prompt' field")
    })?;
    Ok(ResolvedTask {
        provider,
        prompts: TaskPrompts {
            system_prompt,
            user_prompt,
        },
    })
}

/// Builds the shared application state from the configuration.
///
/// The provider of the `qa_synthesis` task answers retrieval questions and the
/// provider of `data_agent` drives the agent. The startup dataset is loaded
/// before the state is returned.
pub async fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let timeout = Duration::from_secs(config.qa.request_timeout_secs);

    let mut ai_providers: HashMap<String, Box<dyn AiProvider>> = HashMap::new();
    for (name, provider_config) in &config.providers {
        ai_providers.insert(name.clone(), build_provider(name, provider_config, timeout)?);
    }

    let qa_task = resolve_task(QA_SYNTHESIS_TASK, config.tasks.get(QA_SYNTHESIS_TASK))?;
    let agent_task = resolve_task(DATA_AGENT_TASK, config.tasks.get(DATA_AGENT_TASK))?;
    let provider_for = |task: &ResolvedTask, task_name: &str| {
        ai_providers.get(&task.provider).cloned().ok_or_else(|| {
            anyhow::anyhow!(
                "Provider '{}' for task '{task_name}' not found in providers map.",
                task.provider
            )
        })
    };
    let qa_provider = provider_for(&qa_task, QA_SYNTHESIS_TASK)?;
    let agent_provider = provider_for(&agent_task, DATA_AGENT_TASK)?;

    let prompts = PromptTemplates {
        qa_synthesis: qa_task.prompts,
        data_agent: agent_task.prompts,
    };

    let mut builder = DataQaExecutor::builder(qa_provider)
        .agent_provider(agent_provider)
        .settings(config.qa.clone())
        .prompts(prompts)
        .backing_file(PathBuf::from(&config.data_dir).join(CURRENT_DATASET_FILE))
        .default_dataset_path(&config.default_dataset_path);

    match &config.embedding {
        Some(embedding) if !embedding.api_url.is_empty() => {
            let provider = HttpEmbeddingProvider::new(
                embedding.api_url.clone(),
                embedding.model_name.clone(),
                embedding.api_key.clone().filter(|k| !k.is_empty()),
                timeout,
            )?
            .with_dimensions(embedding.dimensions)
            .with_retry(RetryPolicy {
                max_retries: embedding.max_retries,
                initial_backoff: Duration::from_millis(embedding.initial_backoff_ms),
            });
            info!(model = %embedding.model_name, "Row embeddings enabled.");
            builder = builder.embedding_provider(Box::new(provider));
        }
        _ => warn!("No embedding provider configured; retrieval falls back to keyword matching."),
    }

    if let Some(parent) = PathBuf::from(&config.db_url).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let db = Builder::new_local(&config.db_url).build().await?;
    info!(db_path = %config.db_url, "Opened vector index database.");
    builder = builder.database(db);

    let executor = builder.build().await;
    info!(backend = ?executor.index_backend(), "Similarity index backend selected.");
    if let Err(e) = executor.reload().await {
        warn!("Startup dataset could not be published: {e}. Waiting for data upload.");
    }

    let credentials = StaticCredentialStore::new(config.users.clone());
    if credentials.is_empty() {
        warn!("No users configured; every login will be refused.");
    }

    Ok(AppState {
        config: Arc::new(config),
        executor: Arc::new(executor),
        credentials: Arc::new(credentials),
    })
}
