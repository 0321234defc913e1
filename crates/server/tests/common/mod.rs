//! # Common Test Utilities
//!
//! `TestApp` spawns a real server on a random port. Its config file lives in a
//! temporary directory together with the vector database, the data and uploads
//! directories, and it points the chat and embedding providers at an
//! `httpmock::MockServer`.

// Not every test file uses every helper.
#![allow(unused)]

use anyhow::Result;
use axum::serve;
use excelqa_server::{config, router, state::build_app_state, state::AppState};
use httpmock::{Method, Mock, MockServer};
use reqwest::Client;
use serde_json::json;
use std::{net::SocketAddr, path::PathBuf};
use tempfile::{tempdir, TempDir};
use tokio::{net::TcpListener, task::JoinHandle};

pub const QA_PROMPT_KEY: &str = "careful data analyst";
pub const AGENT_PROMPT_KEY: &str = "You are a data agent";
pub const FILES_URL: &str = "http://files.test";

/// Knobs for the generated config file.
#[derive(Debug, Clone)]
pub struct TestOptions {
    /// Adds an `embedding` section pointing at the mock server.
    pub embeddings: bool,
    pub agent_row_threshold: usize,
    /// Written to the default dataset path before the server starts.
    pub default_dataset: Option<String>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            embeddings: true,
            agent_row_threshold: 10,
            default_dataset: None,
        }
    }
}

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub mock_server: MockServer,
    pub app_state: AppState,
    pub dir: TempDir,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(TestOptions::default()).await
    }

    pub async fn spawn_with(options: TestOptions) -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .try_init();

        let mock_server = MockServer::start_async().await;
        if options.embeddings {
            mock_server
                .mock_async(|when, then| {
                    when.method(Method::POST).path("/v1/embeddings");
                    then.status(200)
                        .json_body(json!({ "data": [{ "embedding": [0.1, 0.2, 0.3] }] }));
                })
                .await;
        }

        let dir = tempdir()?;
        let root = dir.path().display().to_string();
        if let Some(csv) = &options.default_dataset {
            tokio::fs::write(dir.path().join("sample.csv"), csv).await?;
        }

        let embedding = if options.embeddings {
            format!(
                "embedding:\n  api_url: \"{}\"\n  model_name: \"mock-embedding-model\"\n  max_retries: 0\n",
                mock_server.url("/v1/embeddings")
            )
        } else {
            String::new()
        };
        let config_content = format!(
            r#"
port: 0
db_url: "{root}/db/excelqa.db"
data_dir: "{root}/data"
uploads_dir: "{root}/uploads"
default_dataset_path: "{root}/sample.csv"
server_url: "{FILES_URL}"
{embedding}
providers:
  default:
    provider: "local"
    api_url: "{chat_url}"
    api_key: null
    model_name: "mock-chat-model"
qa:
  agent_row_threshold: {threshold}
  agent_when_no_embeddings: false
  agent_timeout_secs: 10
  request_timeout_secs: 5
users:
  admin:
    password: "admin123"
    role: "admin"
  user:
    password: "user123"
    role: "user"
"#,
            chat_url = mock_server.url("/v1/chat/completions"),
            threshold = options.agent_row_threshold,
        );
        let config_path = dir.path().join("config.yml");
        tokio::fs::write(&config_path, config_content).await?;

        let config_path = config_path.display().to_string();
        let config = config::get_config(Some(config_path.as_str()))?;
        let app_state = build_app_state(config).await?;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let address = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let state_for_server = app_state.clone();
        let server_handle = tokio::spawn(async move {
            let app = router::create_router(state_for_server);
            let server = serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = server.await {
                tracing::error!("[TestApp] Server error: {}", e);
            }
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Ok(Self {
            address,
            client: Client::new(),
            mock_server,
            app_state,
            dir,
            _server_handle: server_handle,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.address)
    }

    /// Answers chat requests whose body contains `needle` with `content`.
    pub async fn mock_chat(&self, needle: &str, content: &str) -> Mock<'_> {
        self.mock_server
            .mock_async(|when, then| {
                when.method(Method::POST)
                    .path("/v1/chat/completions")
                    .body_contains(needle);
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": content } }]
                }));
            })
            .await
    }

    /// Uploads `csv` as a multipart `file` field named `file_name`.
    pub async fn upload(&self, file_name: &str, csv: &str) -> Result<reqwest::Response> {
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(csv.as_bytes().to_vec())
                .file_name(file_name.to_string()),
        );
        Ok(self
            .client
            .post(self.url("/upload-csv"))
            .multipart(form)
            .send()
            .await?)
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
