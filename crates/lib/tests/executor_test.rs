//! # Executor Tests
//!
//! The dataset lifecycle end to end: replace, failed loads, concurrent readers,
//! the backing file and startup reload.

mod common;

use anyhow::Result;
use common::{dataset, executor_with, retrieval_settings, setup_tracing};
use excelqa::{settings::QaSettings, DataQaExecutor, QaError};
use excelqa_test_utils::{
    sales_csv, FailingEmbeddingProvider, MockAiProvider, PEOPLE_CSV, QA_PROMPT_KEY,
};
use httpmock::{Method, MockServer};
use std::sync::Arc;

#[tokio::test]
async fn test_replace_reports_shape_and_indexes_every_row() -> Result<()> {
    setup_tracing();
    let ai = MockAiProvider::new();
    let executor = executor_with(&ai, QaSettings::default()).await;

    let summary = executor.replace(dataset(&sales_csv(25))).await?;

    assert_eq!(summary.rows, 25);
    assert_eq!(summary.columns, 4);
    assert_eq!(summary.column_names, ["Id", "Product", "Region", "Units"]);
    assert_eq!(summary.generation, 1);
    assert_eq!(summary.embedded_rows, 25);

    let info = executor.info().await?;
    assert_eq!(info, summary);
    let current = executor.store().current().await?;
    assert_eq!(current.index.len(), current.dataset.row_count());
    Ok(())
}

#[tokio::test]
async fn test_failed_loads_leave_the_current_dataset_untouched() -> Result<()> {
    setup_tracing();
    let ai = MockAiProvider::new();
    let executor = executor_with(&ai, QaSettings::default()).await;
    assert!(matches!(executor.info().await, Err(QaError::NoDataLoaded)));

    executor
        .load_bytes(PEOPLE_CSV.as_bytes(), Some("people.csv".into()))
        .await?;

    let bad = executor.load_bytes(b"Title\nA,B\n1,2,3\n", None).await;
    assert!(matches!(bad, Err(QaError::DataFormat(_))));

    let info = executor.info().await?;
    assert_eq!(info.rows, 3);
    assert_eq!(info.generation, 1);
    assert_eq!(info.source.as_deref(), Some("people.csv"));
    Ok(())
}

#[tokio::test]
async fn test_embedding_outage_fails_the_load_without_publishing() -> Result<()> {
    setup_tracing();
    let ai = MockAiProvider::new();
    let executor = DataQaExecutor::builder(Box::new(ai))
        .embedding_provider(Box::new(FailingEmbeddingProvider))
        .build()
        .await;

    let result = executor.load_bytes(PEOPLE_CSV.as_bytes(), None).await;

    assert!(matches!(result, Err(QaError::EmbeddingProvider(_))));
    assert!(!executor.store().is_loaded().await);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_queries_see_one_complete_generation() -> Result<()> {
    setup_tracing();
    let ai = MockAiProvider::new();
    ai.add_response(QA_PROMPT_KEY, "ANSWER: ok");
    let executor = Arc::new(executor_with(&ai, retrieval_settings()).await);
    executor.replace(dataset(&sales_csv(30))).await?;

    let writer = {
        let executor = executor.clone();
        tokio::spawn(async move {
            for size in [40, 50, 60] {
                executor.replace(dataset(&sales_csv(size))).await?;
            }
            Ok::<_, QaError>(())
        })
    };

    let mut readers = Vec::new();
    for i in 0..8 {
        let executor = executor.clone();
        let session = format!("s{i}");
        readers.push(tokio::spawn(async move {
            for _ in 0..10 {
                let generation = executor.store().current().await?;
                let rows = generation.dataset.row_count();
                assert_eq!(generation.index.len(), rows);
                assert_eq!(rows, 30 + 10 * (generation.id as usize - 1));

                let result = executor.ask("widget north", Some(session.as_str())).await?;
                assert!(result.relevant_data.iter().all(|r| r.row_id < 60));
            }
            Ok::<_, QaError>(())
        }));
    }

    writer.await??;
    for reader in readers {
        reader.await??;
    }
    assert_eq!(executor.info().await?.rows, 60);
    Ok(())
}

#[tokio::test]
async fn test_backing_file_is_written_and_reloaded() -> Result<()> {
    setup_tracing();
    let dir = tempfile::tempdir()?;
    let backing = dir.path().join("data").join("current.csv");
    let ai = MockAiProvider::new();

    let first = DataQaExecutor::builder(Box::new(ai.clone()))
        .backing_file(&backing)
        .build()
        .await;
    first.load_bytes(PEOPLE_CSV.as_bytes(), None).await?;
    assert_eq!(tokio::fs::read_to_string(&backing).await?, PEOPLE_CSV);

    let restarted = DataQaExecutor::builder(Box::new(ai))
        .backing_file(&backing)
        .default_dataset_path(dir.path().join("sample.csv"))
        .build()
        .await;
    let summary = restarted.reload().await?.expect("backing file should load");
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.source.as_deref(), Some("current.csv"));
    Ok(())
}

#[tokio::test]
async fn test_reload_falls_back_to_default_then_to_empty() -> Result<()> {
    setup_tracing();
    let dir = tempfile::tempdir()?;
    let sample = dir.path().join("sample.csv");
    let backing = dir.path().join("current.csv");
    let ai = MockAiProvider::new();

    let build = || {
        DataQaExecutor::builder(Box::new(ai.clone()))
            .backing_file(&backing)
            .default_dataset_path(&sample)
            .build()
    };

    assert!(build().await.reload().await?.is_none());

    tokio::fs::write(&sample, sales_csv(7)).await?;
    let executor = build().await;
    let summary = executor.reload().await?.expect("default dataset should load");
    assert_eq!(summary.rows, 7);
    assert_eq!(summary.source.as_deref(), Some("sample.csv"));
    // The default dataset also becomes the backing copy.
    assert!(tokio::fs::try_exists(&backing).await?);
    Ok(())
}

#[tokio::test]
async fn test_load_url_and_sessions() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::GET).path("/sales.csv");
            then.status(200).body(sales_csv(60));
        })
        .await;
    let ai = MockAiProvider::new();
    ai.add_response(QA_PROMPT_KEY, "ANSWER: Plenty of widgets.");
    let executor = executor_with(&ai, QaSettings::default()).await;

    let url = server.url("/sales.csv");
    let summary = executor.load_url(&url).await?;
    assert_eq!(summary.rows, 60);
    assert_eq!(summary.source.as_deref(), Some(url.as_str()));

    executor.ask("How many widgets?", None).await?;
    let memories = executor.orchestrator().memories();
    assert_eq!(memories.recent("default").len(), 1);

    assert!(executor.clear("default"));
    assert!(memories.recent("default").is_empty());
    Ok(())
}
