//! # QA Orchestrator Tests
//!
//! Strategy selection, prompt assembly, response parsing and the memory side
//! effects of `ask`.

mod common;

use anyhow::Result;
use common::{dataset, retrieval_settings, setup_tracing, EMBEDDING_DIMS};
use excelqa::{
    encoder::RowEncoder,
    index::IndexBuilder,
    orchestrator::QaOrchestrator,
    prompts::PromptTemplates,
    providers::ai::EmbeddingProvider,
    settings::QaSettings,
    store::DatasetStore,
    types::AnswerStrategy,
    QaError,
};
use excelqa_test_utils::{
    sales_csv, MockAiProvider, MockEmbeddingProvider, AGENT_PROMPT_KEY, PEOPLE_CSV, QA_PROMPT_KEY,
};

const QA_REPLY: &str = "ANSWER:\nThe west region sold the most gizmos.\n\nFOLLOW-UP QUESTIONS:\n1. Which product sold least?\n2. How many units did the north sell?\n3. What is the average units per row?";

fn store_with(embedder: Option<Box<dyn EmbeddingProvider>>) -> DatasetStore {
    DatasetStore::new(RowEncoder::new(embedder, 4), IndexBuilder::brute_force(), None)
}

fn embedded_store() -> DatasetStore {
    store_with(Some(Box::new(MockEmbeddingProvider::new(EMBEDDING_DIMS))))
}

fn orchestrator(ai: &MockAiProvider, settings: QaSettings) -> QaOrchestrator {
    QaOrchestrator::new(Box::new(ai.clone()), PromptTemplates::default(), settings)
}

#[tokio::test]
async fn test_small_table_goes_to_the_agent() -> Result<()> {
    setup_tracing();
    let ai = MockAiProvider::new();
    ai.queue_response(AGENT_PROMPT_KEY, r#"{"action": "aggregate", "function": "count"}"#);
    ai.queue_response(
        AGENT_PROMPT_KEY,
        r#"{"action": "final_answer", "answer": "There are 3 rows."}"#,
    );
    let store = embedded_store();
    store.replace(dataset(PEOPLE_CSV), None, None).await?;
    let qa = orchestrator(&ai, QaSettings::default());

    let result = qa.ask(&store, "how many rows are there?", "s1").await?;

    assert_eq!(result.strategy, AnswerStrategy::Agent);
    assert!(result.answer.contains('3'), "{}", result.answer);
    assert!(ai.get_calls()[1].1.contains("count(*) = 3"));
    // Agent answers are remembered too.
    assert_eq!(qa.memories().recent("s1").len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_retrieval_prompt_order_and_parsed_reply() -> Result<()> {
    setup_tracing();
    let ai = MockAiProvider::new();
    ai.add_response(QA_PROMPT_KEY, QA_REPLY);
    let store = embedded_store();
    store.replace(dataset(&sales_csv(60)), None, None).await?;
    let qa = orchestrator(&ai, QaSettings::default());

    qa.ask(&store, "Which region sold gizmo?", "s1").await?;
    let result = qa.ask(&store, "Which gizmo sold best in the west?", "s1").await?;

    assert_eq!(result.strategy, AnswerStrategy::Retrieval);
    assert_eq!(result.answer, "The west region sold the most gizmos.");
    assert_eq!(result.followup_questions.len(), 3);
    assert_eq!(result.relevant_data.len(), 5);
    assert!(result
        .relevant_data
        .windows(2)
        .all(|w| w[0].similarity >= w[1].similarity));

    let (_, user_prompt) = &ai.get_calls()[1];
    let schema_at = user_prompt.find("- Product (text)").unwrap();
    let rows_at = user_prompt.find(&result.relevant_data[0].content).unwrap();
    let history_at = user_prompt.find("Q: Which region sold gizmo?").unwrap();
    let question_at = user_prompt.rfind("Which gizmo sold best in the west?").unwrap();
    assert!(schema_at < rows_at && rows_at < history_at && history_at < question_at);
    Ok(())
}

#[tokio::test]
async fn test_no_dataset_and_empty_question() -> Result<()> {
    setup_tracing();
    let ai = MockAiProvider::new();
    ai.add_response(QA_PROMPT_KEY, QA_REPLY);
    let store = embedded_store();
    let qa = orchestrator(&ai, QaSettings::default());

    let result = qa.ask(&store, "anything?", "s1").await;
    assert!(matches!(result, Err(QaError::NoDataLoaded)));
    assert!(qa.memories().recent("s1").is_empty());

    store.replace(dataset(&sales_csv(60)), None, None).await?;
    let result = qa.ask(&store, "   ", "s1").await;
    assert!(matches!(result, Err(QaError::InvalidQuestion)));
    assert_eq!(ai.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_transient_model_failure_then_retry_appends_one_turn() -> Result<()> {
    setup_tracing();
    let ai = MockAiProvider::new();
    ai.queue_failure(QA_PROMPT_KEY, "rate limited");
    ai.add_response(QA_PROMPT_KEY, QA_REPLY);
    let store = embedded_store();
    store.replace(dataset(&sales_csv(60)), None, None).await?;
    let qa = orchestrator(&ai, QaSettings::default());

    let first = qa.ask(&store, "Which region sold gizmo?", "s1").await;
    assert!(matches!(first, Err(QaError::Generation(_))));
    assert!(qa.memories().recent("s1").is_empty());

    qa.ask(&store, "Which region sold gizmo?", "s1").await?;
    let turns = qa.memories().recent("s1");
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].question, "Which region sold gizmo?");
    Ok(())
}

#[tokio::test]
async fn test_question_embedding_failure_degrades_to_keywords() -> Result<()> {
    setup_tracing();
    let ai = MockAiProvider::new();
    ai.add_response(QA_PROMPT_KEY, "Only gizmos match.");
    let store = store_with(Some(Box::new(
        MockEmbeddingProvider::new(EMBEDDING_DIMS).failing_on("zebra"),
    )));
    store.replace(dataset(&sales_csv(60)), None, None).await?;
    let qa = orchestrator(&ai, QaSettings::default());

    let result = qa.ask(&store, "zebra gizmo", "s1").await?;

    assert_eq!(result.answer, "Only gizmos match.");
    assert!(result.followup_questions.is_empty());
    assert!(!result.relevant_data.is_empty());
    assert!(result
        .relevant_data
        .iter()
        .all(|row| row.content.contains("gizmo")));
    Ok(())
}

#[tokio::test]
async fn test_index_without_embeddings_routes_by_setting() -> Result<()> {
    setup_tracing();
    let ai = MockAiProvider::new();
    ai.add_response(QA_PROMPT_KEY, QA_REPLY);
    ai.add_response(
        AGENT_PROMPT_KEY,
        r#"{"action": "final_answer", "answer": "From the agent."}"#,
    );
    let store = store_with(None);
    store.replace(dataset(&sales_csv(60)), None, None).await?;

    let with_agent = orchestrator(&ai, QaSettings::default());
    let result = with_agent.ask(&store, "Which region?", "s1").await?;
    assert_eq!(result.strategy, AnswerStrategy::Agent);

    let keyword_only = orchestrator(&ai, retrieval_settings());
    let result = keyword_only.ask(&store, "north widget", "s1").await?;
    assert_eq!(result.strategy, AnswerStrategy::Retrieval);
    assert!(result.relevant_data[0].content.contains("widget"));
    Ok(())
}
