//! # QA Orchestrator
//!
//! Decides how a question is answered, assembles the prompt, makes the single
//! model call and parses the reply into an answer plus follow-up questions.

use crate::{
    agent::{AgentLimits, DataAgent},
    constants::FOLLOWUP_COUNT,
    encoder::describe_schema,
    errors::QaError,
    index::IndexQuery,
    memory::SessionMemories,
    prompts::{render, PromptTemplates},
    providers::ai::AiProvider,
    settings::QaSettings,
    store::{DatasetStore, Generation},
    types::{AnswerStrategy, ConversationTurn, QueryResult, RelevantRow},
};
use regex::Regex;
use std::{sync::LazyLock, time::Duration};
use tracing::{debug, error, info};

#[derive(Debug)]
pub struct QaOrchestrator {
    ai_provider: Box<dyn AiProvider>,
    prompts: PromptTemplates,
    settings: QaSettings,
    agent: DataAgent,
    memories: SessionMemories,
}

impl QaOrchestrator {
    pub fn new(ai_provider: Box<dyn AiProvider>, prompts: PromptTemplates, settings: QaSettings) -> Self {
        let agent = DataAgent::new(
            ai_provider.clone(),
            prompts.data_agent.clone(),
            agent_limits(&settings),
        );
        Self {
            memories: SessionMemories::new(settings.memory_capacity, settings.max_sessions),
            ai_provider,
            prompts,
            settings,
            agent,
        }
    }

    /// Runs the data agent on a different model than retrieval answers.
    pub fn with_agent_provider(mut self, ai_provider: Box<dyn AiProvider>) -> Self {
        self.agent = DataAgent::new(
            ai_provider,
            self.prompts.data_agent.clone(),
            agent_limits(&self.settings),
        );
        self
    }

    pub fn settings(&self) -> &QaSettings {
        &self.settings
    }

    pub fn memories(&self) -> &SessionMemories {
        &self.memories
    }

    /// Picks the answering strategy for a generation.
    pub fn strategy_for(&self, generation: &Generation) -> AnswerStrategy {
        if generation.dataset.row_count() < self.settings.agent_row_threshold {
            return AnswerStrategy::Agent;
        }
        if !generation.index.has_embeddings() && self.settings.agent_when_no_embeddings {
            return AnswerStrategy::Agent;
        }
        AnswerStrategy::Retrieval
    }

    /// Answers `question` against the current dataset of `store`.
    ///
    /// On success the turn is appended to the session's memory; on any failure
    /// memory is left unchanged.
    pub async fn ask(
        &self,
        store: &DatasetStore,
        question: &str,
        session_id: &str,
    ) -> Result<QueryResult, QaError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QaError::InvalidQuestion);
        }
        let generation = store.current().await?;

        let strategy = self.strategy_for(&generation);
        info!(
            generation = generation.id,
            rows = generation.dataset.row_count(),
            ?strategy,
            "Answering question."
        );

        let result = match strategy {
            AnswerStrategy::Agent => self.agent.ask_direct(question, &generation.dataset).await?,
            AnswerStrategy::Retrieval => {
                self.answer_with_retrieval(store, &generation, question, session_id)
                    .await?
            }
        };

        self.memories
            .append(session_id, ConversationTurn::new(question, result.answer.clone()));
        Ok(result)
    }

    async fn answer_with_retrieval(
        &self,
        store: &DatasetStore,
        generation: &Generation,
        question: &str,
        session_id: &str,
    ) -> Result<QueryResult, QaError> {
        let vector = if generation.index.has_embeddings() {
            store.encoder().embed_query(question).await
        } else {
            None
        };
        let query = match vector {
            Some(vector) => IndexQuery::Embedding {
                vector,
                text: question.to_string(),
            },
            None => IndexQuery::Text(question.to_string()),
        };

        let hits = generation.index.query(&query, self.settings.top_k).await?;
        let relevant_data: Vec<RelevantRow> = hits
            .iter()
            .filter_map(|hit| {
                generation.index.content(hit.row_id).map(|content| RelevantRow {
                    row_id: hit.row_id,
                    content: content.to_string(),
                    similarity: hit.score,
                })
            })
            .collect();
        debug!("Retrieved {} rows for the question.", relevant_data.len());

        let rows_text = if relevant_data.is_empty() {
            "(no matching rows)".to_string()
        } else {
            relevant_data
                .iter()
                .map(|r| format!("[{}] (similarity {:.3}) {}", r.row_id, r.similarity, r.content))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let history = self.memories.recent(session_id);
        let history_text = if history.is_empty() {
            "(none)".to_string()
        } else {
            history
                .iter()
                .map(|turn| format!("Q: {}\nA: {}", turn.question, turn.answer))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let schema = describe_schema(&generation.dataset);
        let user_prompt = render(
            &self.prompts.qa_synthesis.user_prompt,
            &[
                ("schema", schema.as_str()),
                ("rows", rows_text.as_str()),
                ("history", history_text.as_str()),
                ("question", question),
            ],
        );
        let system_prompt = &self.prompts.qa_synthesis.system_prompt;
        debug!(system_prompt = %system_prompt, user_prompt = %user_prompt, "--> Sending prompts to AI Provider");

        let raw = self
            .ai_provider
            .generate(system_prompt, &user_prompt)
            .await
            .map_err(|e| {
                error!(
                    retrieved_rows = relevant_data.len(),
                    "Answer generation failed: {e}"
                );
                QaError::Generation(e.to_string())
            })?;
        debug!("<-- Answer from AI: {raw}");

        let (answer, followup_questions) = parse_response(&raw)?;
        Ok(QueryResult {
            answer,
            relevant_data,
            followup_questions,
            strategy: AnswerStrategy::Retrieval,
        })
    }
}

fn agent_limits(settings: &QaSettings) -> AgentLimits {
    AgentLimits {
        max_steps: settings.agent_max_steps,
        timeout: Duration::from_secs(settings.agent_timeout_secs),
        preview_rows: settings.agent_preview_rows,
    }
}

type Pattern = LazyLock<Result<Regex, regex::Error>>;

static FOLLOWUP_MARKER: Pattern = LazyLock::new(|| Regex::new(r"(?i)follow[- ]?up questions?\s*:"));
static ANSWER_MARKER: Pattern = LazyLock::new(|| Regex::new(r"(?im)^\s*answer\s*:"));
static FOLLOWUP_ITEM: Pattern =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+\s*[.)]|[-*•])\s*(.+?)\s*$"));

fn pattern(re: &'static Pattern) -> Result<&'static Regex, QaError> {
    re.as_ref()
        .map_err(|e| QaError::Generation(format!("invalid reply pattern: {e}")))
}

/// Splits a model reply into the answer and exactly three follow-ups, or none.
///
/// Without an `ANSWER:` marker everything before the follow-up section (or the
/// whole reply) is the answer.
pub fn parse_response(raw: &str) -> Result<(String, Vec<String>), QaError> {
    let (body, followups) = match pattern(&FOLLOWUP_MARKER)?.find(raw) {
        Some(m) => (&raw[..m.start()], &raw[m.end()..]),
        None => (raw, ""),
    };

    let answer = match pattern(&ANSWER_MARKER)?.find(body) {
        Some(m) => &body[m.end()..],
        None => body,
    }
    .trim()
    .to_string();

    let answer = if answer.is_empty() && followups.is_empty() {
        raw.trim().to_string()
    } else {
        answer
    };

    Ok((answer, parse_followups(followups)?))
}

fn parse_followups(section: &str) -> Result<Vec<String>, QaError> {
    let item = pattern(&FOLLOWUP_ITEM)?;
    let questions: Vec<String> = section
        .lines()
        .filter_map(|line| item.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .filter(|q| !q.is_empty())
        .take(FOLLOWUP_COUNT)
        .collect();
    Ok(if questions.len() == FOLLOWUP_COUNT {
        questions
    } else {
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_answer_and_numbered_followups() {
        let raw = "ANSWER:\nAlice lives in Paris.\n\nFOLLOW-UP QUESTIONS:\n1. Who is oldest?\n2) Who lives in Rome?\n3. What is the mean age?\n4. Extra?";
        let (answer, followups) = parse_response(raw).unwrap();
        assert_eq!(answer, "Alice lives in Paris.");
        assert_eq!(
            followups,
            vec!["Who is oldest?", "Who lives in Rome?", "What is the mean age?"]
        );
    }

    #[test]
    fn unmarked_reply_is_the_answer_and_short_lists_are_dropped() {
        assert_eq!(
            parse_response("Just three rows.").unwrap(),
            ("Just three rows.".to_string(), Vec::new())
        );
        let (answer, followups) =
            parse_response("Answer: Yes.\nFollow-up questions:\n- One?\n- Two?").unwrap();
        assert_eq!(answer, "Yes.");
        assert!(followups.is_empty());
    }

    #[test]
    fn reply_patterns_compile() {
        for re in [&FOLLOWUP_MARKER, &ANSWER_MARKER, &FOLLOWUP_ITEM] {
            assert!(pattern(re).is_ok());
        }
    }
}
