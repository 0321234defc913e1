//! # Agent Fallback Path
//!
//! Answers a question by letting the model explore the whole table through a
//! fixed set of operations. Each step is one model call that must reply with a
//! single JSON action; the action runs against a [`view::WorkingView`] and its
//! rendered result is fed back on the next step.
//!
//! The loop is bounded by a step budget and a wall-clock timeout. Replies outside
//! the action set are never executed: they become an error observation and still
//! consume a step.

pub mod actions;
pub mod view;

use self::{
    actions::{parse_action, AgentAction},
    view::WorkingView,
};
use crate::{
    constants::FOLLOWUP_COUNT,
    encoder::{describe_schema, render_row},
    errors::QaError,
    prompts::{render, TaskPrompts},
    providers::ai::AiProvider,
    types::{AnswerStrategy, Dataset, QueryResult},
};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Budget and presentation limits of one agent run.
#[derive(Debug, Clone, Copy)]
pub struct AgentLimits {
    pub max_steps: usize,
    pub timeout: Duration,
    pub preview_rows: usize,
}

#[derive(Debug, Clone)]
pub struct DataAgent {
    ai_provider: Box<dyn AiProvider>,
    prompts: TaskPrompts,
    limits: AgentLimits,
}

impl DataAgent {
    pub fn new(ai_provider: Box<dyn AiProvider>, prompts: TaskPrompts, limits: AgentLimits) -> Self {
        Self {
            ai_provider,
            prompts,
            limits,
        }
    }

    /// Answers `question` against the full `dataset`. Does not read or write memory.
    pub async fn ask_direct(&self, question: &str, dataset: &Dataset) -> Result<QueryResult, QaError> {
        let mut steps = 0usize;
        let outcome = timeout(self.limits.timeout, self.run(question, dataset, &mut steps)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(steps, "Data agent timed out after {:?}.", self.limits.timeout);
                Err(QaError::AgentTimeout { steps })
            }
        }
    }

    async fn run(
        &self,
        question: &str,
        dataset: &Dataset,
        steps: &mut usize,
    ) -> Result<QueryResult, QaError> {
        let mut view = WorkingView::new(dataset, self.limits.preview_rows);
        let mut transcript: Vec<String> = Vec::new();

        let schema = describe_schema(dataset);
        let row_count = dataset.row_count().to_string();
        let preview = preview_rows(dataset, self.limits.preview_rows);

        while *steps < self.limits.max_steps {
            *steps += 1;
            let transcript_text = if transcript.is_empty() {
                "(none yet)".to_string()
            } else {
                transcript.join("\n\n")
            };
            let user_prompt = render(
                &self.prompts.user_prompt,
                &[
                    ("schema", schema.as_str()),
                    ("row_count", row_count.as_str()),
                    ("preview", preview.as_str()),
                    ("transcript", transcript_text.as_str()),
                    ("question", question),
                ],
            );
            debug!(step = *steps, user_prompt = %user_prompt, "--> Sending agent step to AI Provider");

            let reply = self
                .ai_provider
                .generate(&self.prompts.system_prompt, &user_prompt)
                .await
                .map_err(|e| {
                    error!(step = *steps, "Data agent model call failed: {e}");
                    QaError::Generation(e.to_string())
                })?;
            debug!("<-- Agent reply: {reply}");

            let observation = match parse_action(&reply) {
                Ok(AgentAction::FinalAnswer {
                    answer,
                    followup_questions,
                }) => {
                    info!(steps = *steps, "Data agent produced a final answer.");
                    return Ok(QueryResult {
                        answer: answer.trim().to_string(),
                        relevant_data: Vec::new(),
                        followup_questions: exactly_three(followup_questions),
                        strategy: AnswerStrategy::Agent,
                    });
                }
                Ok(action) => view
                    .apply(&action)
                    .unwrap_or_else(|rejection| rejection),
                Err(rejection) => rejection,
            };
            transcript.push(format!(
                "Step {}:\nAction: {}\nObservation: {observation}",
                *steps,
                reply.trim()
            ));
        }

        warn!(steps = *steps, "Data agent exhausted its step budget.");
        Err(QaError::AgentTimeout { steps: *steps })
    }
}

fn exactly_three(mut questions: Vec<String>) -> Vec<String> {
    questions.retain(|q| !q.trim().is_empty());
    if questions.len() < FOLLOWUP_COUNT {
        return Vec::new();
    }
    questions.truncate(FOLLOWUP_COUNT);
    questions.into_iter().map(|q| q.trim().to_string()).collect()
}

fn preview_rows(dataset: &Dataset, n: usize) -> String {
    dataset
        .rows()
        .iter()
        .take(n)
        .enumerate()
        .map(|(i, row)| format!("[{i}] {}", render_row(dataset.schema(), row)))
        .collect::<Vec<_>>()
        .join("\n")
}
