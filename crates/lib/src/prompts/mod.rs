//! # Prompt Templates
//!
//! Default templates for the two model-facing tasks, and the [`PromptTemplates`]
//! set the orchestrator renders them from. The server may override any template
//! through its `tasks` configuration.

pub mod tasks;

use serde::{Deserialize, Serialize};

pub const QA_SYNTHESIS_TASK: &str = "qa_synthesis";
pub const DATA_AGENT_TASK: &str = "data_agent";

/// A system/user template pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPrompts {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// The templates used to answer questions.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplates {
    /// Placeholders: `{schema}`, `{rows}`, `{history}`, `{question}`.
    pub qa_synthesis: TaskPrompts,
    /// Placeholders: `{schema}`, `{row_count}`, `{preview}`, `{transcript}`, `{question}`.
    pub data_agent: TaskPrompts,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            qa_synthesis: TaskPrompts {
                system_prompt: tasks::QA_SYNTHESIS_SYSTEM_PROMPT.to_string(),
                user_prompt: tasks::QA_SYNTHESIS_USER_PROMPT.to_string(),
            },
            data_agent: TaskPrompts {
                system_prompt: tasks::DATA_AGENT_SYSTEM_PROMPT.to_string(),
                user_prompt: tasks::DATA_AGENT_USER_PROMPT.to_string(),
            },
        }
    }
}

/// Substitutes `{name}` placeholders in a template in a single pass.
///
/// Substituted values are never rescanned, so data containing braces passes through.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values.iter().find_map(|(name, value)| {
            tail.strip_prefix(*name)
                .and_then(|r| r.strip_prefix('}'))
                .map(|remaining| (*value, remaining))
        });
        match hit {
            Some((value, remaining)) => {
                out.push_str(value);
                rest = remaining;
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}
