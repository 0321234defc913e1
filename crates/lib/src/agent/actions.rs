//! The closed set of operations the agent may request.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

static CODE_BLOCK: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Contains => "contains",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Count,
    Sum,
    Mean,
    Min,
    Max,
    CountDistinct,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Mean => "mean",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::CountDistinct => "count_distinct",
        }
    }
}

/// One step requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    Filter {
        column: String,
        op: FilterOp,
        value: Value,
    },
    Sort {
        column: String,
        #[serde(default)]
        descending: bool,
    },
    Select {
        columns: Vec<String>,
        #[serde(default)]
        limit: Option<usize>,
    },
    Aggregate {
        function: AggregateFunction,
        #[serde(default)]
        column: Option<String>,
        #[serde(default)]
        group_by: Option<String>,
    },
    Reset,
    FinalAnswer {
        answer: String,
        #[serde(default)]
        followup_questions: Vec<String>,
    },
}

/// Extracts and parses the JSON action from a model reply.
///
/// Accepts a bare object, an object inside a markdown code block, or an object
/// surrounded by prose. The error is the observation fed back to the model.
pub fn parse_action(raw: &str) -> Result<AgentAction, String> {
    let re = CODE_BLOCK.as_ref().map_err(|e| e.to_string())?;
    let body = re
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or(raw, |m| m.as_str());

    let json = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => return Err("Error: the reply did not contain a JSON action object.".to_string()),
    };

    serde_json::from_str(json).map_err(|e| format!("Error: invalid action ({e})."))
}
