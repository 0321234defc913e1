use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single scalar cell of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Infers a typed value from a raw CSV field.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return CellValue::Float(f);
            }
        }
        CellValue::Text(trimmed.to_string())
    }

    /// Returns the numeric value of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "null"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// An in-memory table with a fixed schema.
///
/// Rows are stored positionally: `rows[r][c]` is the value of column `schema[c]`
/// in row `r`. Construction through [`Dataset::new`] guarantees that every row
/// has exactly one cell per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// Builds a dataset, rejecting rows that do not match the schema width.
    pub fn new(schema: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self, String> {
        if schema.is_empty() {
            return Err("the header row has no columns".to_string());
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != schema.len()) {
            return Err(format!(
                "data row {} has {} values but the header has {} columns",
                i + 1,
                row.len(),
                schema.len()
            ));
        }
        Ok(Self { schema, rows })
    }

    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    /// Returns the position of a column, matching case-insensitively as a fallback.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.iter().position(|c| c == name).or_else(|| {
            self.schema
                .iter()
                .position(|c| c.eq_ignore_ascii_case(name.trim()))
        })
    }
}

/// A dataset row prepared for retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    /// Position of the row in its dataset.
    pub row_id: usize,
    /// Canonical `column: value, ...` rendering.
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

/// A retrieved row as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevantRow {
    pub row_id: usize,
    pub content: String,
    pub similarity: f64,
}

/// Which strategy produced an answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStrategy {
    #[default]
    Retrieval,
    Agent,
}

/// The result of answering one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub relevant_data: Vec<RelevantRow>,
    /// Either exactly three suggestions or empty.
    pub followup_questions: Vec<String>,
    #[serde(skip)]
    pub strategy: AnswerStrategy,
}

/// One question/answer exchange kept in conversation memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        }
    }
}

/// Shape and provenance of the current dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub generation: u64,
    pub source: Option<String>,
    /// Number of rows that received an embedding vector.
    pub embedded_rows: usize,
}
