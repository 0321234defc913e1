//! The working view the agent operates on: a subset of row positions and columns
//! over the full dataset. Every operation returns a rendered observation.

use super::actions::{AgentAction, AggregateFunction, FilterOp};
use crate::{
    encoder::render_row,
    types::{CellValue, Dataset},
};
use serde_json::Value;
use std::cmp::Ordering;

/// Rows shown by `select` when the model gives no limit.
const DEFAULT_SELECT_LIMIT: usize = 20;
/// Hard cap on rows rendered into one observation.
const MAX_OBSERVATION_ROWS: usize = 50;

#[derive(Debug, Clone)]
pub struct WorkingView<'a> {
    dataset: &'a Dataset,
    rows: Vec<usize>,
    columns: Vec<usize>,
    preview_rows: usize,
}

impl<'a> WorkingView<'a> {
    pub fn new(dataset: &'a Dataset, preview_rows: usize) -> Self {
        Self {
            dataset,
            rows: (0..dataset.row_count()).collect(),
            columns: (0..dataset.column_count()).collect(),
            preview_rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Renders the first `n` rows of the view, one per line.
    pub fn render_rows(&self, n: usize) -> String {
        if self.rows.is_empty() {
            return "(no rows)".to_string();
        }
        let names: Vec<String> = self
            .columns
            .iter()
            .map(|&c| self.dataset.schema()[c].clone())
            .collect();
        self.rows
            .iter()
            .take(n)
            .map(|&r| {
                let cells: Vec<CellValue> = self
                    .columns
                    .iter()
                    .map(|&c| self.dataset.rows()[r][c].clone())
                    .collect();
                format!("[{r}] {}", render_row(&names, &cells))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn column(&self, name: &str) -> Result<usize, String> {
        self.dataset.column_index(name).ok_or_else(|| {
            format!(
                "Error: unknown column '{name}'. Available columns: {}.",
                self.dataset.schema().join(", ")
            )
        })
    }

    fn cell(&self, row: usize, column: usize) -> &CellValue {
        &self.dataset.rows()[row][column]
    }

    /// Applies a table operation. `final_answer` is handled by the caller.
    pub fn apply(&mut self, action: &AgentAction) -> Result<String, String> {
        match action {
            AgentAction::Filter { column, op, value } => {
                let c = self.column(column)?;
                let before = self.rows.len();
                let dataset = self.dataset;
                self.rows
                    .retain(|&r| matches_filter(&dataset.rows()[r][c], *op, value));
                Ok(format!(
                    "Filtered {before} rows to {} where {} {} {value}.\n{}",
                    self.rows.len(),
                    self.dataset.schema()[c],
                    op.as_str(),
                    self.render_rows(self.preview_rows)
                ))
            }
            AgentAction::Sort { column, descending } => {
                let c = self.column(column)?;
                let dataset = self.dataset;
                self.rows.sort_by(|&a, &b| {
                    let ord = compare_cells(&dataset.rows()[a][c], &dataset.rows()[b][c]);
                    if *descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                });
                Ok(format!(
                    "Sorted {} rows by {}{}.\n{}",
                    self.rows.len(),
                    self.dataset.schema()[c],
                    if *descending { " descending" } else { "" },
                    self.render_rows(self.preview_rows)
                ))
            }
            AgentAction::Select { columns, limit } => {
                let selected = columns
                    .iter()
                    .map(|name| self.column(name))
                    .collect::<Result<Vec<_>, _>>()?;
                if selected.is_empty() {
                    return Err("Error: select needs at least one column.".to_string());
                }
                self.columns = selected;
                let n = limit
                    .unwrap_or(DEFAULT_SELECT_LIMIT)
                    .min(MAX_OBSERVATION_ROWS);
                Ok(format!(
                    "Showing {} of {} rows.\n{}",
                    n.min(self.rows.len()),
                    self.rows.len(),
                    self.render_rows(n)
                ))
            }
            AgentAction::Aggregate {
                function,
                column,
                group_by,
            } => self.aggregate(*function, column.as_deref(), group_by.as_deref()),
            AgentAction::Reset => {
                self.rows = (0..self.dataset.row_count()).collect();
                self.columns = (0..self.dataset.column_count()).collect();
                Ok(format!(
                    "View reset to all {} rows and {} columns.",
                    self.rows.len(),
                    self.columns.len()
                ))
            }
            AgentAction::FinalAnswer { .. } => {
                Err("Error: final_answer is not a table operation.".to_string())
            }
        }
    }

    fn aggregate(
        &self,
        function: AggregateFunction,
        column: Option<&str>,
        group_by: Option<&str>,
    ) -> Result<String, String> {
        let target = column.map(|name| self.column(name)).transpose()?;
        if target.is_none() && function != AggregateFunction::Count {
            return Err(format!("Error: {} needs a column.", function.as_str()));
        }
        let label = match target {
            Some(c) => format!("{}({})", function.as_str(), self.dataset.schema()[c]),
            None => format!("{}(*)", function.as_str()),
        };

        let Some(group) = group_by.map(|name| self.column(name)).transpose()? else {
            let value = self.aggregate_rows(function, target, &self.rows)?;
            return Ok(format!("{label} = {value} (over {} rows)", self.rows.len()));
        };

        // Groups in order of first appearance.
        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        for &r in &self.rows {
            let key = self.cell(r, group).to_string();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(r),
                None => groups.push((key, vec![r])),
            }
        }
        let name = &self.dataset.schema()[group];
        let lines = groups
            .iter()
            .take(MAX_OBSERVATION_ROWS)
            .map(|(key, members)| {
                let value = self
                    .aggregate_rows(function, target, members)
                    .unwrap_or_else(|e| e);
                format!("{name} = {key}: {label} = {value}")
            })
            .collect::<Vec<_>>();
        Ok(format!("{} groups.\n{}", groups.len(), lines.join("\n")))
    }

    fn aggregate_rows(
        &self,
        function: AggregateFunction,
        column: Option<usize>,
        rows: &[usize],
    ) -> Result<String, String> {
        let Some(c) = column else {
            return Ok(rows.len().to_string());
        };
        let cells = rows.iter().map(|&r| self.cell(r, c));
        match function {
            AggregateFunction::Count => Ok(cells.filter(|v| !v.is_null()).count().to_string()),
            AggregateFunction::CountDistinct => {
                let mut seen: Vec<String> = Vec::new();
                for v in cells.filter(|v| !v.is_null()) {
                    let key = v.to_string();
                    if !seen.contains(&key) {
                        seen.push(key);
                    }
                }
                Ok(seen.len().to_string())
            }
            AggregateFunction::Sum | AggregateFunction::Mean => {
                let numbers: Vec<f64> = cells.filter_map(CellValue::as_f64).collect();
                if numbers.is_empty() {
                    return Err(format!(
                        "Error: column '{}' has no numeric values.",
                        self.dataset.schema()[c]
                    ));
                }
                let sum: f64 = numbers.iter().sum();
                Ok(if function == AggregateFunction::Sum {
                    format_number(sum)
                } else {
                    format_number(sum / numbers.len() as f64)
                })
            }
            AggregateFunction::Min | AggregateFunction::Max => {
                let pick = cells.filter(|v| !v.is_null()).reduce(|best, v| {
                    let ord = compare_cells(v, best);
                    let better = if function == AggregateFunction::Min {
                        ord == Ordering::Less
                    } else {
                        ord == Ordering::Greater
                    };
                    if better {
                        v
                    } else {
                        best
                    }
                });
                Ok(pick.map_or_else(|| "null".to_string(), ToString::to_string))
            }
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:.4}")
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

/// Orders numbers numerically, text case-insensitively, numbers before text and nulls last.
fn compare_cells(a: &CellValue, b: &CellValue) -> Ordering {
    match (a, b) {
        (CellValue::Null, CellValue::Null) => Ordering::Equal,
        (CellValue::Null, _) => Ordering::Greater,
        (_, CellValue::Null) => Ordering::Less,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a
                .to_string()
                .to_lowercase()
                .cmp(&b.to_string().to_lowercase()),
        },
    }
}

fn matches_filter(cell: &CellValue, op: FilterOp, value: &Value) -> bool {
    if cell.is_null() {
        return match op {
            FilterOp::Eq => value.is_null(),
            FilterOp::Ne => !value.is_null(),
            _ => false,
        };
    }
    if value.is_null() {
        return op == FilterOp::Ne;
    }

    let target_text = match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    let target = CellValue::infer(&target_text);

    let ord = || match (cell.as_f64(), target.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => cell.to_string().to_lowercase().cmp(&target_text.to_lowercase()),
    };
    match op {
        FilterOp::Contains => cell
            .to_string()
            .to_lowercase()
            .contains(&target_text.to_lowercase()),
        FilterOp::Eq => ord() == Ordering::Equal,
        FilterOp::Ne => ord() != Ordering::Equal,
        FilterOp::Gt => ord() == Ordering::Greater,
        FilterOp::Gte => ord() != Ordering::Less,
        FilterOp::Lt => ord() == Ordering::Less,
        FilterOp::Lte => ord() != Ordering::Greater,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Dataset {
        let t = |s: &str| CellValue::Text(s.to_string());
        Dataset::new(
            vec!["Name".into(), "Age".into(), "City".into()],
            vec![
                vec![t("Alice"), CellValue::Integer(30), t("Paris")],
                vec![t("Bob"), CellValue::Integer(25), t("Rome")],
                vec![t("Cara"), CellValue::Integer(35), t("Paris")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn filter_then_aggregate_over_the_view() {
        let data = people();
        let mut view = WorkingView::new(&data, 5);
        view.apply(&AgentAction::Filter {
            column: "city".into(),
            op: FilterOp::Eq,
            value: Value::String("paris".into()),
        })
        .unwrap();
        assert_eq!(view.row_count(), 2);

        let obs = view
            .apply(&AgentAction::Aggregate {
                function: AggregateFunction::Mean,
                column: Some("Age".into()),
                group_by: None,
            })
            .unwrap();
        assert!(obs.starts_with("mean(Age) = 32.5"), "{obs}");
    }

    #[test]
    fn grouped_count_and_unknown_column() {
        let data = people();
        let mut view = WorkingView::new(&data, 5);
        let obs = view
            .apply(&AgentAction::Aggregate {
                function: AggregateFunction::Count,
                column: None,
                group_by: Some("City".into()),
            })
            .unwrap();
        assert!(obs.contains("City = Paris: count(*) = 2"), "{obs}");
        assert!(obs.contains("City = Rome: count(*) = 1"), "{obs}");

        let err = view
            .apply(&AgentAction::Sort {
                column: "Salary".into(),
                descending: true,
            })
            .unwrap_err();
        assert!(err.contains("unknown column 'Salary'"));
    }

    #[test]
    fn numeric_filters_compare_numbers() {
        let data = people();
        let mut view = WorkingView::new(&data, 5);
        view.apply(&AgentAction::Filter {
            column: "Age".into(),
            op: FilterOp::Gte,
            value: serde_json::json!(30),
        })
        .unwrap();
        assert_eq!(view.row_count(), 2);
        view.apply(&AgentAction::Reset).unwrap();
        assert_eq!(view.row_count(), 3);
    }
}
