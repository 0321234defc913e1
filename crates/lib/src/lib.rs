//! # Excel QA
//!
//! Data-grounded question answering over a single uploaded table.
//!
//! A CSV dataset is loaded into a [`store::DatasetStore`], every row is rendered
//! and optionally embedded, and questions are answered either by retrieving the
//! most similar rows for one model call or, for small tables, by letting a
//! bounded agent explore the whole table. [`DataQaExecutor`] ties it together.

pub mod agent;
pub mod constants;
pub mod encoder;
pub mod errors;
pub mod executor;
pub mod index;
pub mod loader;
pub mod memory;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod settings;
pub mod store;
pub mod types;

pub use errors::{PromptError, QaError};
pub use executor::{DataQaExecutor, DataQaExecutorBuilder};
pub use settings::QaSettings;
pub use types::{CellValue, Dataset, DatasetSummary, QueryResult, RelevantRow};
