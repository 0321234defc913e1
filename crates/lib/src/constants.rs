//! # Shared Constants
//!
//! Default locations and limits shared by the `excelqa` crates.

/// The root directory for local databases.
pub const DB_DIR: &str = "db";

/// The default path for the vector index database.
pub const DEFAULT_DB_FILE: &str = "db/excelqa.db";

/// Directory holding the backing copy of the current dataset.
pub const DEFAULT_DATA_DIR: &str = "data";

/// File name of the backing copy inside the data directory.
pub const CURRENT_DATASET_FILE: &str = "current.csv";

/// Directory where named uploads are saved.
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";

/// Dataset loaded at startup when no backing copy exists.
pub const DEFAULT_DATASET_PATH: &str = "sample.csv";

/// Timeout for downloading a CSV from a URL.
pub const URL_FETCH_TIMEOUT_SECS: u64 = 30;

/// Number of follow-up questions an answer carries.
pub const FOLLOWUP_COUNT: usize = 3;

/// Session used when a request does not name one.
pub const DEFAULT_SESSION_ID: &str = "default";
