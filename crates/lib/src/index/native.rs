use super::{BackendKind, ScoredRow, VectorBackend};
use crate::errors::QaError;
use async_trait::async_trait;
use std::{
    fmt::{self, Debug},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{debug, info, warn};
use turso::{params, Database, Value as TursoValue};

/// Checks whether the database exposes the vector functions we rely on.
pub async fn probe(db: &Database) -> bool {
    let result = async {
        let conn = db.connect()?;
        let mut rows = conn
            .query(
                "SELECT vector_distance_cos(vector32('[1.0, 0.0]'), vector32('[1.0, 0.0]'))",
                (),
            )
            .await?;
        Ok::<_, turso::Error>(rows.next().await?.is_some())
    }
    .await;

    match result {
        Ok(available) => available,
        Err(e) => {
            debug!("Vector functions unavailable: {e}");
            false
        }
    }
}

fn table_name(generation: u64) -> String {
    format!("row_vectors_{generation}")
}

fn vector_literal(vector: &[f32]) -> String {
    format!(
        "[{}]",
        vector
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )
}

/// Tables whose last index handle has been dropped, awaiting `DROP TABLE`.
#[derive(Debug, Default)]
pub struct RetiredTables(Mutex<Vec<String>>);

impl RetiredTables {
    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn retire(&self, table: String) {
        self.lock().push(table);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of tables waiting to be dropped.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }
}

/// Owns a table name; retires the table when the last handle goes away.
struct TableLease {
    name: String,
    retired: Arc<RetiredTables>,
}

impl Drop for TableLease {
    fn drop(&mut self) {
        self.retired.retire(std::mem::take(&mut self.name));
    }
}

/// Vectors of one generation stored in a dedicated turso table.
///
/// The table lives as long as any clone of this index. Once the last one is
/// dropped the table is retired and removed by the next [`NativeVectorIndex::build`].
#[derive(Clone)]
pub struct NativeVectorIndex {
    db: Database,
    table: Arc<TableLease>,
    len: usize,
}

impl Debug for NativeVectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeVectorIndex")
            .field("table", &self.table.name)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl NativeVectorIndex {
    /// Creates and fills the table for `generation`, then drops retired tables.
    pub async fn build(
        db: Database,
        generation: u64,
        entries: Vec<(usize, Vec<f32>)>,
        retired: Arc<RetiredTables>,
    ) -> Result<Self, QaError> {
        let table = table_name(generation);
        let conn = db.connect()?;

        conn.execute(&format!("DROP TABLE IF EXISTS {table}"), ())
            .await?;
        conn.execute(
            &format!("CREATE TABLE {table} (row_id INTEGER PRIMARY KEY, embedding BLOB NOT NULL)"),
            (),
        )
        .await?;

        conn.execute("BEGIN TRANSACTION", ()).await?;
        let mut stmt = conn
            .prepare(&format!(
                "INSERT INTO {table} (row_id, embedding) VALUES (?1, vector32(?2))"
            ))
            .await?;
        for (row_id, vector) in &entries {
            if let Err(e) = stmt
                .execute(params![*row_id as i64, vector_literal(vector)])
                .await
            {
                warn!("Failed to insert vector for row {row_id}: {e}. Rolling back transaction.");
                conn.execute("ROLLBACK", ()).await?;
                return Err(e.into());
            }
        }
        conn.execute("COMMIT", ()).await?;
        info!("Stored {} vectors in '{table}'.", entries.len());

        // A failed publish of this same generation may have retired its name.
        let stale: Vec<String> = retired
            .take()
            .into_iter()
            .filter(|name| *name != table)
            .collect();
        drop_tables(&conn, &stale).await;

        Ok(Self {
            db,
            table: Arc::new(TableLease {
                name: table,
                retired,
            }),
            len: entries.len(),
        })
    }
}

/// Names of every per-generation vector table in `db`.
pub async fn vector_tables(db: &Database) -> Result<Vec<String>, QaError> {
    let conn = db.connect()?;
    let mut rows = conn
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'row_vectors_%' ORDER BY name",
            (),
        )
        .await?;
    let mut names = Vec::new();
    while let Some(row) = rows.next().await? {
        if let TursoValue::Text(name) = row.get_value(0)? {
            names.push(name);
        }
    }
    Ok(names)
}

/// Drops every vector table left behind by an earlier process.
///
/// Generation numbers restart at 1, so tables from a previous run would
/// otherwise never be retired.
pub async fn clear_leftover_tables(db: &Database) {
    let leftover = match vector_tables(db).await {
        Ok(names) => names,
        Err(e) => {
            warn!("Could not list vector tables for cleanup: {e}");
            return;
        }
    };
    if leftover.is_empty() {
        return;
    }
    match db.connect() {
        Ok(conn) => {
            drop_tables(&conn, &leftover).await;
            info!("Removed {} vector tables from a previous run.", leftover.len());
        }
        Err(e) => warn!("Could not connect to drop leftover vector tables: {e}"),
    }
}

async fn drop_tables(conn: &turso::Connection, names: &[String]) {
    for name in names {
        match conn.execute(&format!("DROP TABLE IF EXISTS {name}"), ()).await {
            Ok(_) => debug!("Dropped retired vector table '{name}'."),
            Err(e) => warn!("Failed to drop retired vector table '{name}': {e}"),
        }
    }
}

#[async_trait]
impl VectorBackend for NativeVectorIndex {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn len(&self) -> usize {
        self.len
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRow>, QaError> {
        let conn = self.db.connect()?;
        let sql = format!(
            "SELECT row_id, vector_distance_cos(embedding, vector32(?1)) AS distance
             FROM {} ORDER BY distance ASC, row_id ASC LIMIT {k}",
            self.table.name
        );
        let mut rows = conn.query(&sql, params![vector_literal(query)]).await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            let row_id = match row.get_value(0)? {
                TursoValue::Integer(i) => i as usize,
                _ => continue,
            };
            let distance = match row.get_value(1)? {
                TursoValue::Real(f) => f,
                TursoValue::Integer(i) => i as f64,
                _ => continue,
            };
            results.push(ScoredRow {
                row_id,
                score: 1.0 - distance,
            });
        }
        Ok(results)
    }
}
