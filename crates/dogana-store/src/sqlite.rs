//! Local `SQLite` mirror of the collateral tables and chunk store.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

use crate::datastore::{BoxFuture, Datastore, check_identifiers, cosine_similarity};
use crate::error::StoreError;
use crate::in_memory_store::StoredChunk;
use crate::types::{ChunkMatch, TableRow};

const DEFAULT_CHUNKS_TABLE: &str = "chunks";

/// Datastore backed by a `SQLite` file.
///
/// Collateral tables are queried as-is. Chunks live in one table with columns
/// `text`, `metadata` (JSON text), `celex_consolidated`, `unit_type` and
/// `embedding` (JSON array); similarity is ranked in process.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    chunks_table: String,
}

impl SqliteStore {
    /// Open (or create) the database at `path`. `:memory:` opens a private
    /// in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let (url, max_connections) = if path == ":memory:" {
            ("sqlite::memory:".to_string(), 1)
        } else {
            (format!("sqlite:{path}?mode=rwc"), 5)
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        Ok(Self {
            pool,
            chunks_table: DEFAULT_CHUNKS_TABLE.into(),
        })
    }

    /// # Errors
    ///
    /// Returns [`StoreError::InvalidIdentifier`] if `table` is not a plain name.
    pub fn with_chunks_table(mut self, table: &str) -> Result<Self, StoreError> {
        check_identifiers(&[table])?;
        self.chunks_table = table.to_owned();
        Ok(self)
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the chunk table if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn ensure_chunks_table(&self) -> Result<(), StoreError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                text TEXT NOT NULL, \
                metadata TEXT NOT NULL DEFAULT '{{}}', \
                celex_consolidated TEXT, \
                unit_type TEXT, \
                embedding TEXT NOT NULL)",
            self.chunks_table
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if serialization or the insert fails.
    pub async fn insert_chunk(&self, chunk: &StoredChunk) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO \"{}\" (text, metadata, celex_consolidated, unit_type, embedding) \
             VALUES (?, ?, ?, ?, ?)",
            self.chunks_table
        );
        sqlx::query(&sql)
            .bind(&chunk.text)
            .bind(serde_json::to_string(&chunk.metadata)?)
            .bind(&chunk.citation)
            .bind(&chunk.unit_type)
            .bind(serde_json::to_string(&chunk.embedding)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rank_chunks(
        &self,
        query_vector: &[f32],
        match_count: usize,
        type_filters: Option<&[String]>,
    ) -> Result<Vec<ChunkMatch>, StoreError> {
        let sql = format!(
            "SELECT text, metadata, celex_consolidated, unit_type, embedding FROM \"{}\"",
            self.chunks_table
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let unit_type: Option<String> = row.try_get("unit_type")?;
            if let Some(filters) = type_filters
                && !unit_type.as_ref().is_some_and(|t| filters.contains(t))
            {
                continue;
            }
            let embedding: String = row.try_get("embedding")?;
            let embedding: Vec<f32> = serde_json::from_str(&embedding)?;
            let metadata: String = row.try_get("metadata")?;
            let score = cosine_similarity(query_vector, &embedding);
            scored.push(ChunkMatch {
                text: row.try_get("text")?,
                metadata: serde_json::Value::String(metadata),
                citation: row.try_get("celex_consolidated")?,
                similarity: Some(score),
            });
        }

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(match_count);
        Ok(scored)
    }

    async fn select(
        &self,
        sql: String,
        binds: Vec<String>,
        limit: usize,
    ) -> Result<Vec<TableRow>, StoreError> {
        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = query.bind(bind);
        }
        let rows = query
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(row_to_map)
            .collect::<Result<_, _>>()
            .map_err(StoreError::from)
    }
}

/// Convert a row of any shape into a JSON map, following the storage class of
/// each cell.
fn row_to_map(row: &SqliteRow) -> Result<TableRow, sqlx::Error> {
    let mut map = TableRow::new();
    for (i, column) in row.columns().iter().enumerate() {
        let kind = {
            let raw = row.try_get_raw(i)?;
            if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_owned())
            }
        };
        let value = match kind.as_deref() {
            None => serde_json::Value::Null,
            Some("INTEGER") => serde_json::Value::from(row.try_get::<i64, _>(i)?),
            Some("REAL") => serde_json::Value::from(row.try_get::<f64, _>(i)?),
            Some(_) => row
                .try_get::<String, _>(i)
                .map_or(serde_json::Value::Null, serde_json::Value::String),
        };
        map.insert(column.name().to_owned(), value);
    }
    Ok(map)
}

impl Datastore for SqliteStore {
    fn select_eq(
        &self,
        table: &str,
        field: &str,
        value: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<TableRow>, StoreError>> {
        let checked = check_identifiers(&[table, field]);
        let sql =
            format!("SELECT * FROM \"{table}\" WHERE CAST(\"{field}\" AS TEXT) = ? LIMIT ?");
        let binds = vec![value.to_owned()];
        Box::pin(async move {
            checked?;
            self.select(sql, binds, limit).await
        })
    }

    fn select_prefix(
        &self,
        table: &str,
        field: &str,
        prefix: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<TableRow>, StoreError>> {
        let checked = check_identifiers(&[table, field]);
        let sql = format!(
            "SELECT * FROM \"{table}\" \
             WHERE substr(CAST(\"{field}\" AS TEXT), 1, length(?)) = ? \
             ORDER BY \"{field}\" ASC LIMIT ?"
        );
        let binds = vec![prefix.to_owned(), prefix.to_owned()];
        Box::pin(async move {
            checked?;
            self.select(sql, binds, limit).await
        })
    }

    fn search_chunks(
        &self,
        query_vector: Vec<f32>,
        match_count: usize,
        type_filters: Option<Vec<String>>,
    ) -> BoxFuture<'_, Result<Vec<ChunkMatch>, StoreError>> {
        Box::pin(async move {
            self.rank_chunks(&query_vector, match_count, type_filters.as_deref())
                .await
        })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "sqlite"
    }
}
