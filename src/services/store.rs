//! Relational dossier store (PostgreSQL + pgvector).

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;

use crate::error::PersistenceError;
use crate::models::{ChunkRecord, Client, DatabaseConfig};
use crate::utils::preview;

pub const CLIENTS_TABLE: &str = "clients";
pub const CORPUS_TABLE: &str = "risk_dossier_corpus";

/// Persistence operations the ingestion driver needs.
#[async_trait]
pub trait DossierStore: Send + Sync {
    async fn health_check(&self) -> Result<bool, PersistenceError>;

    /// Create the extension, tables and uniqueness constraint if missing.
    async fn ensure_schema(&self) -> Result<(), PersistenceError>;

    async fn find_client(&self, name: &str) -> Result<Option<Client>, PersistenceError>;

    /// Look the client up by name and insert it when absent.
    ///
    /// Not isolated: two concurrent runs can both insert the same name.
    async fn get_or_create_client(&self, name: &str) -> Result<Client, PersistenceError>;

    /// Insert one year's chunks, ignoring rows whose key already exists.
    ///
    /// Returns the number of new rows. The batch commits as a whole or not at all.
    async fn insert_chunks(
        &self,
        client_id: i32,
        review_year: i32,
        chunks: &[ChunkRecord],
    ) -> Result<u64, PersistenceError>;

    /// Stored row counts per review year for a client, ascending by year.
    async fn year_counts(&self, client_id: i32) -> Result<Vec<(i32, u64)>, PersistenceError>;
}

/// Why a record was rejected before reaching SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRejection {
    EmptyText,
    EmptyEmbedding,
    NonFiniteEmbedding,
    DimensionMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for RecordRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordRejection::EmptyText => write!(f, "empty chunk text"),
            RecordRejection::EmptyEmbedding => write!(f, "empty embedding"),
            RecordRejection::NonFiniteEmbedding => write!(f, "embedding has non-finite values"),
            RecordRejection::DimensionMismatch { expected, actual } => {
                write!(f, "embedding dimension {} != {}", actual, expected)
            }
        }
    }
}

/// Check a record is insertable. `dimension` of `None` accepts any length.
pub fn validate_record(
    record: &ChunkRecord,
    dimension: Option<usize>,
) -> Result<(), RecordRejection> {
    if record.text.is_empty() {
        return Err(RecordRejection::EmptyText);
    }
    if record.embedding.is_empty() {
        return Err(RecordRejection::EmptyEmbedding);
    }
    if !record.embedding.iter().all(|v| v.is_finite()) {
        return Err(RecordRejection::NonFiniteEmbedding);
    }
    if let Some(expected) = dimension
        && record.embedding.len() != expected
    {
        return Err(RecordRejection::DimensionMismatch {
            expected,
            actual: record.embedding.len(),
        });
    }
    Ok(())
}

/// Writes a single chunk row inside an open batch.
#[async_trait]
pub trait RowWriter: Send {
    /// Returns whether a new row was stored; `false` when the key already existed.
    async fn write_row(
        &mut self,
        client_id: i32,
        review_year: i32,
        chunk: &ChunkRecord,
    ) -> Result<bool, String>;
}

/// Write every valid chunk through `writer`, counting new rows.
///
/// Invalid rows are skipped with a warning. The first write failure stops the batch and is
/// returned; the caller owns rollback.
pub async fn insert_validated<W: RowWriter + ?Sized>(
    writer: &mut W,
    client_id: i32,
    review_year: i32,
    chunks: &[ChunkRecord],
    dimension: usize,
) -> Result<u64, PersistenceError> {
    let mut inserted = 0u64;
    for chunk in chunks {
        if let Err(reason) = validate_record(chunk, Some(dimension)) {
            tracing::warn!(
                year = review_year,
                reason = %reason,
                text = %preview(&chunk.text, 50),
                "Skipping chunk"
            );
            continue;
        }

        if writer
            .write_row(client_id, review_year, chunk)
            .await
            .map_err(PersistenceError::InsertError)?
        {
            inserted += 1;
        }
    }
    Ok(inserted)
}

struct PgRowWriter<'a> {
    conn: &'a mut PgConnection,
    query: &'a str,
}

#[async_trait]
impl RowWriter for PgRowWriter<'_> {
    async fn write_row(
        &mut self,
        client_id: i32,
        review_year: i32,
        chunk: &ChunkRecord,
    ) -> Result<bool, String> {
        let done = sqlx::query(self.query)
            .bind(client_id)
            .bind(review_year)
            .bind(&chunk.text)
            .bind(Vector::from(chunk.embedding.clone()))
            .bind(Json(chunk.metadata()))
            .execute(&mut *self.conn)
            .await
            .map_err(|e| e.to_string())?;
        Ok(done.rows_affected() > 0)
    }
}

pub struct PgDossierStore {
    pool: PgPool,
    embedding_dim: usize,
}

impl PgDossierStore {
    pub async fn connect(
        config: &DatabaseConfig,
        embedding_dim: usize,
    ) -> Result<Self, PersistenceError> {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user);
        if let Some(ref password) = config.password {
            options = options.password(password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max.max(1))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|e| PersistenceError::ConnectionError(e.to_string()))?;

        tracing::info!(host = %config.host, database = %config.name, "Connected to PostgreSQL");

        Ok(Self {
            pool,
            embedding_dim,
        })
    }

    async fn check_pgvector_extension(&self) -> Result<(), PersistenceError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname::text FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| PersistenceError::QueryError(e.to_string()))?;

        if result.is_none() {
            return Err(PersistenceError::PgVectorExtensionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }

    fn insert_sql() -> String {
        format!(
            r#"
            INSERT INTO {} (client_id, review_year, chunk_text, embedding, metadata)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (client_id, review_year, chunk_text) DO NOTHING
            "#,
            CORPUS_TABLE
        )
    }
}

#[async_trait]
impl DossierStore for PgDossierStore {
    async fn health_check(&self) -> Result<bool, PersistenceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| PersistenceError::ConnectionError(e.to_string()))
    }

    async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        // Needs CREATE privilege; falls through to the check below when it is missing.
        if let Err(e) = sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
        {
            tracing::warn!(error = %e, "Could not create pgvector extension");
        }
        self.check_pgvector_extension().await?;

        let statements = [
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    client_id SERIAL PRIMARY KEY,
                    client_name TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )
                "#,
                CLIENTS_TABLE
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {corpus} (
                    id BIGSERIAL PRIMARY KEY,
                    client_id INTEGER NOT NULL REFERENCES {clients}(client_id),
                    review_year INTEGER NOT NULL,
                    chunk_text TEXT NOT NULL,
                    embedding vector({dim}) NOT NULL,
                    metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    UNIQUE (client_id, review_year, chunk_text)
                )
                "#,
                corpus = CORPUS_TABLE,
                clients = CLIENTS_TABLE,
                dim = self.embedding_dim
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {0}_client_year_idx ON {0} (client_id, review_year)",
                CORPUS_TABLE
            ),
        ];

        for sql in &statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| PersistenceError::SchemaError(e.to_string()))?;
        }

        tracing::info!(table = CORPUS_TABLE, dimension = self.embedding_dim, "Schema ready");
        Ok(())
    }

    async fn find_client(&self, name: &str) -> Result<Option<Client>, PersistenceError> {
        let query = format!(
            "SELECT client_id FROM {} WHERE client_name = $1 ORDER BY client_id LIMIT 1",
            CLIENTS_TABLE
        );
        let row: Option<(i32,)> = sqlx::query_as(&query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::ClientError(e.to_string()))?;

        Ok(row.map(|(id,)| Client {
            id,
            name: name.to_string(),
        }))
    }

    async fn get_or_create_client(&self, name: &str) -> Result<Client, PersistenceError> {
        if let Some(client) = self.find_client(name).await? {
            tracing::info!(client = name, client_id = client.id, "Client already exists");
            return Ok(client);
        }

        let query = format!(
            "INSERT INTO {} (client_name) VALUES ($1) RETURNING client_id",
            CLIENTS_TABLE
        );
        let (id,): (i32,) = sqlx::query_as(&query)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PersistenceError::ClientError(e.to_string()))?;

        tracing::info!(client = name, client_id = id, "Inserted client");
        Ok(Client {
            id,
            name: name.to_string(),
        })
    }

    async fn insert_chunks(
        &self,
        client_id: i32,
        review_year: i32,
        chunks: &[ChunkRecord],
    ) -> Result<u64, PersistenceError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let query = Self::insert_sql();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PersistenceError::InsertError(e.to_string()))?;

        let mut writer = PgRowWriter {
            conn: &mut *tx,
            query: &query,
        };
        let inserted =
            match insert_validated(&mut writer, client_id, review_year, chunks, self.embedding_dim)
                .await
            {
                Ok(inserted) => inserted,
                Err(e) => {
                    if let Err(rollback) = tx.rollback().await {
                        tracing::warn!(error = %rollback, "Rollback failed");
                    }
                    return Err(e);
                }
            };

        tx.commit()
            .await
            .map_err(|e| PersistenceError::InsertError(e.to_string()))?;

        Ok(inserted)
    }

    async fn year_counts(&self, client_id: i32) -> Result<Vec<(i32, u64)>, PersistenceError> {
        let query = format!(
            r#"
            SELECT review_year, COUNT(*) AS count
            FROM {}
            WHERE client_id = $1
            GROUP BY review_year
            ORDER BY review_year
            "#,
            CORPUS_TABLE
        );

        let rows = sqlx::query(&query)
            .bind(client_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PersistenceError::QueryError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let year: i32 = row.get("review_year");
                let count: i64 = row.get("count");
                (year, count as u64)
            })
            .collect())
    }
}
