//! Error types for the risk dossier CLI.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Errors related to listing and downloading source documents.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("storage server error: {0}")]
    ServerError(String),

    #[error("invalid storage response: {0}")]
    InvalidResponse(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("directory walk error: {0}")]
    WalkError(String),
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding client not configured: {0}")]
    NotConfigured(String),

    #[error("failed to connect to embedding service: {0}")]
    ConnectionError(String),

    #[error("embedding service error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            // 429 and 5xx are transient on hosted APIs
            EmbeddingError::ServerError(msg) => {
                msg.contains("503")
                    || msg.contains("502")
                    || msg.contains("504")
                    || msg.contains("500")
                    || msg.contains("429")
                    || msg.to_lowercase().contains("unavailable")
                    || msg.to_lowercase().contains("resource_exhausted")
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::NotConfigured(_) | EmbeddingError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to the relational dossier store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to connect to PostgreSQL: {0}")]
    ConnectionError(String),

    #[error("pgvector extension error: {0}")]
    PgVectorExtensionError(String),

    #[error("schema error: {0}")]
    SchemaError(String),

    #[error("client error: {0}")]
    ClientError(String),

    #[error("insert error: {0}")]
    InsertError(String),

    #[error("query error: {0}")]
    QueryError(String),
}

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("no document source configured: set GCS_BUCKET_NAME or pass --dir")]
    NoSource,
}

/// Errors related to invoice documents.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),
}

/// Errors related to the hosted prediction endpoint.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("prediction endpoint not configured: {0}")]
    NotConfigured(String),

    #[error("prediction request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("prediction endpoint error: {0}")]
    ServerError(String),

    #[error("invalid prediction response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("invalid records: {0}")]
    InvalidRecords(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error_retryable() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::ServerError("status 429: quota".to_string()).is_retryable());
        assert!(EmbeddingError::ServerError("status 503 Service Unavailable".into()).is_retryable());
        assert!(!EmbeddingError::ServerError("status 400: bad request".into()).is_retryable());
        assert!(!EmbeddingError::InvalidResponse("oops".into()).is_retryable());
        assert!(!EmbeddingError::NotConfigured("GEMINI_API_KEY".into()).is_retryable());
    }

    #[test]
    fn test_ingest_error_wraps_domain_errors() {
        let err: IngestError = PersistenceError::ConnectionError("refused".into()).into();
        assert_eq!(
            err.to_string(),
            "persistence error: failed to connect to PostgreSQL: refused"
        );
    }
}
