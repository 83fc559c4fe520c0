mod config;
mod dossier;
mod format;
mod invoice;
mod prediction;

pub use config::{
    Config, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_CLIENT_NAME,
    DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL,
    DEFAULT_STORAGE_URL, DatabaseConfig, EmbeddingConfig, IngestionConfig, OutputConfig,
    PredictionConfig, StorageConfig,
};
pub use dossier::{ChunkMetadata, ChunkRecord, Client, YearGroups};
pub use format::OutputFormat;
pub use invoice::{BankTransfer, Invoice, Party, PaymentMethods, cell_text};
pub use prediction::{PredictionOutcome, PredictionRow, customer_id_for};
