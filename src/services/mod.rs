mod chunker;
mod embedding;
mod extractor;
mod ingest;
mod prediction;
mod source;
mod store;

pub use chunker::TextChunker;
pub use embedding::{Embedder, EmbeddingClient};
pub use extractor::{ExtractedText, extract_pages, extract_pages_from_path, extract_text};
pub use ingest::{IngestReport, Ingestor, SkipReason, SkippedFile, YearSummary};
pub use prediction::{
    PredictionClient, Record, label_predictions, load_records, parse_csv_records,
    parse_records, records_from_bytes,
};
pub use source::{DocumentSource, GcsSource, LocalSource};
pub use store::{
    CLIENTS_TABLE, CORPUS_TABLE, DossierStore, PgDossierStore, RecordRejection, RowWriter,
    insert_validated, validate_record,
};
