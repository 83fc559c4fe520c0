//! Ingestion driver: list -> classify -> extract -> chunk -> embed -> group -> insert.
//!
//! Files are processed one at a time. Any failure tied to a single file is logged and the
//! file is skipped; only client lookup failures abort a run.

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use std::time::Instant;

use super::chunker::TextChunker;
use super::embedding::Embedder;
use super::extractor::extract_text;
use super::source::DocumentSource;
use super::store::DossierStore;
use crate::error::IngestError;
use crate::models::{ChunkRecord, Client, YearGroups};
use crate::utils::review_year_from_filename;

/// Why a listed file contributed no rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Name does not end in `-YYYY.pdf`.
    NoYear,
    /// Download failed or the PDF yielded no text.
    NoText,
    NoChunks,
    EmbeddingFailed { error: String },
    EmbeddingMismatch { chunks: usize, embeddings: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoYear => write!(f, "file name does not match -YYYY.pdf"),
            SkipReason::NoText => write!(f, "no text extracted"),
            SkipReason::NoChunks => write!(f, "no chunks generated"),
            SkipReason::EmbeddingFailed { error } => write!(f, "embedding failed: {}", error),
            SkipReason::EmbeddingMismatch { chunks, embeddings } => write!(
                f,
                "{} chunks but {} embeddings",
                chunks, embeddings
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub file: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearSummary {
    pub year: i32,
    pub files: u64,
    pub chunks: u64,
    pub inserted: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<Client>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub files_listed: u64,
    pub files_processed: u64,
    pub skipped: Vec<SkippedFile>,
    pub years: Vec<YearSummary>,
    pub duration_ms: u64,
}

impl IngestReport {
    pub fn chunks_grouped(&self) -> u64 {
        self.years.iter().map(|y| y.chunks).sum()
    }

    pub fn rows_inserted(&self) -> u64 {
        self.years.iter().map(|y| y.inserted).sum()
    }

    pub fn failed_years(&self) -> impl Iterator<Item = &YearSummary> {
        self.years.iter().filter(|y| y.error.is_some())
    }

    fn skip(&mut self, file: &str, reason: SkipReason) {
        tracing::warn!(file, reason = %reason, "Skipping file");
        self.skipped.push(SkippedFile {
            file: file.to_string(),
            reason,
        });
    }

    fn year_mut(&mut self, year: i32) -> &mut YearSummary {
        let index = match self.years.binary_search_by_key(&year, |y| y.year) {
            Ok(index) => index,
            Err(index) => {
                self.years.insert(
                    index,
                    YearSummary {
                        year,
                        files: 0,
                        chunks: 0,
                        inserted: 0,
                        error: None,
                    },
                );
                index
            }
        };
        &mut self.years[index]
    }
}

/// A file that made it through classification, extraction and chunking.
struct PreparedFile {
    year: i32,
    chunks: Vec<String>,
}

/// Turns downloaded bytes into text; `extract_text` outside of tests.
type ExtractFn = fn(&[u8], &str) -> String;

pub struct Ingestor<'a> {
    source: &'a dyn DocumentSource,
    chunker: TextChunker,
    progress: ProgressBar,
    extract: ExtractFn,
}

impl<'a> Ingestor<'a> {
    pub fn new(source: &'a dyn DocumentSource, chunker: TextChunker) -> Self {
        Self {
            source,
            chunker,
            progress: ProgressBar::hidden(),
            extract: extract_text,
        }
    }

    #[cfg(test)]
    fn with_extractor(mut self, extract: ExtractFn) -> Self {
        self.extract = extract;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Full run: every listed PDF is embedded and persisted for `client_name`.
    pub async fn run(
        &self,
        client_name: &str,
        embedder: &dyn Embedder,
        store: &dyn DossierStore,
    ) -> Result<IngestReport, IngestError> {
        let started = Instant::now();
        let client = store.get_or_create_client(client_name).await?;

        let mut report = IngestReport {
            source: self.source.describe(),
            client: Some(client.clone()),
            started_at: Utc::now(),
            ..Default::default()
        };

        let files = self.list().await;
        report.files_listed = files.len() as u64;
        if files.is_empty() {
            tracing::info!(source = %report.source, "No PDF files found");
            report.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(report);
        }

        self.progress.set_length(files.len() as u64);
        let mut groups = YearGroups::new();

        for file in &files {
            self.progress.inc(1);

            let Some(prepared) = self.prepare(file, &mut report).await else {
                continue;
            };

            let embeddings = match embedder.embed_documents(&prepared.chunks).await {
                Ok(embeddings) => embeddings,
                Err(e) => {
                    report.skip(file, SkipReason::EmbeddingFailed {
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if embeddings.len() != prepared.chunks.len() {
                report.skip(file, SkipReason::EmbeddingMismatch {
                    chunks: prepared.chunks.len(),
                    embeddings: embeddings.len(),
                });
                continue;
            }

            let records: Vec<ChunkRecord> = prepared
                .chunks
                .into_iter()
                .zip(embeddings)
                .map(|(text, embedding)| ChunkRecord {
                    text,
                    embedding,
                    source_file: file.clone(),
                })
                .collect();

            tracing::info!(file = %file, year = prepared.year, chunks = records.len(), "Grouped chunks");
            let summary = report.year_mut(prepared.year);
            summary.files += 1;
            summary.chunks += records.len() as u64;
            report.files_processed += 1;
            groups.extend(prepared.year, records);
        }

        self.progress.finish_and_clear();
        tracing::info!(
            years = groups.year_count(),
            chunks = groups.total_chunks(),
            "Embedded all files"
        );

        for (year, records) in groups.iter() {
            tracing::info!(year, chunks = records.len(), "Inserting chunks");
            match store.insert_chunks(client.id, year, records).await {
                Ok(inserted) => {
                    tracing::info!(year, inserted, client_id = client.id, "Inserted new chunks");
                    report.year_mut(year).inserted = inserted;
                }
                Err(e) => {
                    tracing::error!(year, client_id = client.id, error = %e, "Insert batch rolled back");
                    report.year_mut(year).error = Some(e.to_string());
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Dry run: list, classify, extract and chunk without embedding or persisting.
    pub async fn survey(&self) -> IngestReport {
        let started = Instant::now();
        let mut report = IngestReport {
            source: self.source.describe(),
            dry_run: true,
            started_at: Utc::now(),
            ..Default::default()
        };

        let files = self.list().await;
        report.files_listed = files.len() as u64;
        self.progress.set_length(files.len() as u64);

        for file in &files {
            self.progress.inc(1);
            if let Some(prepared) = self.prepare(file, &mut report).await {
                let summary = report.year_mut(prepared.year);
                summary.files += 1;
                summary.chunks += prepared.chunks.len() as u64;
                report.files_processed += 1;
            }
        }

        self.progress.finish_and_clear();
        report.duration_ms = started.elapsed().as_millis() as u64;
        report
    }

    /// Listing failures are logged and treated as an empty listing.
    async fn list(&self) -> Vec<String> {
        match self.source.list_pdfs().await {
            Ok(files) => {
                tracing::info!(source = %self.source.describe(), files = files.len(), "Listed PDF files");
                files
            }
            Err(e) => {
                tracing::error!(source = %self.source.describe(), error = %e, "Failed to list PDF files");
                Vec::new()
            }
        }
    }

    async fn prepare(&self, file: &str, report: &mut IngestReport) -> Option<PreparedFile> {
        let Some(year) = review_year_from_filename(file) else {
            report.skip(file, SkipReason::NoYear);
            return None;
        };

        tracing::info!(file, year, "Processing file");
        let text = match self.source.fetch(file).await {
            Ok(bytes) => (self.extract)(&bytes, file),
            Err(e) => {
                tracing::warn!(file, error = %e, "Failed to download file");
                String::new()
            }
        };

        if text.is_empty() {
            report.skip(file, SkipReason::NoText);
            return None;
        }

        let chunks = self.chunker.split(&text);
        if chunks.is_empty() {
            report.skip(file, SkipReason::NoChunks);
            return None;
        }

        Some(PreparedFile { year, chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, PersistenceError, StorageError};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    /// In-memory source whose "PDF bytes" fail extraction unless listed in `texts`.
    struct FakeSource {
        names: Vec<String>,
        fail_listing: bool,
    }

    #[async_trait]
    impl DocumentSource for FakeSource {
        fn describe(&self) -> String {
            "memory".to_string()
        }

        async fn list_pdfs(&self) -> Result<Vec<String>, StorageError> {
            if self.fail_listing {
                return Err(StorageError::ServerError("status 500".into()));
            }
            Ok(self.names.clone())
        }

        async fn fetch(&self, name: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::NotFound(name.to_string()))
        }
    }

    /// Embeds every text as `[len, 1.0]`, optionally dropping one vector for some files.
    struct FakeEmbedder {
        short_for: Option<String>,
        fail: bool,
        calls: Mutex<usize>,
    }

    impl FakeEmbedder {
        fn ok() -> Self {
            Self {
                short_for: None,
                fail: false,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed_documents(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(EmbeddingError::Timeout);
            }
            let mut out: Vec<Vec<f32>> = texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect();
            if let Some(ref marker) = self.short_for
                && texts.iter().any(|t| t.contains(marker.as_str()))
            {
                out.pop();
            }
            Ok(out)
        }

        fn model(&self) -> &str {
            "fake"
        }
    }

    /// Enforces the (client_id, review_year, chunk_text) uniqueness like the real table.
    #[derive(Default)]
    struct MemoryStore {
        clients: Mutex<Vec<Client>>,
        rows: Mutex<BTreeMap<(i32, i32, String), ChunkRecord>>,
        fail_year: Option<i32>,
    }

    impl MemoryStore {
        fn row_count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DossierStore for MemoryStore {
        async fn health_check(&self) -> Result<bool, PersistenceError> {
            Ok(true)
        }

        async fn ensure_schema(&self) -> Result<(), PersistenceError> {
            Ok(())
        }

        async fn find_client(&self, name: &str) -> Result<Option<Client>, PersistenceError> {
            Ok(self
                .clients
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.name == name)
                .cloned())
        }

        async fn get_or_create_client(&self, name: &str) -> Result<Client, PersistenceError> {
            if let Some(client) = self.find_client(name).await? {
                return Ok(client);
            }
            let mut clients = self.clients.lock().unwrap();
            let client = Client {
                id: clients.len() as i32 + 1,
                name: name.to_string(),
            };
            clients.push(client.clone());
            Ok(client)
        }

        async fn insert_chunks(
            &self,
            client_id: i32,
            review_year: i32,
            chunks: &[ChunkRecord],
        ) -> Result<u64, PersistenceError> {
            if self.fail_year == Some(review_year) {
                return Err(PersistenceError::InsertError("disk full".into()));
            }
            let mut rows = self.rows.lock().unwrap();
            let mut inserted = 0;
            for chunk in chunks {
                let key = (client_id, review_year, chunk.text.clone());
                if !rows.contains_key(&key) {
                    rows.insert(key, chunk.clone());
                    inserted += 1;
                }
            }
            Ok(inserted)
        }

        async fn year_counts(&self, client_id: i32) -> Result<Vec<(i32, u64)>, PersistenceError> {
            let mut counts: BTreeMap<i32, u64> = BTreeMap::new();
            for (cid, year, _) in self.rows.lock().unwrap().keys() {
                if *cid == client_id {
                    *counts.entry(*year).or_default() += 1;
                }
            }
            Ok(counts.into_iter().collect())
        }
    }

    /// Source serving plain text as the "PDF" payload.
    struct TextSource {
        files: Vec<(String, String)>,
    }

    #[async_trait]
    impl DocumentSource for TextSource {
        fn describe(&self) -> String {
            "text-memory".to_string()
        }

        async fn list_pdfs(&self) -> Result<Vec<String>, StorageError> {
            Ok(self.files.iter().map(|(n, _)| n.clone()).collect())
        }

        async fn fetch(&self, name: &str) -> Result<Vec<u8>, StorageError> {
            self.files
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, text)| text.clone().into_bytes())
                .ok_or_else(|| StorageError::NotFound(name.to_string()))
        }
    }

    fn utf8_extract(bytes: &[u8], _label: &str) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn sample_source() -> TextSource {
        TextSource {
            files: vec![
                ("apex-2020.pdf".into(), (0..500).map(|i| format!("{i:04} ")).collect()),
                ("apex-2021.pdf".into(), "Annual review 2021. ".repeat(10)),
                ("apex-addendum-2021.pdf".into(), "Addendum text. ".repeat(5)),
                ("apex_report.pdf".into(), "ignored".into()),
            ],
        }
    }

    fn text_ingestor(source: &TextSource) -> Ingestor<'_> {
        Ingestor::new(source, TextChunker::new(1000, 100)).with_extractor(utf8_extract)
    }

    #[tokio::test]
    async fn test_unclassifiable_and_unreadable_files_are_skipped() {
        let source = FakeSource {
            names: vec!["apex_report.pdf".into(), "apex-2020.pdf".into()],
            fail_listing: false,
        };
        let store = MemoryStore::default();
        let embedder = FakeEmbedder::ok();
        let ingestor = Ingestor::new(&source, TextChunker::new(1000, 100));

        let report = ingestor
            .run("Apex Global Services FZE", &embedder, &store)
            .await
            .unwrap();

        assert_eq!(report.files_listed, 2);
        assert_eq!(report.files_processed, 0);
        assert_eq!(
            report.skipped,
            vec![
                SkippedFile {
                    file: "apex_report.pdf".into(),
                    reason: SkipReason::NoYear
                },
                SkippedFile {
                    file: "apex-2020.pdf".into(),
                    reason: SkipReason::NoText
                },
            ]
        );
        assert_eq!(*embedder.calls.lock().unwrap(), 0);
        assert_eq!(store.row_count(), 0);
        assert_eq!(report.client.unwrap().name, "Apex Global Services FZE");
    }

    #[tokio::test]
    async fn test_listing_failure_is_an_empty_run() {
        let source = FakeSource {
            names: vec![],
            fail_listing: true,
        };
        let store = MemoryStore::default();
        let report = Ingestor::new(&source, TextChunker::default())
            .run("Apex", &FakeEmbedder::ok(), &store)
            .await
            .unwrap();

        assert_eq!(report.files_listed, 0);
        assert!(report.years.is_empty());
        // The client is still created before listing.
        assert_eq!(store.clients.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_year_mut_keeps_years_sorted() {
        let mut report = IngestReport::default();
        report.year_mut(2022).chunks = 1;
        report.year_mut(2020).chunks = 2;
        report.year_mut(2021).chunks = 3;
        report.year_mut(2020).inserted = 2;

        let years: Vec<_> = report.years.iter().map(|y| y.year).collect();
        assert_eq!(years, vec![2020, 2021, 2022]);
        assert_eq!(report.chunks_grouped(), 6);
        assert_eq!(report.rows_inserted(), 2);
    }

    #[test]
    fn test_skip_reason_serialization() {
        let skipped = SkippedFile {
            file: "a-2020.pdf".into(),
            reason: SkipReason::EmbeddingMismatch {
                chunks: 3,
                embeddings: 2,
            },
        };
        assert_eq!(
            serde_json::to_value(&skipped).unwrap(),
            serde_json::json!({
                "file": "a-2020.pdf",
                "reason": "embedding_mismatch",
                "chunks": 3,
                "embeddings": 2
            })
        );
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let source = sample_source();
        let store = MemoryStore::default();
        let embedder = FakeEmbedder::ok();
        let ingestor = text_ingestor(&source);

        let first = ingestor.run("Apex", &embedder, &store).await.unwrap();
        assert_eq!(first.files_listed, 4);
        assert_eq!(first.files_processed, 3);
        assert_eq!(first.chunks_grouped(), 5);
        assert_eq!(first.rows_inserted(), 5);
        assert_eq!(store.year_counts(1).await.unwrap(), vec![(2020, 3), (2021, 2)]);

        let second = ingestor.run("Apex", &embedder, &store).await.unwrap();
        assert_eq!(second.chunks_grouped(), 5);
        assert_eq!(second.rows_inserted(), 0);
        assert_eq!(store.row_count(), 5);
        assert_eq!(store.clients.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mismatch_persists_nothing_from_that_file() {
        let source = sample_source();
        let store = MemoryStore::default();
        let embedder = FakeEmbedder {
            short_for: Some("Addendum".into()),
            fail: false,
            calls: Mutex::new(0),
        };

        let report = text_ingestor(&source)
            .run("Apex", &embedder, &store)
            .await
            .unwrap();

        let sources: HashSet<String> = store
            .rows
            .lock()
            .unwrap()
            .values()
            .map(|r| r.source_file.clone())
            .collect();
        assert!(!sources.contains("apex-addendum-2021.pdf"));
        assert!(sources.contains("apex-2021.pdf"));
        assert!(report.skipped.iter().any(|s| s.file == "apex-addendum-2021.pdf"
            && s.reason
                == SkipReason::EmbeddingMismatch {
                    chunks: 1,
                    embeddings: 0
                }));
    }

    #[tokio::test]
    async fn test_embedding_failure_skips_every_file() {
        let source = sample_source();
        let store = MemoryStore::default();
        let embedder = FakeEmbedder {
            short_for: None,
            fail: true,
            calls: Mutex::new(0),
        };

        let report = text_ingestor(&source)
            .run("Apex", &embedder, &store)
            .await
            .unwrap();

        assert_eq!(report.files_processed, 0);
        assert_eq!(report.skipped.len(), 4);
        assert!(report.years.is_empty());
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_year_does_not_block_other_years() {
        let source = sample_source();
        let store = MemoryStore {
            fail_year: Some(2020),
            ..Default::default()
        };
        let report = text_ingestor(&source)
            .run("Apex", &FakeEmbedder::ok(), &store)
            .await
            .unwrap();

        assert_eq!(
            report.failed_years().map(|y| y.year).collect::<Vec<_>>(),
            vec![2020]
        );
        assert_eq!(store.year_counts(1).await.unwrap(), vec![(2021, 2)]);
        assert_eq!(report.rows_inserted(), 2);
    }

    #[tokio::test]
    async fn test_survey_touches_neither_embedder_nor_store() {
        let source = sample_source();
        let report = text_ingestor(&source).survey().await;

        assert!(report.dry_run);
        assert!(report.client.is_none());
        assert_eq!(report.files_processed, 3);
        assert_eq!(
            report.years.iter().map(|y| (y.year, y.files, y.chunks)).collect::<Vec<_>>(),
            vec![(2020, 1, 3), (2021, 2, 2)]
        );
        assert_eq!(report.rows_inserted(), 0);
    }
}
