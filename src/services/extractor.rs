//! PDF text extraction.
//!
//! Extraction never fails from the caller's point of view: unreadable documents yield an
//! empty string and a warning in the log.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use crate::utils::normalize_page_text;

/// Text of a PDF, one entry per page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub pages: Vec<String>,
}

impl ExtractedText {
    /// Non-empty pages joined, each followed by a newline.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for page in self.pages.iter().filter(|p| !p.is_empty()) {
            text.push_str(page);
            text.push('\n');
        }
        text
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Extract per-page text from PDF bytes.
///
/// `label` identifies the document in log lines.
pub fn extract_pages(bytes: &[u8], label: &str) -> ExtractedText {
    if bytes.is_empty() {
        tracing::warn!(file = label, "Empty PDF payload");
        return ExtractedText::default();
    }

    // The PDF parser panics on some malformed inputs.
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    match result {
        Ok(Ok(pages)) => ExtractedText {
            pages: pages.iter().map(|p| normalize_page_text(p)).collect(),
        },
        Ok(Err(e)) => {
            tracing::warn!(file = label, error = %e, "Failed to read PDF");
            ExtractedText::default()
        }
        Err(_) => {
            tracing::warn!(file = label, "PDF parser panicked");
            ExtractedText::default()
        }
    }
}

/// Extract text from PDF bytes; empty string on any failure.
pub fn extract_text(bytes: &[u8], label: &str) -> String {
    extract_pages(bytes, label).text()
}

/// Extract per-page text from a local PDF file; no pages on any failure.
pub fn extract_pages_from_path(path: &Path) -> ExtractedText {
    let label = path.display().to_string();
    match std::fs::read(path) {
        Ok(bytes) => extract_pages(&bytes, &label),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(file = %label, "Local file not found");
            ExtractedText::default()
        }
        Err(e) => {
            tracing::warn!(file = %label, error = %e, "Failed to read local PDF");
            ExtractedText::default()
        }
    }
}
