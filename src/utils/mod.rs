//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{is_pdf_name, object_name_for, review_year_from_filename, split_gcs_uri};
pub use retry::{RetryConfig, RetryResult, Retryable, with_retry};
pub use text::{format_currency, normalize_page_text, preview};
