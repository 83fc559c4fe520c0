//! File name utilities for dossier documents.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-([0-9]{4})\.pdf$").expect("valid year pattern"))
}

/// Extract the review year from a dossier file name such as `apex-2020.pdf`.
///
/// The name may carry directory components (`reviews/apex-2020.pdf`). Names that do not end
/// in `-YYYY.pdf` yield `None`.
pub fn review_year_from_filename(name: &str) -> Option<i32> {
    let captures = year_pattern().captures(name)?;
    captures.get(1)?.as_str().parse().ok()
}

/// Check whether an object or file name looks like a PDF (case-insensitive).
pub fn is_pdf_name(name: &str) -> bool {
    name.to_lowercase().ends_with(".pdf")
}

/// Object name of a local file relative to the directory being ingested.
///
/// Separators are normalized to `/` so local names match bucket object names.
pub fn object_name_for(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Split `gs://bucket/object` into bucket and object name.
pub fn split_gcs_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("gs://")?;
    let (bucket, object) = rest.split_once('/')?;
    if bucket.is_empty() || object.is_empty() {
        return None;
    }
    Some((bucket, object))
}
