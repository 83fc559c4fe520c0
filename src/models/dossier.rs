use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One embedded chunk of dossier text, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub text: String,
    pub embedding: Vec<f32>,
    pub source_file: String,
}

impl ChunkRecord {
    /// The `metadata` JSON stored alongside each row.
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source_file: self.source_file.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_file: String,
}

/// A client whose dossier is being ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: i32,
    pub name: String,
}

/// Chunk records grouped by review year across all files of a run.
///
/// Years iterate in ascending order.
#[derive(Debug, Clone, Default)]
pub struct YearGroups {
    groups: BTreeMap<i32, Vec<ChunkRecord>>,
}

impl YearGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one file's records to its year.
    pub fn extend(&mut self, year: i32, records: Vec<ChunkRecord>) {
        self.groups.entry(year).or_default().extend(records);
    }

    pub fn total_chunks(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn year_count(&self) -> usize {
        self.groups.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &[ChunkRecord])> {
        self.groups.iter().map(|(year, records)| (*year, records.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, source: &str) -> ChunkRecord {
        ChunkRecord {
            text: text.to_string(),
            embedding: vec![0.1, 0.2],
            source_file: source.to_string(),
        }
    }

    #[test]
    fn test_metadata_serializes_source_file() {
        let meta = record("t", "apex-2020.pdf").metadata();
        assert_eq!(
            serde_json::to_value(&meta).unwrap(),
            serde_json::json!({"source_file": "apex-2020.pdf"})
        );
    }

    #[test]
    fn test_year_groups_merge_files_of_same_year() {
        let mut groups = YearGroups::new();
        assert_eq!(groups.total_chunks(), 0);

        groups.extend(2021, vec![record("a", "x-2021.pdf")]);
        groups.extend(2020, vec![record("b", "y-2020.pdf")]);
        groups.extend(2021, vec![record("c", "z-2021.pdf"), record("d", "z-2021.pdf")]);

        assert_eq!(groups.total_chunks(), 4);
        assert_eq!(groups.year_count(), 2);
        let years: Vec<_> = groups.iter().map(|(year, _)| year).collect();
        assert_eq!(years, vec![2020, 2021]);

        let (year, records) = groups.iter().nth(1).unwrap();
        assert_eq!(year, 2021);
        let sources: Vec<_> = records.iter().map(|r| r.source_file.as_str()).collect();
        assert_eq!(sources, vec!["x-2021.pdf", "z-2021.pdf", "z-2021.pdf"]);
    }
}
