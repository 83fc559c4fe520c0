//! Text chunking with overlap for embedding.

use crate::models::IngestionConfig;

/// Splits text into overlapping windows measured in characters.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker with an explicit window size and overlap (characters).
    ///
    /// An overlap that is not smaller than the window is ignored.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let overlap = if overlap < chunk_size { overlap } else { 0 };
        Self {
            chunk_size,
            overlap,
        }
    }

    pub fn from_config(config: &IngestionConfig) -> Self {
        Self::new(config.chunk_size as usize, config.chunk_overlap as usize)
    }

    /// Split text into ordered chunks of at most `chunk_size` characters.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();

        if total <= self.chunk_size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total {
            let target_end = (start + self.chunk_size).min(total);
            let end = self.find_break_point(&chars, start, target_end, total);

            let chunk: String = chars[start..end].iter().collect();
            if !chunk.trim().is_empty() {
                chunks.push(chunk);
            }

            if end >= total {
                break;
            }

            // Next window re-reads `overlap` characters but must move forward.
            start = end.saturating_sub(self.overlap).max(start + 1);
        }

        chunks
    }

    /// Find a natural break point within the last 20% of the window.
    fn find_break_point(&self, chars: &[char], start: usize, target_end: usize, total: usize) -> usize {
        if target_end >= total {
            return total;
        }

        let search_start = target_end
            .saturating_sub(self.chunk_size / 5)
            .max(start + self.overlap + 1)
            .min(target_end);
        let window = &chars[search_start..target_end];

        // Priority: paragraph > newline > sentence end > space
        let mut paragraph = None;
        let mut newline = None;
        let mut sentence = None;
        let mut space = None;

        for (i, c) in window.iter().enumerate() {
            let pos = search_start + i;
            match c {
                '\n' => {
                    if i > 0 && window[i - 1] == '\n' {
                        paragraph = Some(pos + 1);
                    }
                    newline = Some(pos + 1);
                }
                '.' | '!' | '?' => {
                    if window.get(i + 1).is_some_and(|c| c.is_whitespace()) {
                        sentence = Some(pos + 1);
                    }
                }
                ' ' | '\t' => space = Some(pos + 1),
                _ => {}
            }
        }

        paragraph
            .or(newline)
            .or(sentence)
            .or(space)
            .unwrap_or(target_end)
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&IngestionConfig::default())
    }
}
