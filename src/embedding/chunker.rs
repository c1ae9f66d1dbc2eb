//! Boundary-aware splitting of long text into overlapping chunks

use crate::error::{GatewayError, Result};

/// Characters past the tentative end searched for a boundary
const BOUNDARY_SEARCH_WINDOW: usize = 100;

/// A split point must leave at least this fraction of `chunk_size` in the chunk
const MIN_CHUNK_FRACTION: f64 = 0.8;

/// One chunk with its character range in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Trimmed chunk text
    pub text: String,
    /// Character index where the untrimmed slice starts
    pub start: usize,
    /// Character index one past the untrimmed slice end
    pub end: usize,
}

/// Splits text into chunks of at most `chunk_size` characters plus a small
/// boundary margin, consecutive chunks sharing up to `overlap` characters
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            overlap: 200,
        }
    }
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(GatewayError::Validation(
                "Chunk size must be greater than 0".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(GatewayError::Validation(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into non-empty, trimmed chunks
    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.chunk_with_spans(text).into_iter().map(|c| c.text).collect()
    }

    /// Split `text`, keeping each chunk's character range
    pub fn chunk_with_spans(&self, text: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();

        if len <= self.chunk_size {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Vec::new();
            }
            return vec![TextChunk {
                text: trimmed.to_string(),
                start: 0,
                end: len,
            }];
        }

        let min_chunk = (self.chunk_size as f64 * MIN_CHUNK_FRACTION) as usize;
        let mut chunks = Vec::with_capacity(len / (self.chunk_size - self.overlap) + 1);
        let mut start = 0;

        while start < len {
            let mut end = (start + self.chunk_size).min(len);

            if end < len {
                let window_end = (end + BOUNDARY_SEARCH_WINDOW).min(len);
                if let Some(split) = find_boundary(&chars[end..window_end]) {
                    let candidate = end + split + 1;
                    if candidate - start >= min_chunk {
                        end = candidate;
                    }
                }
            }

            let slice: String = chars[start..end].iter().collect();
            let trimmed = slice.trim();
            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    start,
                    end,
                });
            }

            if end >= len {
                break;
            }
            start = (start + 1).max(end.saturating_sub(self.overlap));
        }

        chunks
    }
}

/// Index of the last period, else last newline, else last space
fn find_boundary(window: &[char]) -> Option<usize> {
    ['.', '\n', ' ']
        .iter()
        .find_map(|delimiter| window.iter().rposition(|c| c == delimiter))
}
