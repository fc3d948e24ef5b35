//! Windowing engine over token or character sequences.
//!
//! The window walk is unit-agnostic: callers hand in any slice of opaque
//! items plus a rendering closure that turns a sub-range back into
//! displayable text (token mode renders through the tokenizer's decoder,
//! character mode is identity).

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One contiguous window over the source sequence. A plain value object
/// with no back-reference to the sequence it came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-based position in emission order.
    pub index: usize,
    pub content: String,
    /// Character length of `content`.
    pub length: usize,
    /// Number of source units (tokens or characters) in the window.
    pub unit_count: usize,
    pub start_offset: usize,
    /// Inclusive offset of the last unit in the window.
    pub end_offset: usize,
    pub word_count: usize,
}

/// Aggregate statistics computed once over a finished chunk set.
///
/// `coverage_percentage` compares concatenated chunk characters against the
/// source text; it exceeds 100 under overlap and can fall short when
/// token-mode rendering is lossy, so treat it as approximate.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChunkStats {
    pub total_chunks: usize,
    pub total_characters: usize,
    pub total_units: usize,
    pub avg_chunk_length: f64,
    pub avg_units_per_chunk: f64,
    pub coverage_percentage: f64,
}

impl ChunkStats {
    /// Empty collections report explicit zeros rather than NaN.
    pub fn compute(chunks: &[Chunk], total_units: usize, source_chars: usize) -> Self {
        let total_chunks = chunks.len();
        let char_sum: usize = chunks.iter().map(|chunk| chunk.length).sum();
        let unit_sum: usize = chunks.iter().map(|chunk| chunk.unit_count).sum();

        let avg_chunk_length = if total_chunks == 0 {
            0.0
        } else {
            char_sum as f64 / total_chunks as f64
        };
        let avg_units_per_chunk = if total_chunks == 0 {
            0.0
        } else {
            unit_sum as f64 / total_chunks as f64
        };
        let coverage_percentage = if source_chars == 0 {
            0.0
        } else {
            char_sum as f64 / source_chars as f64 * 100.0
        };

        Self {
            total_chunks,
            total_characters: source_chars,
            total_units,
            avg_chunk_length,
            avg_units_per_chunk,
            coverage_percentage,
        }
    }
}

/// Ordered chunks plus their aggregate statistics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkSet {
    pub chunks: Vec<Chunk>,
    pub stats: ChunkStats,
}

/// Slide a window of `chunk_size` units across `units`, stepping by
/// `max(chunk_size - overlap, 1)`. The floor of 1 guarantees forward
/// progress even when `overlap >= chunk_size`, so the walk always
/// terminates. Emits chunks in increasing index order starting at 1.
pub fn window<T, F>(
    units: &[T],
    chunk_size: usize,
    overlap: usize,
    mut render: F,
) -> Result<Vec<Chunk>, Error>
where
    F: FnMut(&[T]) -> Result<String, Error>,
{
    if chunk_size == 0 {
        return Err(Error::invalid_argument("chunk_size must be positive"));
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < units.len() {
        let end = (start + chunk_size).min(units.len());
        let content = render(&units[start..end])?;
        chunks.push(Chunk {
            index: chunks.len() + 1,
            length: content.chars().count(),
            unit_count: end - start,
            start_offset: start,
            end_offset: end - 1,
            word_count: content.split_whitespace().count(),
            content,
        });
        start += step;
    }

    Ok(chunks)
}

/// Character-mode convenience: windows over the text's characters with
/// identity rendering, statistics included.
pub fn chunk_chars(text: &str, chunk_size: usize, overlap: usize) -> Result<ChunkSet, Error> {
    let chars: Vec<char> = text.chars().collect();
    let chunks = window(&chars, chunk_size, overlap, |range| {
        Ok(range.iter().collect())
    })?;
    let stats = ChunkStats::compute(&chunks, chars.len(), chars.len());
    Ok(ChunkSet { chunks, stats })
}
