//! Merge-rank vocabulary shared by every tokenizer instance.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::Error;

/// Immutable mapping from merged byte sequences to merge-priority ranks.
///
/// Lower rank means higher merge priority, and the rank doubles as the
/// token id (the tiktoken convention). The table is loaded once at process
/// start and shared read-only across requests, so no locking is needed.
#[derive(Debug)]
pub struct RankTable {
    ranks: HashMap<Vec<u8>, u32>,
    decoder: HashMap<u32, Vec<u8>>,
    label: String,
}

impl RankTable {
    /// Parse the tiktoken text format: one `<base64 bytes> <rank>` pair per
    /// line, blank lines skipped. Corruption is a fatal startup error.
    pub fn parse(data: &str, label: impl Into<String>) -> Result<Self, Error> {
        let mut ranks = HashMap::new();
        let mut decoder = HashMap::new();

        for (line_no, line) in data.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_ascii_whitespace();
            let (token, rank) = match (fields.next(), fields.next(), fields.next()) {
                (Some(token), Some(rank), None) => (token, rank),
                _ => {
                    return Err(Error::Encode {
                        reason: format!("malformed vocabulary line {}", line_no + 1),
                    })
                }
            };
            let bytes = BASE64.decode(token).map_err(|err| Error::Encode {
                reason: format!("vocabulary line {}: {err}", line_no + 1),
            })?;
            let rank: u32 = rank.parse().map_err(|err| Error::Encode {
                reason: format!("vocabulary line {}: {err}", line_no + 1),
            })?;
            if decoder.insert(rank, bytes.clone()).is_some() {
                return Err(Error::Encode {
                    reason: format!("duplicate rank {rank} in vocabulary"),
                });
            }
            ranks.insert(bytes, rank);
        }

        if ranks.is_empty() {
            return Err(Error::Encode {
                reason: "vocabulary contains no entries".to_string(),
            });
        }

        Ok(Self {
            ranks,
            decoder,
            label: label.into(),
        })
    }

    /// Load a rank table from disk. Absence or corruption of the file is
    /// fatal at startup, never a per-request error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|err| Error::Encode {
            reason: format!("failed to read {}: {err}", path.display()),
        })?;
        let label = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("vocabulary")
            .to_string();
        Self::parse(&data, label)
    }

    /// Build a table from in-memory pairs. Used by tests and toy setups.
    pub fn from_pairs<I>(pairs: I, label: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (Vec<u8>, u32)>,
    {
        let mut ranks = HashMap::new();
        let mut decoder = HashMap::new();
        for (bytes, rank) in pairs {
            decoder.insert(rank, bytes.clone());
            ranks.insert(bytes, rank);
        }
        Self {
            ranks,
            decoder,
            label: label.into(),
        }
    }

    pub fn rank_of(&self, bytes: &[u8]) -> Option<u32> {
        self.ranks.get(bytes).copied()
    }

    pub fn bytes_of(&self, id: u32) -> Option<&[u8]> {
        self.decoder.get(&id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// Human-readable vocabulary label, reported in tokenization payloads.
    pub fn label(&self) -> &str {
        &self.label
    }
}

static SHARED: OnceLock<Arc<RankTable>> = OnceLock::new();

/// Install the process-wide rank table. The first call wins; later calls
/// return the table that is already installed.
pub fn install(table: Arc<RankTable>) -> Arc<RankTable> {
    SHARED.get_or_init(|| table).clone()
}

/// The process-wide rank table, if one has been installed.
pub fn shared() -> Option<Arc<RankTable>> {
    SHARED.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base64_rank_lines() {
        let data = "YQ== 0\nYg== 1\nYWI= 2\n";
        let table = RankTable::parse(data, "toy").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rank_of(b"a"), Some(0));
        assert_eq!(table.rank_of(b"ab"), Some(2));
        assert_eq!(table.bytes_of(1), Some(b"b".as_slice()));
    }

    #[test]
    fn skips_blank_lines() {
        let data = "YQ== 0\n\nYg== 1\n";
        let table = RankTable::parse(data, "toy").unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn rejects_malformed_lines() {
        let err = RankTable::parse("YQ==\n", "toy").unwrap_err();
        assert!(matches!(err, Error::Encode { .. }));

        let err = RankTable::parse("not-base64! 0\n", "toy").unwrap_err();
        assert!(matches!(err, Error::Encode { .. }));

        let err = RankTable::parse("YQ== zero\n", "toy").unwrap_err();
        assert!(matches!(err, Error::Encode { .. }));
    }

    #[test]
    fn rejects_duplicate_ranks() {
        let err = RankTable::parse("YQ== 0\nYg== 0\n", "toy").unwrap_err();
        assert!(matches!(err, Error::Encode { .. }));
    }

    #[test]
    fn rejects_empty_vocabulary() {
        let err = RankTable::parse("\n\n", "toy").unwrap_err();
        assert!(matches!(err, Error::Encode { .. }));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = RankTable::load("/definitely/not/here.tiktoken").unwrap_err();
        assert!(matches!(err, Error::Encode { .. }));
    }
}
