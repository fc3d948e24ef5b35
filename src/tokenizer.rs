//! Byte-level BPE encoder/decoder driven by the shared [`RankTable`].

use std::sync::{Arc, OnceLock};

use crate::error::Error;
use crate::vocab::RankTable;

/// Pre-tokenization pattern for o200k-style vocabularies (tiktoken's
/// published data). Splits text into maximal runs of letters, digit groups
/// of up to three, punctuation and whitespace so that merges never cross
/// those boundaries. Needs lookahead, hence `fancy_regex`.
const SEGMENT_PATTERN: &str = concat!(
    r"[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]*[\p{Ll}\p{Lm}\p{Lo}\p{M}]+",
    r"('s|'S|'t|'T|'re|'rE|'Re|'RE|'ve|'vE|'Ve|'VE|'m|'M|'ll|'lL|'Ll|'LL|'d|'D)?",
    r"|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]+[\p{Ll}\p{Lm}\p{Lo}\p{M}]*",
    r"('s|'S|'t|'T|'re|'rE|'Re|'RE|'ve|'vE|'Ve|'VE|'m|'M|'ll|'lL|'Ll|'LL|'d|'D)?",
    r"|\p{N}{1,3}",
    r"| ?[^\s\p{L}\p{N}]+[\r\n/]*",
    r"|\s*[\r\n]+",
    r"|\s+(?!\S)",
    r"|\s+",
);

fn segment_regex() -> &'static fancy_regex::Regex {
    static REGEX: OnceLock<fancy_regex::Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        fancy_regex::Regex::new(SEGMENT_PATTERN).expect("valid segmentation pattern")
    })
}

/// Stateless byte-pair encoder over a shared, read-only rank table.
///
/// Encoding is greedy and rank-ordered: within each segment the adjacent
/// pair whose merged byte sequence carries the globally lowest rank is
/// collapsed first, repeated until no adjacent pair is in the table. Token
/// ids are stable for a given table.
#[derive(Clone)]
pub struct Tokenizer {
    table: Arc<RankTable>,
}

impl Tokenizer {
    pub fn new(table: Arc<RankTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<RankTable> {
        &self.table
    }

    /// Encode arbitrary text into token ids. Accepts any Unicode input;
    /// the empty string yields an empty sequence. Only a defective
    /// vocabulary (one missing a required single byte) can make this fail.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>, Error> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for segment in segment_regex().find_iter(text) {
            let segment = segment.map_err(|err| Error::Encode {
                reason: format!("segmentation failed: {err}"),
            })?;
            self.encode_segment(segment.as_str().as_bytes(), &mut ids)?;
        }
        Ok(ids)
    }

    /// Decode token ids back into text. Unknown ids are an error; the byte
    /// sequences are concatenated first and UTF-8 interpretation happens on
    /// the full buffer, because a token may end mid-codepoint.
    pub fn decode(&self, ids: &[u32]) -> Result<String, Error> {
        let mut bytes = Vec::new();
        for &id in ids {
            let piece = self.table.bytes_of(id).ok_or_else(|| Error::Decode {
                reason: format!("token id {id} is not in the vocabulary"),
            })?;
            bytes.extend_from_slice(piece);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Lossy textual form of a single token, used for per-token report
    /// rows. Not guaranteed to be valid UTF-8 on its own.
    pub fn piece(&self, id: u32) -> Result<String, Error> {
        let bytes = self.table.bytes_of(id).ok_or_else(|| Error::Decode {
            reason: format!("token id {id} is not in the vocabulary"),
        })?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn encode_segment(&self, piece: &[u8], out: &mut Vec<u32>) -> Result<(), Error> {
        if piece.is_empty() {
            return Ok(());
        }
        if piece.len() == 1 {
            out.push(self.single_byte_id(piece)?);
            return Ok(());
        }

        // Track byte ranges into `piece` instead of owned sub-vectors.
        let mut parts: Vec<(usize, usize)> = (0..piece.len()).map(|i| (i, i + 1)).collect();
        let mut merge_buf = Vec::with_capacity(piece.len());

        while parts.len() > 1 {
            let mut best_rank = u32::MAX;
            let mut best_idx = 0;

            for i in 0..parts.len() - 1 {
                merge_buf.clear();
                merge_buf.extend_from_slice(&piece[parts[i].0..parts[i].1]);
                merge_buf.extend_from_slice(&piece[parts[i + 1].0..parts[i + 1].1]);
                if let Some(rank) = self.table.rank_of(&merge_buf) {
                    if rank < best_rank {
                        best_rank = rank;
                        best_idx = i;
                    }
                }
            }

            if best_rank == u32::MAX {
                break;
            }

            parts[best_idx].1 = parts[best_idx + 1].1;
            parts.remove(best_idx + 1);
        }

        for &(start, end) in &parts {
            let bytes = &piece[start..end];
            let id = self.table.rank_of(bytes).ok_or_else(|| Error::Encode {
                reason: format!("byte sequence {bytes:?} is not in the vocabulary"),
            })?;
            out.push(id);
        }
        Ok(())
    }

    fn single_byte_id(&self, byte: &[u8]) -> Result<u32, Error> {
        self.table.rank_of(byte).ok_or_else(|| Error::Encode {
            reason: format!("byte {:#04x} is not in the vocabulary", byte[0]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab;

    /// Toy table covering every single byte plus a few multi-byte merges.
    fn toy_table(merges: &[(&[u8], u32)]) -> Arc<RankTable> {
        let mut pairs: Vec<(Vec<u8>, u32)> =
            (0u32..256).map(|b| (vec![b as u8], b)).collect();
        for &(bytes, rank) in merges {
            pairs.push((bytes.to_vec(), rank));
        }
        Arc::new(RankTable::from_pairs(pairs, "toy"))
    }

    #[test]
    fn empty_input_yields_empty_sequence() {
        let tokenizer = Tokenizer::new(toy_table(&[]));
        assert_eq!(tokenizer.encode("").unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn unmergeable_text_falls_back_to_single_bytes() {
        let tokenizer = Tokenizer::new(toy_table(&[]));
        let ids = tokenizer.encode("cat").unwrap();
        assert_eq!(ids, vec![b'c' as u32, b'a' as u32, b't' as u32]);
    }

    #[test]
    fn merges_follow_rank_priority() {
        // "he" outranks "th", so "the" collapses to [t, he] first and then
        // to the full "the" merge.
        let table = toy_table(&[(b"he", 300), (b"th", 310), (b"the", 320)]);
        let tokenizer = Tokenizer::new(table);
        let ids = tokenizer.encode("the").unwrap();
        assert_eq!(ids, vec![320]);
    }

    #[test]
    fn stops_when_no_pair_is_ranked() {
        let table = toy_table(&[(b"he", 300)]);
        let tokenizer = Tokenizer::new(table);
        let ids = tokenizer.encode("hen").unwrap();
        assert_eq!(ids, vec![300, b'n' as u32]);
    }

    #[test]
    fn segmentation_keeps_words_and_spaces_apart() {
        // A merge spanning the word/space boundary must never fire because
        // pre-tokenization splits " cat" into its own segment.
        let table = toy_table(&[(b"t ", 300)]);
        let tokenizer = Tokenizer::new(table);
        let ids = tokenizer.encode("cat cat").unwrap();
        assert!(!ids.contains(&300));
    }

    #[test]
    fn round_trips_unicode_text() {
        let tokenizer = Tokenizer::new(toy_table(&[(b"he", 300), (b"ll", 301)]));
        for text in ["hello world", "naïve café ☕", "  spaced\n\nout  ", "123 4567"] {
            let ids = tokenizer.encode(text).unwrap();
            assert_eq!(tokenizer.decode(&ids).unwrap(), text);
        }
    }

    #[test]
    fn decode_rejects_unknown_ids() {
        let tokenizer = Tokenizer::new(toy_table(&[]));
        let err = tokenizer.decode(&[9999]).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn decode_joins_bytes_before_utf8_interpretation() {
        // "é" is two UTF-8 bytes; split across two tokens each half is
        // invalid on its own but the pair decodes cleanly.
        let tokenizer = Tokenizer::new(toy_table(&[]));
        let ids = tokenizer.encode("é").unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(tokenizer.decode(&ids).unwrap(), "é");
    }

    #[test]
    fn encoding_is_deterministic() {
        let table = toy_table(&[(b"he", 300), (b"th", 310)]);
        let tokenizer = Tokenizer::new(table);
        let first = tokenizer.encode("the theme").unwrap();
        let second = tokenizer.encode("the theme").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn shared_table_is_installed_once() {
        let table = toy_table(&[]);
        let installed = vocab::install(table.clone());
        let again = vocab::install(toy_table(&[(b"zz", 999)]));
        assert_eq!(installed.len(), again.len());
        assert!(vocab::shared().is_some());
    }
}
