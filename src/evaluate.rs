//! Text-quality scoring over one or more response strings.
//!
//! The formulas are intentionally crude heuristics (the readability grade
//! is a word-per-sentence proxy, not a validated readability formula) and
//! their constants are preserved exactly for reproducibility.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub response_count: usize,
    pub avg_response_length: f64,
    pub total_words: usize,
    pub unique_words: usize,
    pub readability_scores: Vec<ReadabilityScore>,
    /// Present only when ground truths were supplied.
    pub similarity_analysis: Option<Vec<SimilarityScore>>,
    pub overall_score: OverallScore,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReadabilityScore {
    /// 1-based position of the response this row describes.
    pub response_index: usize,
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_words_per_sentence: f64,
    /// `clamp(avg_words_per_sentence - 5, 1, 12)`.
    pub readability_grade: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub response_index: usize,
    /// |intersection| / |union| over case-folded word sets; 0 when the
    /// union is empty.
    pub jaccard_similarity: f64,
    pub common_words: usize,
    pub response_unique_words: usize,
    pub truth_unique_words: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OverallScore {
    pub consistency: f64,
    pub completeness: f64,
    pub relevance: f64,
}

fn sentence_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[.!?]+").expect("valid sentence regex"))
}

/// Score `responses`, optionally against `ground_truths`. Response `i` is
/// paired with truth `i` when present, otherwise with the first truth.
pub fn evaluate(responses: &[String], ground_truths: &[String]) -> Result<EvaluationReport, Error> {
    if responses.is_empty() {
        return Err(Error::invalid_argument("at least one response is required"));
    }

    let response_count = responses.len();
    let char_sum: usize = responses.iter().map(|r| r.chars().count()).sum();
    let avg_response_length = char_sum as f64 / response_count as f64;

    let total_words: usize = responses
        .iter()
        .map(|r| r.split_whitespace().count())
        .sum();
    let unique_words = responses
        .iter()
        .flat_map(|r| r.split_whitespace())
        .collect::<HashSet<_>>()
        .len();

    let readability_scores = responses
        .iter()
        .enumerate()
        .map(|(idx, response)| readability(idx + 1, response))
        .collect();

    let similarity_analysis = if ground_truths.is_empty() {
        None
    } else {
        Some(
            responses
                .iter()
                .enumerate()
                .map(|(idx, response)| {
                    let truth = ground_truths.get(idx).unwrap_or(&ground_truths[0]);
                    similarity(idx + 1, response, truth)
                })
                .collect(),
        )
    };

    let overall_score = overall(responses, ground_truths);

    Ok(EvaluationReport {
        response_count,
        avg_response_length,
        total_words,
        unique_words,
        readability_scores,
        similarity_analysis,
        overall_score,
    })
}

fn readability(response_index: usize, response: &str) -> ReadabilityScore {
    let sentence_count = sentence_regex()
        .split(response)
        .filter(|segment| !segment.trim().is_empty())
        .count();
    let word_count = response.split_whitespace().count();
    let avg_words_per_sentence = word_count as f64 / sentence_count.max(1) as f64;
    ReadabilityScore {
        response_index,
        word_count,
        sentence_count,
        avg_words_per_sentence,
        readability_grade: (avg_words_per_sentence - 5.0).clamp(1.0, 12.0),
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn similarity(response_index: usize, response: &str, truth: &str) -> SimilarityScore {
    let response_words = word_set(response);
    let truth_words = word_set(truth);
    let common_words = response_words.intersection(&truth_words).count();
    let union = response_words.union(&truth_words).count();
    let jaccard_similarity = if union == 0 {
        0.0
    } else {
        common_words as f64 / union as f64
    };
    SimilarityScore {
        response_index,
        jaccard_similarity,
        common_words,
        response_unique_words: response_words.len() - common_words,
        truth_unique_words: truth_words.len() - common_words,
    }
}

fn overall(responses: &[String], ground_truths: &[String]) -> OverallScore {
    let consistency = if responses.len() > 1 {
        let distinct = responses.iter().collect::<HashSet<_>>().len();
        1.0 - distinct as f64 / responses.len() as f64
    } else {
        1.0
    };

    let concatenated: usize = responses.iter().map(|r| r.chars().count()).sum();
    let completeness = (concatenated as f64 / 1000.0).min(1.0);

    let relevance = if ground_truths.is_empty() {
        0.7
    } else {
        let sum: f64 = responses
            .iter()
            .enumerate()
            .map(|(idx, response)| {
                let truth = ground_truths.get(idx).unwrap_or(&ground_truths[0]);
                if !response.is_empty() && !truth.is_empty() {
                    0.8
                } else {
                    0.3
                }
            })
            .sum();
        sum / responses.len() as f64
    };

    OverallScore {
        consistency,
        completeness,
        relevance,
    }
}
