//! String similarity used for column inference
//!
//! Two measures are provided:
//! - [`phrase_similarity`] scores a whole query phrase against a column name
//!   (contiguous token match, token overlap, sequence ratio).
//! - [`token_similarity`] scores a single word against a column name with
//!   normalized Levenshtein distance, which tolerates typos.

use ahash::AHashSet;
use strsim::normalized_levenshtein;

/// Split text into lowercase alphanumeric runs.
///
/// `_` separates tokens, so `deployment_status` yields
/// `["deployment", "status"]`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Calculate similarity between a query phrase and a column name (0.0-1.0)
///
/// Uses a multi-stage approach:
/// 1. Column tokens appear contiguously in the phrase → 1.0
/// 2. Token overlap relative to the column's tokens → 0.0-1.0
/// 3. Sequence similarity, blended with the overlap
pub fn phrase_similarity(phrase: &str, column: &str) -> f64 {
    let input_tokens = tokenize(phrase);
    let pattern_tokens = tokenize(column);

    if pattern_tokens.is_empty() || input_tokens.is_empty() {
        return 0.0;
    }

    // Fast path: the column name is spelled out in the phrase
    if input_tokens
        .windows(pattern_tokens.len())
        .any(|w| w == pattern_tokens.as_slice())
    {
        return 1.0;
    }

    let input_set: AHashSet<&str> = input_tokens.iter().map(String::as_str).collect();
    let pattern_set: AHashSet<&str> = pattern_tokens.iter().map(String::as_str).collect();

    let token_overlap =
        input_set.intersection(&pattern_set).count() as f64 / pattern_set.len() as f64;

    // Early exit if token overlap is too low
    if token_overlap < 0.3 {
        return token_overlap * 0.6;
    }

    let sequence_similarity =
        sequence_ratio(&input_tokens.join(" "), &pattern_tokens.join(" "));

    (token_overlap * 0.6) + (sequence_similarity * 0.4)
}

/// Similarity of one query token to a column name (0.0-1.0)
///
/// The column is compared in its space-separated display form, so
/// `"department"` vs `department` is 1.0 and `"departmnt"` is 0.9.
pub fn token_similarity(token: &str, column: &str) -> f64 {
    let display = tokenize(column).join(" ");
    normalized_levenshtein(&token.to_lowercase(), &display)
}

/// Calculate sequence similarity ratio (similar to difflib.SequenceMatcher.ratio)
///
/// Uses longest common subsequence instead of full Ratcliff-Obershelp.
pub fn sequence_ratio(s1: &str, s2: &str) -> f64 {
    if s1.is_empty() && s2.is_empty() {
        return 1.0;
    }
    if s1.is_empty() || s2.is_empty() {
        return 0.0;
    }

    let lcs_len = longest_common_subsequence(s1, s2);
    let total_len = s1.chars().count() + s2.chars().count();

    (2.0 * lcs_len as f64) / total_len as f64
}

/// Calculate length of longest common subsequence (LCS)
fn longest_common_subsequence(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    let n = s2_chars.len();

    // Two rolling rows instead of the full DP matrix
    let mut prev = vec![0; n + 1];
    let mut curr = vec![0; n + 1];

    for a in &s1_chars {
        for j in 1..=n {
            if *a == s2_chars[j - 1] {
                curr[j] = prev[j - 1] + 1;
            } else {
                curr[j] = prev[j].max(curr[j - 1]);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}
