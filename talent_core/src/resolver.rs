//! Fuzzy column resolver - infers which column a question refers to

use crate::similarity::{phrase_similarity, token_similarity, tokenize};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum phrase-level score for a whole-query match
pub const PHRASE_THRESHOLD: f64 = 0.3;
/// Minimum per-token score; stricter because single words collide
pub const TOKEN_THRESHOLD: f64 = 0.6;

/// Which pass produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPass {
    Phrase,
    Token,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnResolution {
    pub column: String,
    pub score: f64,
    pub pass: ResolutionPass,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnResolver {
    pub phrase_threshold: f64,
    pub token_threshold: f64,
}

impl Default for ColumnResolver {
    fn default() -> Self {
        Self {
            phrase_threshold: PHRASE_THRESHOLD,
            token_threshold: TOKEN_THRESHOLD,
        }
    }
}

impl ColumnResolver {
    pub fn new(phrase_threshold: f64, token_threshold: f64) -> Self {
        Self {
            phrase_threshold,
            token_threshold,
        }
    }

    /// Best matching column for the query, or `None` if nothing clears the
    /// thresholds. Thresholds are inclusive; ties go to the earlier column.
    pub fn resolve<S: AsRef<str>>(&self, query: &str, columns: &[S]) -> Option<String> {
        self.resolve_scored(query, columns).map(|r| r.column)
    }

    /// Like [`resolve`](Self::resolve) but also reports score and pass.
    pub fn resolve_scored<S: AsRef<str>>(
        &self,
        query: &str,
        columns: &[S],
    ) -> Option<ColumnResolution> {
        let tokens = tokenize(query);
        if tokens.is_empty() || columns.is_empty() {
            return None;
        }

        let phrase = tokens.join(" ");
        if let Some((column, score)) = best_match(columns, |c| phrase_similarity(&phrase, c)) {
            if score >= self.phrase_threshold {
                debug!("phrase match {:?} -> {} ({:.3})", phrase, column, score);
                return Some(ColumnResolution {
                    column: column.to_string(),
                    score,
                    pass: ResolutionPass::Phrase,
                });
            }
        }

        for token in &tokens {
            if let Some((column, score)) = best_match(columns, |c| token_similarity(token, c)) {
                if score >= self.token_threshold {
                    debug!("token match {:?} -> {} ({:.3})", token, column, score);
                    return Some(ColumnResolution {
                        column: column.to_string(),
                        score,
                        pass: ResolutionPass::Token,
                    });
                }
            }
        }

        debug!("no column resolved for {:?}", phrase);
        None
    }
}

fn best_match<'a, S, F>(columns: &'a [S], score: F) -> Option<(&'a str, f64)>
where
    S: AsRef<str>,
    F: Fn(&str) -> f64,
{
    let mut best: Option<(&str, f64)> = None;
    for column in columns {
        let column = column.as_ref();
        let s = score(column);
        // Strict comparison keeps the first column on ties
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((column, s));
        }
    }
    best
}
