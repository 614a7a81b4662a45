//! Column aggregation: value counts and per-column summary statistics

use crate::table::{Column, ColumnKind, Value};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Distinct-value count above which a text column is summarized by its top
/// values only
pub const HIGH_CARDINALITY_THRESHOLD: usize = 50;
/// Values listed for a high-cardinality column
pub const HIGH_CARDINALITY_TOP: usize = 5;

/// Count distinct values of a column.
///
/// Ordered by descending count; ties keep first-seen order. Missing cells are
/// not counted.
pub fn value_counts(column: &Column) -> Vec<(String, usize)> {
    let mut index: AHashMap<String, usize> = AHashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for value in &column.values {
        if value.is_missing() {
            continue;
        }
        let key = value.to_string().trim().to_string();
        match index.get(&key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSummary {
    Numeric {
        name: String,
        min: Option<f64>,
        max: Option<f64>,
        mean: Option<f64>,
        non_null: usize,
    },
    Categorical {
        name: String,
        distinct: usize,
        high_cardinality: bool,
        /// All counts, or only the top few when `high_cardinality`
        counts: Vec<(String, usize)>,
    },
}

impl ColumnSummary {
    pub fn of(column: &Column) -> Self {
        match column.kind {
            ColumnKind::Number => numeric_summary(column),
            ColumnKind::Text => categorical_summary(column),
        }
    }
}

fn numeric_summary(column: &Column) -> ColumnSummary {
    let numbers: Vec<f64> = column.values.iter().filter_map(Value::as_number).collect();
    let non_null = numbers.len();

    let min = numbers.iter().copied().reduce(f64::min);
    let max = numbers.iter().copied().reduce(f64::max);
    let mean = if non_null > 0 {
        Some(numbers.iter().sum::<f64>() / non_null as f64)
    } else {
        None
    };

    ColumnSummary::Numeric {
        name: column.name.clone(),
        min,
        max,
        mean,
        non_null,
    }
}

fn categorical_summary(column: &Column) -> ColumnSummary {
    let mut counts = value_counts(column);
    let distinct = counts.len();
    let high_cardinality = distinct > HIGH_CARDINALITY_THRESHOLD;
    if high_cardinality {
        counts.truncate(HIGH_CARDINALITY_TOP);
    }

    ColumnSummary::Categorical {
        name: column.name.clone(),
        distinct,
        high_cardinality,
        counts,
    }
}

impl fmt::Display for ColumnSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSummary::Numeric {
                name,
                min,
                max,
                mean,
                non_null,
            } => {
                let show = |v: &Option<f64>| v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "n/a".to_string());
                write!(
                    f,
                    "- {} (numeric): min={}, max={}, mean={}, non-null={}",
                    name,
                    show(min),
                    show(max),
                    show(mean),
                    non_null
                )
            }
            ColumnSummary::Categorical {
                name,
                distinct,
                high_cardinality,
                counts,
            } => {
                let listed: Vec<String> = counts.iter().map(|(v, c)| format!("{}: {}", v, c)).collect();
                if *high_cardinality {
                    write!(
                        f,
                        "- {} (categorical, high cardinality, {} distinct): top {}",
                        name,
                        distinct,
                        listed.join(", ")
                    )
                } else {
                    write!(f, "- {} (categorical): {}", name, listed.join(", "))
                }
            }
        }
    }
}
