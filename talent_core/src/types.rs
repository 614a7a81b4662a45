//! Core data types for intent rules and query results

use crate::table::Table;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Operation a matched intent dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    FilterCount,
    EntityLookup,
    Chart,
    Narrative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Pie,
    Bar,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Pie => "pie",
            ChartKind::Bar => "bar",
        }
    }
}

/// A declarative intent rule.
///
/// Trigger phrases and synonyms are matched as lowercase substrings of the
/// query. Target columns use normalized header names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRule {
    pub id: String,
    /// Human-readable label used in responses ("on bench")
    pub label: String,
    pub trigger_phrases: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub target_columns: Vec<String>,
    pub operation: Operation,
    #[serde(default)]
    pub required_value: Option<String>,
    #[serde(default)]
    pub projection: Option<Vec<String>>,
    /// Fixed chart kind; `None` means pick from the query wording
    #[serde(default)]
    pub chart_kind: Option<ChartKind>,
    /// Entity lookup response with `{entity}` and `{value}` placeholders
    #[serde(default)]
    pub response_template: Option<String>,
}

impl IntentRule {
    pub fn new(id: &str, label: &str, operation: Operation, triggers: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            trigger_phrases: triggers.iter().map(|t| t.to_string()).collect(),
            synonyms: Vec::new(),
            target_columns: Vec::new(),
            operation,
            required_value: None,
            projection: None,
            chart_kind: None,
            response_template: None,
        }
    }

    pub fn with_synonyms(mut self, synonyms: &[&str]) -> Self {
        self.synonyms = synonyms.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_targets(mut self, targets: &[&str]) -> Self {
        self.target_columns = targets.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.required_value = Some(value.to_string());
        self
    }

    pub fn with_projection(mut self, columns: &[&str]) -> Self {
        self.projection = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_chart_kind(mut self, kind: ChartKind) -> Self {
        self.chart_kind = Some(kind);
        self
    }

    pub fn with_template(mut self, template: &str) -> Self {
        self.response_template = Some(template.to_string());
        self
    }

    /// All phrases that trigger this rule: triggers first, then synonyms
    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.trigger_phrases
            .iter()
            .chain(self.synonyms.iter())
            .map(String::as_str)
    }
}

/// Reference to a single entity parsed from the query ("talent_3")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: String,
    pub numeric_id: u64,
    /// Where the reference sits in the lowercased query
    pub start: usize,
    pub end: usize,
}

impl EntityRef {
    pub fn new(kind: &str, numeric_id: u64, start: usize, end: usize) -> Self {
        Self {
            kind: kind.to_string(),
            numeric_id,
            start,
            end,
        }
    }

    /// Canonical key as stored in name columns: `talent_3`
    pub fn key(&self) -> String {
        format!("{}_{}", self.kind, self.numeric_id)
    }

    /// Display form used in responses: `Talent_3`
    pub fn display(&self) -> String {
        let mut chars = self.kind.chars();
        match chars.next() {
            Some(first) => format!(
                "{}{}_{}",
                first.to_uppercase(),
                chars.as_str(),
                self.numeric_id
            ),
            None => self.numeric_id.to_string(),
        }
    }
}

/// A rule that matched, plus the parameters bound from the query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentMatch {
    pub rule: IntentRule,
    pub trigger: String,
    pub entity: Option<EntityRef>,
    pub original_input: String,
}

impl IntentMatch {
    pub fn new(
        rule: IntentRule,
        trigger: String,
        entity: Option<EntityRef>,
        original_input: String,
    ) -> Self {
        Self {
            rule,
            trigger,
            entity,
            original_input,
        }
    }
}

/// Result of intent matching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatchOutcome {
    #[serde(rename = "match")]
    Matched(IntentMatch),
    #[serde(rename = "none")]
    NoMatch,
}

/// Chart description handed to an external renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub column: String,
    pub top_n: Option<usize>,
    pub value_counts: Vec<(String, usize)>,
}

/// Uniform output of one query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Id of the rule that produced this result, if any matched
    pub intent: Option<String>,
    pub narrative_text: Option<String>,
    pub result_table: Option<Table>,
    pub chart_spec: Option<ChartSpec>,
}

impl ResultEnvelope {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            narrative_text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_intent(mut self, intent: &str) -> Self {
        self.intent = Some(intent.to_string());
        self
    }

    /// Text recorded in the interaction log for this result
    pub fn response_text(&self) -> String {
        match (&self.narrative_text, &self.chart_spec) {
            (Some(text), _) => text.clone(),
            (None, Some(chart)) => format!("Showing {} chart for {}.", chart.kind.as_str(), chart.column),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Local>,
    pub query_text: String,
    pub response_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}
