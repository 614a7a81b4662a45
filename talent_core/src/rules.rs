//! Prioritized intent rule table
//!
//! Rules are evaluated in order and the first match wins, so more specific
//! phrases must come before general ones ("not deployed" before "deployed").
//! The table is fixed once a session starts; a JSON file with the same shape
//! as [`IntentRule`] can replace the built-in defaults.

use crate::error::{QueryError, Result};
use crate::schema::normalize_header;
use crate::types::{ChartKind, IntentRule, Operation};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<IntentRule>,
}

impl RuleSet {
    /// Build a rule set, normalizing trigger phrases and column names.
    pub fn new(rules: Vec<IntentRule>) -> Result<Self> {
        let mut normalized = Vec::with_capacity(rules.len());
        for mut rule in rules {
            if rule.trigger_phrases.iter().all(|t| t.trim().is_empty()) {
                return Err(QueryError::Config(format!(
                    "rule {:?} has no trigger phrases",
                    rule.id
                )));
            }
            if normalized.iter().any(|r: &IntentRule| r.id == rule.id) {
                return Err(QueryError::Config(format!("duplicate rule id {:?}", rule.id)));
            }

            rule.trigger_phrases = clean_phrases(rule.trigger_phrases);
            rule.synonyms = clean_phrases(rule.synonyms);
            rule.target_columns = rule.target_columns.iter().map(|c| normalize_header(c)).collect();
            rule.projection = rule
                .projection
                .map(|cols| cols.iter().map(|c| normalize_header(c)).collect());
            rule.required_value = rule.required_value.map(|v| v.trim().to_lowercase());
            normalized.push(rule);
        }
        Ok(Self { rules: normalized })
    }

    /// Load rules from a JSON array of rule records.
    pub fn from_json(json: &str) -> Result<Self> {
        let rules: Vec<IntentRule> = serde_json::from_str(json)?;
        Self::new(rules)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let set = Self::from_json(&json)?;
        info!("loaded {} intent rules from {}", set.len(), path.display());
        Ok(set)
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&IntentRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        // Built-in rules are already in normalized form
        Self {
            rules: default_rules(),
        }
    }
}

fn clean_phrases(phrases: Vec<String>) -> Vec<String> {
    phrases
        .into_iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// The talent dashboard's built-in intents, in priority order.
pub fn default_rules() -> Vec<IntentRule> {
    use Operation::*;

    vec![
        IntentRule::new("on_bench", "on bench", FilterCount, &["on bench"])
            .with_synonyms(&["not deployed", "idle", "sitting free"])
            .with_targets(&["deployment_status"])
            .with_value("on bench"),
        IntentRule::new("deployed", "deployed in project", FilterCount, &["deployed"])
            .with_synonyms(&["in project", "currently deployed"])
            .with_targets(&["deployment_status"])
            .with_value("deployed in project"),
        IntentRule::new("rolling_off", "rolling off", FilterCount, &["rolling off"])
            .with_synonyms(&["exiting project", "getting free soon"])
            .with_targets(&["deployment_status"])
            .with_value("rolling off"),
        IntentRule::new(
            "completed_seer",
            "completed seer training",
            FilterCount,
            &["completed seer"],
        )
        .with_synonyms(&["finished training", "done with seer", "completed training"])
        .with_targets(&["training_status"])
        .with_value("completed seer training"),
        IntentRule::new("not_started", "not started", FilterCount, &["not started"])
            .with_synonyms(&["pending training"])
            .with_targets(&["training_status"])
            .with_value("not started"),
        IntentRule::new(
            "training_in_progress",
            "training in progress",
            FilterCount,
            &["training in progress"],
        )
        .with_synonyms(&["ongoing training", "in training", "started training"])
        .with_targets(&["training_status"])
        .with_value("training in progress"),
        IntentRule::new("department_pie", "department", Chart, &["pie chart of department"])
            .with_synonyms(&["department distribution"])
            .with_targets(&["department"])
            .with_chart_kind(ChartKind::Pie),
        IntentRule::new(
            "training_status_chart",
            "training status",
            Chart,
            &["training status chart"],
        )
        .with_targets(&["training_status"])
        .with_chart_kind(ChartKind::Pie),
        IntentRule::new(
            "deployment_bar",
            "deployment status",
            Chart,
            &["bar chart of deployment"],
        )
        .with_targets(&["deployment_status"])
        .with_chart_kind(ChartKind::Bar),
        IntentRule::new(
            "names_with_department",
            "talent names with departments",
            FilterCount,
            &["talents name with the department"],
        )
        .with_synonyms(&["names with department", "name and department"])
        .with_targets(&["talent_name", "department"])
        .with_projection(&["talent_name", "department"]),
        IntentRule::new("list_all", "all talents", FilterCount, &["list all", "show all"]),
        IntentRule::new("entity_department", "department", EntityLookup, &["department"])
            .with_targets(&["department"])
            .with_template("{entity} is in the {value} department."),
        IntentRule::new("entity_email", "email", EntityLookup, &["email"])
            .with_targets(&["email"])
            .with_template("Email of {entity}: {value}"),
        IntentRule::new("entity_info", "details", EntityLookup, &["info", "details", "profile"]),
        IntentRule::new(
            "chart",
            "chart",
            Chart,
            &["chart", "pie", "bar", "graph", "distribution", "breakdown"],
        ),
        IntentRule::new(
            "narrative",
            "narrative",
            Narrative,
            &[
                "summarize",
                "summarise",
                "summary",
                "insight",
                "analyze",
                "analyse",
                "explain",
                "describe",
                "overview",
                "trend",
            ],
        ),
    ]
}
