//! Query executor - runs a matched intent against the current table
//!
//! Each query is a single pass: no retries and no partial results. The table
//! is only ever read; filtered and projected results are new tables.

use crate::config::EngineConfig;
use crate::error::{QueryError, Result};
use crate::narrative::{
    bounded_history, document_context, system_prompt, table_context, NarrativeService,
};
use crate::resolver::ColumnResolver;
use crate::schema::{normalize_value, NAME_COLUMNS};
use crate::summary::value_counts;
use crate::table::{Column, Table, Value};
use crate::types::{
    ChartKind, ChartSpec, ChatTurn, EntityRef, IntentMatch, IntentRule, Operation, ResultEnvelope,
};
use tracing::{debug, warn};

/// Column used for id-based entity lookups when no name column exists
pub const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutorLimits {
    pub pie_top_n: usize,
    pub bar_top_n: usize,
    pub prompt_char_budget: usize,
    pub preview_rows: usize,
    pub history_turns: usize,
}

impl Default for ExecutorLimits {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ExecutorLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            pie_top_n: config.pie_top_n,
            bar_top_n: config.bar_top_n,
            prompt_char_budget: config.prompt_char_budget,
            preview_rows: config.preview_rows,
            history_turns: config.history_turns,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryExecutor {
    pub resolver: ColumnResolver,
    pub limits: ExecutorLimits,
}

impl QueryExecutor {
    pub fn new(resolver: ColumnResolver, limits: ExecutorLimits) -> Self {
        Self { resolver, limits }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            ColumnResolver::new(config.phrase_threshold, config.token_threshold),
            ExecutorLimits::from(config),
        )
    }

    /// Dispatch a matched intent to its operation.
    pub fn execute(
        &self,
        matched: &IntentMatch,
        table: &Table,
        narrator: &dyn NarrativeService,
        history: &[ChatTurn],
    ) -> Result<ResultEnvelope> {
        let rule = &matched.rule;
        let envelope = match rule.operation {
            Operation::FilterCount => self.filter_count(rule, table)?,
            Operation::EntityLookup => {
                let entity = matched
                    .entity
                    .as_ref()
                    .ok_or(QueryError::NoIntentMatch)?;
                self.entity_lookup(rule, entity, table)?
            }
            Operation::Chart => self.chart(rule, &matched.original_input, table)?,
            Operation::Narrative => {
                self.narrate_table(&matched.original_input, table, narrator, history)?
            }
        };
        Ok(envelope.with_intent(&rule.id))
    }

    pub fn filter_count(&self, rule: &IntentRule, table: &Table) -> Result<ResultEnvelope> {
        let rows: Vec<usize> = match &rule.required_value {
            Some(required) => {
                let column = rule
                    .target_columns
                    .first()
                    .and_then(|c| table.column(c))
                    .ok_or(QueryError::ColumnUnresolved)?;
                matching_rows(column, required)
            }
            None => (0..table.row_count()).collect(),
        };

        let selected = table.select_rows(&rows);
        let result = match &rule.projection {
            Some(columns) => selected.project(columns),
            None => selected,
        };

        debug!("{}: {} of {} rows", rule.id, rows.len(), table.row_count());
        Ok(ResultEnvelope {
            narrative_text: Some(format!("{} rows match {}", rows.len(), rule.label)),
            result_table: Some(result),
            ..ResultEnvelope::default()
        })
    }

    pub fn entity_lookup(
        &self,
        rule: &IntentRule,
        entity: &EntityRef,
        table: &Table,
    ) -> Result<ResultEnvelope> {
        let rows = find_entity_rows(table, entity);
        let Some(&row) = rows.first() else {
            return Err(QueryError::EntityNotFound {
                entity: entity.key(),
            });
        };
        if rows.len() > 1 {
            // Duplicate names are not disambiguated; the first row answers
            warn!("{} matches {} rows, using the first", entity.key(), rows.len());
        }

        let Some(field) = rule.target_columns.first() else {
            return Ok(ResultEnvelope {
                narrative_text: Some(format!("Details for {}:", entity.display())),
                result_table: Some(table.select_rows(&[row])),
                ..ResultEnvelope::default()
            });
        };

        let value = table
            .cell(row, field)
            .ok_or(QueryError::ColumnUnresolved)?;
        let text = match value {
            Value::Missing => format!("{} has no {} recorded.", entity.display(), rule.label),
            _ => match &rule.response_template {
                Some(template) => template
                    .replace("{entity}", &entity.display())
                    .replace("{value}", &value.to_string()),
                None => format!("{} {}: {}", entity.display(), rule.label, value),
            },
        };

        Ok(ResultEnvelope::text(text))
    }

    pub fn chart(&self, rule: &IntentRule, query: &str, table: &Table) -> Result<ResultEnvelope> {
        let column_name = match rule.target_columns.first() {
            Some(c) => c.clone(),
            None => self
                .resolver
                .resolve(query, &table.column_names())
                .ok_or(QueryError::ColumnUnresolved)?,
        };
        let column = table
            .column(&column_name)
            .ok_or(QueryError::ColumnUnresolved)?;

        let kind = rule.chart_kind.unwrap_or_else(|| chart_kind_for(query));
        let top_n = match kind {
            ChartKind::Pie => self.limits.pie_top_n,
            ChartKind::Bar => self.limits.bar_top_n,
        };

        let mut counts = value_counts(column);
        counts.truncate(top_n);

        let text = format!("Showing {} chart for {}.", kind.as_str(), column_name);
        Ok(ResultEnvelope {
            narrative_text: Some(text),
            chart_spec: Some(ChartSpec {
                kind,
                column: column_name,
                top_n: Some(top_n),
                value_counts: counts,
            }),
            ..ResultEnvelope::default()
        })
    }

    pub fn narrate_table(
        &self,
        query: &str,
        table: &Table,
        narrator: &dyn NarrativeService,
        history: &[ChatTurn],
    ) -> Result<ResultEnvelope> {
        let context = table_context(
            table,
            self.limits.preview_rows,
            self.limits.prompt_char_budget,
        );
        self.narrate(query, &context, narrator, history)
    }

    pub fn narrate_document(
        &self,
        query: &str,
        text: &str,
        narrator: &dyn NarrativeService,
        history: &[ChatTurn],
    ) -> Result<ResultEnvelope> {
        let context = document_context(text, self.limits.prompt_char_budget);
        self.narrate(query, &context, narrator, history)
    }

    fn narrate(
        &self,
        query: &str,
        context: &str,
        narrator: &dyn NarrativeService,
        history: &[ChatTurn],
    ) -> Result<ResultEnvelope> {
        let history = bounded_history(history, self.limits.history_turns);
        let answer = narrator.complete(&system_prompt(context), history, query)?;
        Ok(ResultEnvelope::text(answer))
    }
}

/// Rows whose cell equals `required` after trimming and lowercasing.
///
/// `required` must already be in that form; missing cells never match.
pub fn matching_rows(column: &Column, required: &str) -> Vec<usize> {
    column
        .values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_missing() && normalize_value(v) == required)
        .map(|(i, _)| i)
        .collect()
}

/// "bar" in the query asks for a bar chart; everything else is a pie
fn chart_kind_for(query: &str) -> ChartKind {
    if query.to_lowercase().contains("bar") {
        ChartKind::Bar
    } else {
        ChartKind::Pie
    }
}

/// Rows naming the entity, via the name column or else the id column
pub fn find_entity_rows(table: &Table, entity: &EntityRef) -> Vec<usize> {
    if let Some(column) = NAME_COLUMNS.iter().find_map(|c| table.column(c)) {
        let key = entity.key();
        return column
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| entity_key(v) == key)
            .map(|(i, _)| i)
            .collect();
    }

    if let Some(column) = table.column(ID_COLUMN) {
        let id = entity.numeric_id.to_string();
        return column
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_missing() && v.to_string().trim() == id)
            .map(|(i, _)| i)
            .collect();
    }

    Vec::new()
}

/// `"Talent 3"` and `" talent_3"` both become `talent_3`
fn entity_key(value: &Value) -> String {
    normalize_value(value)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
