//! Session context - the loaded data plus everything needed to answer a query
//!
//! A session owns the current table (or document text), the rule table, the
//! chat history and the interaction log. Loading replaces the data as a
//! whole, so a query always sees one consistent table. Every query produces
//! a [`ResultEnvelope`]; failures become explanatory text instead of errors.

use crate::config::EngineConfig;
use crate::error::{QueryError, Result};
use crate::executor::{matching_rows, QueryExecutor};
use crate::interaction_log::InteractionLog;
use crate::loader::{load_bytes, Loaded};
use crate::matcher::IntentMatcher;
use crate::narrative::{NarrativeService, OpenAiClient};
use crate::rules::RuleSet;
use crate::schema::normalize_table;
use crate::store::{SqliteTableStore, TableStore};
use crate::table::Table;
use crate::types::{ChatTurn, MatchOutcome, Operation, ResultEnvelope};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub const FALLBACK_RESPONSE: &str = "Sorry, I couldn't understand that question. \
Try asking about training, deployment, or departments.";

pub const NO_DATA_RESPONSE: &str = "No data loaded yet. Please load a talent file first.";

/// Data currently backing the session
#[derive(Debug, Clone)]
enum SessionData {
    Empty,
    Table(Arc<Table>),
    /// Extracted text of a PDF, DOCX or plain-text upload
    Document(Arc<String>),
}

/// One headline count for the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardMetric {
    pub rule_id: String,
    pub label: String,
    pub count: usize,
}

pub struct Session {
    data: SessionData,
    history: Vec<ChatTurn>,
    history_turns: usize,
    log: InteractionLog,
    matcher: IntentMatcher,
    executor: QueryExecutor,
    narrator: Box<dyn NarrativeService>,
    store: Option<Box<dyn TableStore>>,
}

impl Session {
    pub fn new(
        config: &EngineConfig,
        rules: RuleSet,
        narrator: Box<dyn NarrativeService>,
        log: InteractionLog,
    ) -> Self {
        Self {
            data: SessionData::Empty,
            history: Vec::new(),
            history_turns: config.history_turns,
            log,
            matcher: IntentMatcher::new(rules),
            executor: QueryExecutor::from_config(config),
            narrator,
            store: None,
        }
    }

    /// Session with everything taken from the config and environment.
    ///
    /// Fails when the API key is missing, the rule file is invalid or the
    /// store cannot be opened.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;

        let rules = match &config.rules_path {
            Some(path) => RuleSet::from_file(path)?,
            None => RuleSet::default(),
        };
        let narrator = OpenAiClient::from_env(config.narrative.clone())?;
        info!("narrative service model: {}", narrator.model());

        let log = match &config.log_path {
            Some(path) => InteractionLog::with_file(path),
            None => InteractionLog::in_memory(),
        };

        let mut session = Self::new(config, rules, Box::new(narrator), log);
        if let Some(path) = &config.store_path {
            session = session.with_store(Box::new(SqliteTableStore::open(path)?));
        }
        Ok(session)
    }

    /// Mirror every successfully loaded table into `store`.
    pub fn with_store(mut self, store: Box<dyn TableStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn table(&self) -> Option<Arc<Table>> {
        match &self.data {
            SessionData::Table(t) => Some(Arc::clone(t)),
            _ => None,
        }
    }

    pub fn document(&self) -> Option<Arc<String>> {
        match &self.data {
            SessionData::Document(d) => Some(Arc::clone(d)),
            _ => None,
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn log(&self) -> &InteractionLog {
        &self.log
    }

    pub fn rules(&self) -> &RuleSet {
        self.matcher.rules()
    }

    /// Replace the current data with `table` after normalizing its headers.
    ///
    /// On a schema conflict the previous data is kept. A store failure is
    /// logged but does not undo the load.
    pub fn load_table(&mut self, table: Table) -> Result<()> {
        let table = normalize_table(table)?;

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&table) {
                warn!("failed to persist table: {}", e);
            }
        }

        info!(
            "session table replaced: {} rows, {} columns",
            table.row_count(),
            table.width()
        );
        self.data = SessionData::Table(Arc::new(table));
        Ok(())
    }

    /// Load an uploaded file. Any failure leaves the previous data in place.
    pub fn load_file(&mut self, file_name: &str, bytes: &[u8]) -> Result<()> {
        match load_bytes(file_name, bytes)? {
            Loaded::Table(table) => self.load_table(table),
            Loaded::Document(text) => {
                if text.trim().is_empty() {
                    return Err(QueryError::Load(format!("no text found in {}", file_name)));
                }
                self.data = SessionData::Document(Arc::new(text));
                Ok(())
            }
        }
    }

    /// Reload the persisted table, if the store has one.
    pub fn restore_from_store(&mut self) -> Result<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        if !store.exists()? {
            return Ok(false);
        }

        let table = normalize_table(store.load()?)?;
        info!("restored {} rows from store", table.row_count());
        self.data = SessionData::Table(Arc::new(table));
        Ok(true)
    }

    /// Answer one query.
    ///
    /// Never fails: errors become explanatory text. Every call appends one
    /// interaction record and one user/assistant pair to the history.
    pub fn ask(&mut self, query: &str) -> ResultEnvelope {
        let query = query.trim();

        let (intent, result) = self.dispatch(query);
        let mut envelope = result.unwrap_or_else(|e| {
            warn!("query {:?} failed: {}", query, e);
            ResultEnvelope::text(error_response(&e))
        });
        if envelope.intent.is_none() {
            envelope.intent = intent;
        }

        let response = envelope.response_text();
        self.log.append(query, &response);
        self.remember(query, &response);
        envelope
    }

    fn dispatch(&self, query: &str) -> (Option<String>, Result<ResultEnvelope>) {
        match &self.data {
            SessionData::Empty => (None, Ok(ResultEnvelope::text(NO_DATA_RESPONSE))),
            SessionData::Document(text) => (
                None,
                self.executor
                    .narrate_document(query, text, self.narrator.as_ref(), &self.history),
            ),
            SessionData::Table(table) => {
                match self.matcher.match_intent(query, &table.column_names()) {
                    MatchOutcome::NoMatch => (None, Err(QueryError::NoIntentMatch)),
                    MatchOutcome::Matched(matched) => {
                        let result = self.executor.execute(
                            &matched,
                            table,
                            self.narrator.as_ref(),
                            &self.history,
                        );
                        (Some(matched.rule.id), result)
                    }
                }
            }
        }
    }

    fn remember(&mut self, query: &str, response: &str) {
        self.history.push(ChatTurn::user(query));
        self.history.push(ChatTurn::assistant(response));
        let excess = self.history.len().saturating_sub(self.history_turns);
        self.history.drain(..excess);
    }

    /// Headline counts: one per filter rule with a fixed value whose column
    /// exists in the current table.
    pub fn dashboard(&self) -> Vec<DashboardMetric> {
        let Some(table) = self.table() else {
            return Vec::new();
        };

        self.rules()
            .rules()
            .iter()
            .filter(|r| r.operation == Operation::FilterCount)
            .filter_map(|rule| {
                let value = rule.required_value.as_ref()?;
                let column = table.column(rule.target_columns.first()?)?;
                let count = matching_rows(column, value).len();
                Some(DashboardMetric {
                    rule_id: rule.id.clone(),
                    label: rule.label.clone(),
                    count,
                })
            })
            .collect()
    }

    /// Full interaction log text
    pub fn chat_log(&self) -> Result<String> {
        self.log.read_all()
    }
}

/// User-facing text for a failed query
pub fn error_response(error: &QueryError) -> String {
    match error {
        QueryError::NoIntentMatch => FALLBACK_RESPONSE.to_string(),
        QueryError::EntityNotFound { entity } => {
            format!("{} was not found in the loaded data.", entity)
        }
        QueryError::ColumnUnresolved => "Could not determine which column the question \
refers to. Try naming a column, e.g. \"pie chart of department\"."
            .to_string(),
        QueryError::Service(e) => e.to_string(),
        other => format!("Something went wrong: {}", other),
    }
}
