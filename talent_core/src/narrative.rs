//! Narrative delegation to an external text-completion service
//!
//! The service is opaque: `complete(system_prompt, history, user_prompt)`.
//! This module builds the bounded data context that goes into the system
//! prompt and provides an OpenAI-compatible chat-completions client.

use crate::config::{api_key_from_env, NarrativeConfig};
use crate::error::{QueryError, Result, ServiceError};
use crate::summary::ColumnSummary;
use crate::table::Table;
use crate::types::ChatTurn;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const SYSTEM_INSTRUCTIONS: &str = "You are a talent intelligence assistant. \
Answer the user's question using only the data provided below. \
If the data does not contain the answer, say so plainly.";

/// External text-generation service
pub trait NarrativeService: Send {
    fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        user_prompt: &str,
    ) -> std::result::Result<String, ServiceError>;
}

/// Keep at most `budget` characters from the head of `content`.
pub fn truncate_to_budget(content: &str, budget: usize) -> &str {
    match content.char_indices().nth(budget) {
        Some((byte_idx, _)) => &content[..byte_idx],
        None => content,
    }
}

/// Last `turns` entries of the chat history
pub fn bounded_history(history: &[ChatTurn], turns: usize) -> &[ChatTurn] {
    let start = history.len().saturating_sub(turns);
    &history[start..]
}

/// Preview rows plus per-column summaries, capped at `budget` characters.
pub fn table_context(table: &Table, preview_rows: usize, budget: usize) -> String {
    let mut out = String::new();
    let preview = table.head(preview_rows);

    out.push_str(&format!(
        "Table with {} rows and {} columns.\n\nPreview (first {} rows):\n",
        table.row_count(),
        table.width(),
        preview.row_count()
    ));
    out.push_str(&preview.column_names().join(" | "));
    out.push('\n');
    for row in 0..preview.row_count() {
        let cells: Vec<String> = preview.row(row).iter().map(|v| v.to_string()).collect();
        out.push_str(&cells.join(" | "));
        out.push('\n');
    }

    out.push_str("\nColumn summaries:\n");
    for column in table.columns() {
        out.push_str(&ColumnSummary::of(column).to_string());
        out.push('\n');
    }

    bounded(out, budget)
}

/// Head of extracted document text, capped at `budget` characters.
pub fn document_context(text: &str, budget: usize) -> String {
    let header = "Document text:\n";
    let body_budget = budget.saturating_sub(header.chars().count());
    format!("{}{}", header, truncate_to_budget(text, body_budget))
}

fn bounded(content: String, budget: usize) -> String {
    let kept = truncate_to_budget(&content, budget);
    if kept.len() < content.len() {
        debug!(
            "narrative context truncated to {} of {} chars",
            budget,
            content.chars().count()
        );
        kept.to_string()
    } else {
        content
    }
}

/// Full system prompt for a given data context
pub fn system_prompt(context: &str) -> String {
    format!("{}\n\n{}", SYSTEM_INSTRUCTIONS, context)
}

/// OpenAI-compatible chat-completions client
pub struct OpenAiClient {
    client: reqwest::blocking::Client,
    api_key: String,
    config: NarrativeConfig,
}

impl OpenAiClient {
    pub fn new(api_key: String, config: NarrativeConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QueryError::Config(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Client configured from the environment; fails if no API key is set.
    pub fn from_env(config: NarrativeConfig) -> Result<Self> {
        let api_key = api_key_from_env()?;
        Self::new(api_key, config.with_env_overrides())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl NarrativeService for OpenAiClient {
    fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        user_prompt: &str,
    ) -> std::result::Result<String, ServiceError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(serde_json::json!({"role": "system", "content": system_prompt}));
        for turn in history {
            messages.push(serde_json::json!({"role": turn.role.as_str(), "content": turn.content}));
        }
        messages.push(serde_json::json!({"role": "user", "content": user_prompt}));

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError(format!("request to {} timed out", url))
                } else {
                    ServiceError(format!("failed to reach {}: {}", url, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            warn!("narrative service returned {}", status);
            return Err(ServiceError(format!("http error {}: {}", status, text)));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ServiceError(format!("invalid response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ServiceError("no content in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    #[test]
    fn test_truncate_keeps_head() {
        assert_eq!(truncate_to_budget("abcdef", 3), "abc");
        assert_eq!(truncate_to_budget("abc", 10), "abc");
        // Multi-byte characters are never split
        assert_eq!(truncate_to_budget("héllo", 2), "hé");
    }

    #[test]
    fn test_bounded_history() {
        let history: Vec<ChatTurn> = (0..10).map(|i| ChatTurn::user(i.to_string())).collect();
        let kept = bounded_history(&history, 4);
        assert_eq!(kept.len(), 4);
        assert_eq!(kept[0].content, "6");
        assert_eq!(bounded_history(&history[..2], 4).len(), 2);
    }

    #[test]
    fn test_table_context_contents() {
        let table = Table::new(vec![
            Column::from_raw("department", &["HR", "IT", "HR"]),
            Column::from_raw("age", &["30", "40", "50"]),
        ])
        .unwrap();
        let context = table_context(&table, 2, 18_000);
        assert!(context.contains("3 rows and 2 columns"));
        assert!(context.contains("department | age"));
        assert!(context.contains("HR | 30"));
        assert!(!context.contains("HR | 50"));
        assert!(context.contains("- age (numeric): min=30.00, max=50.00, mean=40.00, non-null=3"));
    }

    #[test]
    fn test_context_respects_budget() {
        let raw: Vec<String> = (0..2000).map(|i| format!("row number {}", i)).collect();
        let table = Table::new(vec![Column::from_raw("notes", &raw)]).unwrap();
        let context = table_context(&table, 2000, 500);
        assert_eq!(context.chars().count(), 500);
        assert!(context.starts_with("Table with 2000 rows"));

        let doc = "x".repeat(50_000);
        let context = document_context(&doc, 18_000);
        assert_eq!(context.chars().count(), 18_000);
    }
}
