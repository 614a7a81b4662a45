//! Talent core - natural-language queries over a loaded talent table
//!
//! A query is matched against a prioritized rule table and dispatched to one
//! of four operations: filtered counts, entity lookups, charts, or a
//! narrative answer from an external text-completion service. Column names
//! the rules do not fix are inferred with a fuzzy resolver.

pub mod config;
pub mod entities;
pub mod error;
pub mod executor;
pub mod export;
pub mod interaction_log;
pub mod loader;
pub mod matcher;
pub mod narrative;
pub mod resolver;
pub mod rules;
pub mod schema;
pub mod session;
pub mod similarity;
pub mod store;
pub mod summary;
pub mod table;
pub mod types;

pub use config::EngineConfig;
pub use error::{QueryError, Result, ServiceError};
pub use executor::QueryExecutor;
pub use matcher::IntentMatcher;
pub use narrative::{NarrativeService, OpenAiClient};
pub use resolver::ColumnResolver;
pub use rules::RuleSet;
pub use session::{DashboardMetric, Session};
pub use table::{Column, ColumnKind, Table, Value};
pub use types::*;

// Python bindings
#[cfg(feature = "python")]
pub mod py;

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn talent_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    use py::*;
    m.add_class::<PySession>()?;
    m.add_function(wrap_pyfunction!(py_resolve_column, m)?)?;
    m.add_function(wrap_pyfunction!(py_normalize_header, m)?)?;
    Ok(())
}
