//! Python bindings for the talent query session using PyO3

use crate::config::EngineConfig;
use crate::error::QueryError;
use crate::export::{chart_to_json, table_to_csv, table_to_xlsx};
use crate::resolver::ColumnResolver;
use crate::schema::normalize_header;
use crate::session::Session;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict};
use std::path::PathBuf;

fn to_py_err(e: QueryError) -> PyErr {
    match e {
        QueryError::SchemaConflict { .. } | QueryError::Load(_) | QueryError::Config(_) => {
            PyValueError::new_err(e.to_string())
        }
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

/// Best matching column for a query (Python function)
#[pyfunction]
pub fn py_resolve_column(query: &str, columns: Vec<String>) -> Option<String> {
    ColumnResolver::default().resolve(query, &columns)
}

/// Canonical form of a column header (Python function)
#[pyfunction]
pub fn py_normalize_header(name: &str) -> String {
    normalize_header(name)
}

/// Python wrapper for a query session
#[pyclass]
pub struct PySession {
    session: Session,
}

#[pymethods]
impl PySession {
    /// Create a session; raises if the config is invalid or no API key is set.
    #[new]
    #[pyo3(signature = (config_path=None))]
    fn new(config_path: Option<PathBuf>) -> PyResult<Self> {
        let config = EngineConfig::load(config_path.as_deref()).map_err(to_py_err)?;
        let mut session = Session::from_config(&config).map_err(to_py_err)?;
        session.restore_from_store().map_err(to_py_err)?;
        Ok(Self { session })
    }

    /// Load an uploaded file's bytes
    fn load_file(&mut self, file_name: &str, data: &[u8]) -> PyResult<()> {
        self.session.load_file(file_name, data).map_err(to_py_err)
    }

    fn has_table(&self) -> bool {
        self.session.table().is_some()
    }

    /// Answer a query; the result table comes as CSV text and `.xlsx` bytes,
    /// the chart as JSON
    fn ask<'py>(&mut self, query: &str, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let envelope = self.session.ask(query);

        let dict = PyDict::new_bound(py);
        dict.set_item("intent", envelope.intent.clone())?;
        dict.set_item("text", envelope.response_text())?;

        match &envelope.result_table {
            Some(t) => {
                let csv = table_to_csv(t).map_err(to_py_err)?;
                dict.set_item("table_csv", String::from_utf8_lossy(&csv).into_owned())?;
                let xlsx = table_to_xlsx(t).map_err(to_py_err)?;
                dict.set_item("table_xlsx", PyBytes::new_bound(py, &xlsx))?;
            }
            None => {
                dict.set_item("table_csv", py.None())?;
                dict.set_item("table_xlsx", py.None())?;
            }
        }

        let chart = match &envelope.chart_spec {
            Some(c) => Some(chart_to_json(c).map_err(to_py_err)?),
            None => None,
        };
        dict.set_item("chart", chart)?;
        Ok(dict)
    }

    /// Headline counts as a list of (label, count)
    fn dashboard(&self) -> Vec<(String, usize)> {
        self.session
            .dashboard()
            .into_iter()
            .map(|m| (m.label, m.count))
            .collect()
    }

    fn chat_log(&self) -> PyResult<String> {
        self.session.chat_log().map_err(to_py_err)
    }
}
