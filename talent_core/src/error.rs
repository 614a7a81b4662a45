//! Error taxonomy for loading, matching and executing queries

use thiserror::Error;

/// Failure reported by the external narrative service.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct ServiceError(pub String);

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("schema conflict: columns {first:?} and {second:?} both normalize to {normalized:?}")]
    SchemaConflict {
        first: String,
        second: String,
        normalized: String,
    },

    #[error("no intent matched the query")]
    NoIntentMatch,

    #[error("could not determine which column the question refers to")]
    ColumnUnresolved,

    #[error("{entity} not found")]
    EntityNotFound { entity: String },

    #[error("narrative service error: {0}")]
    Service(#[from] ServiceError),

    #[error("load error: {0}")]
    Load(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for QueryError {
    fn from(e: rusqlite::Error) -> Self {
        QueryError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
