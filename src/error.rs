use thiserror::Error;

/// Failures of the backing medium or of a store that has been shut down.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("I/O failure: {0}")]
    IoFailure(String),
    #[error("store is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum QuadcladError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Prefix conflict: '{short}' is bound to '{existing}', cannot bind '{requested}'")]
    Conflict {
        short: String,
        existing: String,
        requested: String,
    },
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    #[error("Identifier generation failed: {0}")]
    IdGeneration(String),
    #[error("Path compilation error: {0}")]
    PathCompilation(String),
    #[error("Invalid quad: {0}")]
    InvalidQuad(String),
    #[error("Unsupported literal '{lexical}' of type <{datatype}>")]
    UnsupportedLiteral { lexical: String, datatype: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        line: Option<usize>,
        col: Option<usize>,
    },
    #[error("Config error: {0}")]
    Config(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QuadcladError>;

// Helper conversions
impl From<rusqlite::Error> for QuadcladError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(StoreError::IoFailure(e.to_string()))
    }
}
impl From<std::io::Error> for QuadcladError {
    fn from(e: std::io::Error) -> Self {
        Self::Store(StoreError::IoFailure(e.to_string()))
    }
}
impl From<config::ConfigError> for QuadcladError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
impl<T> From<std::sync::PoisonError<T>> for QuadcladError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Lock(e.to_string())
    }
}
