use thiserror::Error;

#[derive(Error, Debug)]
pub enum CurateError {
    #[error("No entity found for identifier '{0}'")]
    NotFound(String),

    #[error("Expected exactly one target, found {found}")]
    ExpectedSingleTarget { found: usize },

    #[error("Aborted: {0}")]
    Aborted(String),

    #[error("{0}")]
    Usage(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("History error: {0}")]
    History(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CurateError>;
