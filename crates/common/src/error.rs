use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Market data feed error: {0}")]
    Feed(String),

    #[error("Execution gateway error: {0}")]
    Gateway(String),

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
