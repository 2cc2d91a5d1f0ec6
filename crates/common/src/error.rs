use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid print request: {0}")]
    Validation(String),

    #[error("Unknown print role: {0}")]
    UnknownRole(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
