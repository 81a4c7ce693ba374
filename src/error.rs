// Library error type. The binary wraps these in `anyhow` for context.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{message} (code {code})")]
    Rpc { code: i64, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Artifact(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Upload failed: {0}")]
    Upload(String),
}

impl Error {
    /// JSON-RPC error code carried by the error, if it came from the server.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Error::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
