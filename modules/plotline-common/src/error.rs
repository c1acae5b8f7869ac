use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlotlineError>;

#[derive(Error, Debug)]
pub enum PlotlineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot read credential file {}: {source}", path.display())]
    Credential {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Top-level analysis failed: {0}")]
    TopLevelAiFailure(String),
}
