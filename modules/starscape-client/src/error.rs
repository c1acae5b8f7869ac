use thiserror::Error;

pub type Result<T> = std::result::Result<T, StarscapeError>;

#[derive(Debug, Error)]
pub enum StarscapeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No job token in response from {endpoint}")]
    MissingToken { endpoint: String },
}

impl From<reqwest::Error> for StarscapeError {
    fn from(err: reqwest::Error) -> Self {
        StarscapeError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for StarscapeError {
    fn from(err: serde_json::Error) -> Self {
        StarscapeError::Parse(err.to_string())
    }
}
