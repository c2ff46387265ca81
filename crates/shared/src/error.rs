//! Error types shared by every stage of a bot run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    /// A required configuration value is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A pre-flight check against an external service failed.
    #[error("{service} connectivity check failed: {reason}")]
    Connectivity { service: String, reason: String },
    /// The content API answered, but no usable text could be pulled out of it.
    #[error("extraction error: {0}")]
    Extraction(String),
    /// The formatter could not build a post from its inputs.
    #[error("formatting error: {0}")]
    Formatting(String),
    /// The delivery platform rejected the post or could not be reached.
    #[error("delivery error: {0}")]
    Delivery(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    pub fn connectivity(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connectivity {
            service: service.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
