// rivet-common/src/error.rs
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RivetError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("TOML Parsing Error: {0}")]
    Toml(#[from] Arc<toml::de::Error>),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid or incomplete resolver wiring.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// The parser engine could not be constructed at all.
    #[error("Parser Configuration Error: {0}")]
    ParserConfig(String),

    #[error("Parsing Error in {0}: {1}")]
    ParseError(String, String),

    #[error("IoError: {0}")]
    IoError(String),

    #[error("HttpError: {0}")]
    HttpError(String),

    /// Transport-level "no such resource". Resolvers turn this into `Ok(None)`.
    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Authentication Unavailable: {0}")]
    AuthenticationUnavailable(String),

    /// A content handler refused an event and stopped the parse.
    #[error("Handler Error: {0}")]
    Handler(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl RivetError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RivetError::NotFound(_))
    }
}

impl From<std::io::Error> for RivetError {
    fn from(err: std::io::Error) -> Self {
        RivetError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for RivetError {
    fn from(err: reqwest::Error) -> Self {
        RivetError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for RivetError {
    fn from(err: serde_json::Error) -> Self {
        RivetError::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for RivetError {
    fn from(err: toml::de::Error) -> Self {
        RivetError::Toml(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, RivetError>;
