//! Error types for every failure the client can surface
//!
//! Errors are never retried or recovered from; each one ends up as a single
//! line shown to the user. The variants exist so callers can tell a
//! configuration problem apart from a provider failure when logging.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Search Service Configuration Error: Missing Authorization.")]
    MissingApiKey,
    #[error("{0}")]
    Api(String),
    #[error("Parsing error: {0}")]
    Parsing(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Audio error: {0}")]
    Audio(String),
    #[error("Image error: {0}")]
    Image(String),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("A search is already in progress")]
    RequestInFlight,
    #[error("Nothing to search for")]
    EmptyPrompt,
    #[error("The speech service returned no audio")]
    NoAudio,
}

impl From<std::io::Error> for SearchError {
    fn from(err: std::io::Error) -> Self {
        SearchError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Api(err.to_string())
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Parsing(err.to_string())
    }
}
