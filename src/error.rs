//! Error types for the aihub service.

use std::path::PathBuf;
use std::result;
use std::time::Duration;
use thiserror::Error;

/// A specialized Result type for hub operations.
pub type Result<T> = result::Result<T, Error>;

/// The error type for hub operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A load was requested without a name and the modality has no default.
    #[error("No {modality} model given and no default model set")]
    NoDefaultModel { modality: &'static str },

    /// The named weights do not exist with the layout the backend expects.
    #[error("Model '{name}' not found in {}", .dir.display())]
    ModelNotFound { name: String, dir: PathBuf },

    /// The inference runtime refused or failed to load the weights.
    #[error("{backend} failed to load '{model}' after {:.2}s: {message}", .elapsed.as_secs_f64())]
    BackendLoad {
        model: String,
        backend: String,
        elapsed: Duration,
        message: String,
    },

    /// The runtime failed to release a resident model.
    #[error("{backend} failed to release its model: {message}")]
    BackendUnload { backend: String, message: String },

    #[error("No prompt provided")]
    MissingPrompt,

    #[error("Invalid backend options: {0}")]
    OptionValidation(String),

    #[error("Model {0} not supported")]
    UnsupportedModel(String),

    #[error("No {modality} model loaded")]
    ModelNotLoaded { modality: &'static str },

    /// The routing rules selected a backend that has no registered client.
    #[error("No {modality} client registered for backend '{backend}'")]
    BackendUnavailable {
        modality: &'static str,
        backend: String,
    },

    #[error("{backend} inference failed: {message}")]
    Inference { backend: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

impl Error {
    /// Whether the error originated inside a backend rather than from caller input.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Error::BackendLoad { .. }
                | Error::BackendUnload { .. }
                | Error::Inference { .. }
                | Error::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_load_message_includes_elapsed() {
        let err = Error::BackendLoad {
            model: "x.gguf".into(),
            backend: "llamacpp".into(),
            elapsed: Duration::from_millis(1500),
            message: "bad magic".into(),
        };
        assert_eq!(
            err.to_string(),
            "llamacpp failed to load 'x.gguf' after 1.50s: bad magic"
        );
        assert!(err.is_backend_failure());
    }

    #[test]
    fn test_caller_errors_are_not_backend_failures() {
        assert!(!Error::MissingPrompt.is_backend_failure());
        assert!(!Error::NoDefaultModel { modality: "llm" }.is_backend_failure());
    }
}
