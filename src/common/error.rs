//! Error types for rust_codriving

use thiserror::Error;

/// Main error type for the co-driving engine
#[derive(Debug, Error)]
pub enum CoDrivingError {
    /// Malformed asset or engine configuration
    #[error("Configuration error: {0}")]
    Config(String),
    /// Agent id does not encode a known origin/destination pair
    #[error("Unresolved intention for agent '{0}'")]
    UnresolvedIntention(String),
    /// Intention label outside {left, straight, right, null}
    #[error("Invalid intention label '{0}'")]
    InvalidIntention(String),
    /// State tensor of a rank the frame conversion does not handle
    #[error("Unsupported state rank {0}")]
    UnsupportedRank(usize),
    /// Predictor output does not match the declared tensor contract
    #[error("Prediction shape mismatch: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    PredictionShape {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },
    /// The motion predictor itself failed
    #[error("Predictor error: {0}")]
    Predictor(String),
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Asset decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for co-driving operations
pub type CoDrivingResult<T> = Result<T, CoDrivingError>;

/// Failure reported by a simulation backend while executing a command.
///
/// Never escapes a step: the engine logs it and skips the agent.
#[derive(Debug, Clone, Error)]
#[error("{backend} backend: {message}")]
pub struct BackendError {
    pub backend: &'static str,
    pub message: String,
}

impl BackendError {
    pub fn traffic(message: impl Into<String>) -> Self {
        Self { backend: "traffic", message: message.into() }
    }

    pub fn physics(message: impl Into<String>) -> Self {
        Self { backend: "physics", message: message.into() }
    }
}
