//! Error types for char-rnn training and generation.

use thiserror::Error;

/// Result type for char-rnn operations.
pub type CharRnnResult<T> = Result<T, CharRnnError>;

/// Errors that can occur during training, batching or generation.
#[derive(Debug, Error)]
pub enum CharRnnError {
    /// Tensor operation failed
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A window's dimensions do not match what the model was built for
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// Carried hidden state is incompatible with the model's configured
    /// stream count. Raised instead of silently reshaping.
    #[error("State shape mismatch: expected {expected}, got {got}")]
    StateShapeMismatch { expected: String, got: String },

    /// A symbol encountered during encode was absent at vocabulary build time
    #[error("Unknown symbol: {symbol:?}")]
    UnknownSymbol { symbol: char },

    /// A symbol index outside the vocabulary's range was decoded
    #[error("Unknown symbol index {index} (vocabulary size {vocab_size})")]
    UnknownIndex { index: u32, vocab_size: usize },

    /// Training error
    #[error("Training error: {0}")]
    Training(String),

    /// Data pipeline error
    #[error("Data error: {0}")]
    Data(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CharRnnError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create a state shape mismatch error
    pub fn state_shape_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::StateShapeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create a training error
    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    /// Create a data error
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }
}
