//! Error types for convs2s-rs.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Candle tensor/model error.
    #[error("candle: {0}")]
    Candle(#[from] candle_core::Error),

    /// Invalid configuration (even encoder kernel, zero-sized layers, ...).
    #[error("config: {0}")]
    Config(String),

    /// Decode hit an index with no live vocabulary entry.
    #[error("unknown token index: {0}")]
    UnknownIndex(u32),

    /// Encoded sentences of a batch do not share one length.
    #[error("ragged batch: expected sequences of length {expected}, found {found}")]
    RaggedBatch { expected: usize, found: usize },

    /// Sequence is longer than the position embedding table.
    #[error("sequence length {len} exceeds maximum position count {max}")]
    SequenceTooLong { len: usize, max: usize },

    /// I/O error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
