use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;

/// Every failure the engine can report. None of them are retried internally.
#[derive(Error, Debug)]
pub enum NetError {
    /// Illegal layer adjacency, detected while linking a model.
    #[error("structural link error: {0}")]
    StructuralLink(String),

    /// Operand shapes do not agree.
    #[error("dimension mismatch in {op}: expected {expected}, got {actual}")]
    DimensionMismatch {
        op: &'static str,
        expected: String,
        actual: String,
    },

    /// A backward pass was requested without the gradient it needs.
    #[error("missing gradient: {0}")]
    MissingGradient(String),

    /// Recurrent-only entry point used on a feed-forward model, or vice versa.
    #[error("mode error: {0}")]
    Mode(String),

    /// Backward was called on a layer that has not run forward yet.
    #[error("{0} has no cached forward pass")]
    NoForwardPass(&'static str),

    #[error("unknown activation function: {0}")]
    UnknownActivation(String),

    /// Malformed serialized model or layer text.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetError {
    /// Shorthand for a shape mismatch between two `col x row` operands.
    pub(crate) fn shapes(op: &'static str, expected: (usize, usize), actual: (usize, usize)) -> Self {
        NetError::DimensionMismatch {
            op,
            expected: format!("{}x{}", expected.0, expected.1),
            actual: format!("{}x{}", actual.0, actual.1),
        }
    }

    pub(crate) fn lengths(op: &'static str, expected: usize, actual: usize) -> Self {
        NetError::DimensionMismatch {
            op,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
