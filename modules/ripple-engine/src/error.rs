//! Typed errors for the binding engine.

use thiserror::Error;

/// Errors surfaced by engine construction and by the evaluator, transport and
/// storage seams. Everything that happens after mount is absorbed and logged
/// at the point of occurrence.
#[derive(Debug, Error)]
pub enum RippleError {
    /// No element in the host carries the root marker
    #[error("mount root not found: {0}")]
    MissingRoot(String),

    /// An inline action or parameter expression failed to parse or evaluate
    #[error("cannot evaluate `{expr}`: {reason}")]
    Eval { expr: String, reason: String },

    /// The network transport rejected or failed a request
    #[error("transport error: {0}")]
    Transport(String),

    /// The durable store could not be read or written
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration value is present but unusable
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl RippleError {
    pub(crate) fn eval(expr: &str, reason: impl Into<String>) -> Self {
        RippleError::Eval {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, RippleError>;
