use thiserror::Error;

/// Failures surfaced by the effect engines and their controller.
///
/// Malformed pointer samples are reported as [`FxError::InvalidInput`] by the
/// validation helpers but the router swallows them after logging: a single bad
/// sample must never interrupt the frame loop.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FxError {
    #[error("non-finite pointer coordinates ({x}, {y})")]
    InvalidInput { x: f64, y: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("rendering resources unavailable: {0}")]
    ResourceInit(String),

    #[error("no supported floating-point texture format")]
    UnsupportedFormats,

    #[error("effect instance has been destroyed")]
    Destroyed,
}

impl From<serde_json::Error> for FxError {
    fn from(e: serde_json::Error) -> Self {
        FxError::InvalidConfig(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FxError>;
