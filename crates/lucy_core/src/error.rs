use thiserror::Error;

/// Errors reported by the deconvolution core.
///
/// Numerical degeneracies during iteration (zero denominators, non-finite
/// ratios) are neutralized in place and never show up here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeconvError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("shape mismatch: expected {expected} samples, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("unsupported channel count {0} (expected 1 or 3)")]
    UnsupportedChannels(usize),
    #[error("deconvolution cancelled after {completed_iterations} iterations")]
    Cancelled { completed_iterations: usize },
}

impl DeconvError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
