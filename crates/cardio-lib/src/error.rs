use thiserror::Error;

/// Failures raised by the analysis and synthesis routines.
///
/// Sparse but valid inputs never produce an error: they degrade to empty
/// sequences or undefined statistics instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CardioError {
    #[error("unknown method `{method}`")]
    InvalidMethod { method: String },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("signal has {samples} samples but its time axis has {time}")]
    LengthMismatch { samples: usize, time: usize },
    #[error("fft failed: {0}")]
    Fft(String),
}

pub type Result<T> = std::result::Result<T, CardioError>;
