use thiserror::Error;

/// Errors returned by payload metadata decoding.
///
/// Note: this error type lives in an internal module; the example is
/// illustrative and not compiled as a public doctest.
///
/// # Examples
/// ```text
/// use relaytrace_core::decode::payload::error::PayloadError;
///
/// let err = PayloadError::TooShort { needed: 20, actual: 4 };
/// assert!(err.to_string().contains("payload too short"));
/// ```
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
}
