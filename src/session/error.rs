use thiserror::Error;

/// Reasons a presented session token is rejected.
///
/// Callers outside this module only ever see "not authenticated"; the
/// variants exist so rejections can be told apart in debug logs.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,

    #[error("Signature mismatch")]
    SignatureMismatch,

    #[error("Invalid issue timestamp")]
    InvalidTimestamp,

    #[error("Token issued in the future")]
    IssuedInFuture,

    #[error("Token has expired")]
    Expired,
}
