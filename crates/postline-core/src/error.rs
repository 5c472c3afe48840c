//! Error types for `postline-core`.
//!
//! All fallible operations in the core library return [`CoreResult<T>`],
//! which is an alias for `Result<T, CoreError>`.

/// Unified error type for all core operations.
///
/// Variants that reach a client (`AuthInvalid`, `NotFound`, `Conflict`,
/// `Validation`) carry only text that is safe to show. The remaining
/// variants describe internal failures and are logged, never returned
/// verbatim.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Bad credentials, or a token that is missing, forged, malformed or expired.
    ///
    /// The cause is deliberately not recorded.
    #[error("invalid credentials")]
    AuthInvalid,

    /// A referenced entity (user, message) does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The entity already exists (duplicate username).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A push to a live connection failed because its channel is closed.
    #[error("dispatch failed: {0}")]
    DispatchFailure(String),

    /// Input rejected before reaching storage.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Hashing or parsing a stored password hash failed.
    #[error("password hash error: {0}")]
    PasswordHash(String),

    /// Signing a session token failed.
    #[error("token error: {0}")]
    Token(String),

    /// The persistence collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Convenience alias used throughout `postline-core`.
pub type CoreResult<T> = Result<T, CoreError>;
