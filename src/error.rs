//! Error types for rsfairplay.

use thiserror::Error;

/// Main error type for rsfairplay operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The SPC container or one of its TLLV blocks is malformed.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The SPC version field is not a version this KSM speaks.
    #[error("unsupported SPC version {0:#010x}")]
    UnsupportedVersion(u32),

    /// The decrypted SK/R1 integrity bytes did not match the
    /// SessionKeyR1Integrity block.
    #[error("SPC integrity check failed")]
    IntegrityCheckFailed,

    /// A cryptographic primitive failed (RSA, AES, or the RNG).
    #[error("crypto failure: {0}")]
    CryptoFailure(String),

    /// The content-key provider or D-function returned an error.
    #[error("provider failure: {0}")]
    ProviderFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<rsa::Error> for Error {
    fn from(err: rsa::Error) -> Self {
        Error::CryptoFailure(format!("RSA: {}", err))
    }
}

/// Result type alias for rsfairplay operations.
pub type Result<T> = std::result::Result<T, Error>;
