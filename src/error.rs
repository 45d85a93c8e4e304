//! use certkit_ca::error::CaError;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CaError>;

/// Represents errors that can occur while signing certificates or issuing CRLs.
///
/// Every failure aborts the current operation; nothing is issued unless the
/// call returned `Ok`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaError {
    /// Malformed or self-contradictory configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A validity window whose end is not after its start.
    #[error("Invalid validity window: not_after ({not_after}) must be after not_before ({not_before})")]
    InvalidWindow {
        not_before: time::OffsetDateTime,
        not_after: time::OffsetDateTime,
    },

    /// The anchor certificate has already expired at the reference time.
    #[error("Anchor expiry {anchor} is not after reference time {reference_time}")]
    ExpiredAnchor {
        anchor: time::OffsetDateTime,
        reference_time: time::OffsetDateTime,
    },

    /// Requester data was rejected by profile policy.
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// No profile is registered under the given name.
    #[error("Unknown signing profile: {0}")]
    UnknownProfile(String),

    /// No OID is registered under the given short name.
    #[error("Unknown OID short name: {0}")]
    UnknownOid(String),

    /// A short name is already registered for a different OID.
    #[error("Short name {name} is already registered as {existing}, cannot map it to {requested}")]
    DuplicateName {
        name: String,
        existing: String,
        requested: String,
    },

    /// The same extension OID would appear twice in one certificate.
    #[error("Extension {0} appears more than once")]
    ExtensionConflict(String),

    /// Failure reported by the cryptographic collaborator.
    #[error("Cryptographic operation failed: {0}")]
    CryptoDelegation(String),

    /// A counter could not supply a fresh value.
    #[error("Counter exhausted: {0}")]
    CounterExhaustion(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Coarse classification of [`CaError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    PolicyViolation,
    UnknownProfile,
    UnknownOid,
    DuplicateName,
    ExtensionConflict,
    CryptoDelegation,
    CounterExhaustion,
    Encoding,
}

impl CaError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaError::Configuration(_)
            | CaError::InvalidWindow { .. }
            | CaError::ExpiredAnchor { .. } => ErrorKind::Configuration,
            CaError::PolicyViolation(_) => ErrorKind::PolicyViolation,
            CaError::UnknownProfile(_) => ErrorKind::UnknownProfile,
            CaError::UnknownOid(_) => ErrorKind::UnknownOid,
            CaError::DuplicateName { .. } => ErrorKind::DuplicateName,
            CaError::ExtensionConflict(_) => ErrorKind::ExtensionConflict,
            CaError::CryptoDelegation(_) => ErrorKind::CryptoDelegation,
            CaError::CounterExhaustion(_) => ErrorKind::CounterExhaustion,
            CaError::EncodingError(_) | CaError::DecodingError(_) | CaError::InvalidInput(_) => {
                ErrorKind::Encoding
            }
        }
    }
}

impl From<der::Error> for CaError {
    /// Converts a `der::Error` into a `CaError`.
    fn from(err: der::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::Error> for CaError {
    fn from(err: pkcs8::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for CaError {
    fn from(err: pkcs8::spki::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<pem::PemError> for CaError {
    fn from(err: pem::PemError) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for CaError {
    fn from(err: rsa::Error) -> Self {
        CaError::CryptoDelegation(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for CaError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        CaError::DecodingError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CaError {
    fn from(err: serde_yaml::Error) -> Self {
        CaError::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for CaError {
    fn from(err: std::io::Error) -> Self {
        CaError::Configuration(err.to_string())
    }
}
