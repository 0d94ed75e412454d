use thiserror::Error;

/// Failures while hashing or recovering a typed-data signature.
///
/// Every variant means the same thing to callers: the signature does not
/// prove control of an account for this message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature is not valid hex")]
    InvalidHex,

    #[error("Signature must be 65 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("Malformed signature scalars")]
    Malformed,

    #[error("Message does not match schema {schema}: {reason}")]
    SchemaMismatch { schema: &'static str, reason: String },

    #[error("Public key recovery failed")]
    RecoveryFailed,

    #[error("Signing failed")]
    SigningFailed,
}
