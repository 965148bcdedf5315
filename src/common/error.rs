use thiserror::Error;

// Error
//------------------------------------------------------------------------------

/// Conditions reported by the recognition pipeline.
///
/// A duplicate key is not an error: see [`crate::Registration::Duplicate`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ScanError {
    // Key matcher
    #[error("No access key found in payload")]
    NoKeyFound,
    #[error("Invalid access key format: {0:?}")]
    InvalidKeyFormat(String),
    #[error("Payload does not come from a known fiscal authority: {0:?}")]
    UnknownAuthority(String),

    // Reader
    #[error("No QR symbol decoded after {attempts} attempts")]
    DecodeExhausted { attempts: usize },

    // Ledger
    #[error("Storage error: {0}")]
    Storage(String),
}

pub type ScanResult<T> = Result<T, ScanError>;
