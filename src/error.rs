//! Error types for stringveil

use thiserror::Error;

/// Obfuscation error types
#[derive(Debug, Error)]
pub enum VeilError {
    /// Invalid key material
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// The logical ciphertext table outgrew its 32-bit offset space
    #[error("Table overflow: {0}")]
    TableOverflow(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for obfuscation operations
pub type VeilResult<T> = Result<T, VeilError>;
