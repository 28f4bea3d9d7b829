//! # tessera-crypto
//!
//! Cryptographic helpers for the Tessera ceremony coordination layer.
//!
//! This crate deliberately contains no MPC protocol math — the engine is
//! an external collaborator. What lives here is the symmetric sealing of
//! relayed payloads and generation of session identifiers and keys.
//!
//! ## Modules
//!
//! - [`payload`] — ChaCha20-Poly1305 AEAD sealing of relayed payloads
//!   (RFC 8439), nonce-prefixed ciphertext.
//! - [`ident`] — Session id and session key generation.

pub mod ident;
pub mod payload;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AEAD encryption failed.
    #[error("AEAD encryption failed")]
    AeadEncryption,

    /// AEAD decryption failed (authentication tag mismatch or truncation).
    #[error("AEAD decryption failed")]
    AeadDecryption,

    /// Sealed payload is too short to contain a nonce and tag.
    #[error("sealed payload truncated: {0} bytes")]
    Truncated(usize),
}

/// Convenience result type for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
