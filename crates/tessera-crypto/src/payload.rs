//! ChaCha20-Poly1305 sealing of relayed payloads (RFC 8439).
//!
//! Every message relayed through the mediator is encrypted with the
//! session key shared out-of-band. The sealed form is `nonce || ciphertext
//! || tag` with a fresh random nonce per message, so the same plaintext
//! sealed twice produces different bytes.

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Key, Nonce,
};

use crate::{CryptoError, Result};

/// Nonce size for ChaCha20-Poly1305 (96 bits = 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Key size for ChaCha20-Poly1305 (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Authentication tag size (128 bits = 16 bytes).
pub const TAG_SIZE: usize = 16;

/// Seal a payload with the session key.
///
/// # Arguments
///
/// * `key` - 32-byte session encryption key
/// * `plaintext` - Payload bytes from the MPC engine
///
/// # Returns
///
/// `nonce || ciphertext || tag` ready for base64 wire encoding.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::AeadEncryption)?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a sealed payload with the session key.
///
/// # Arguments
///
/// * `key` - 32-byte session encryption key
/// * `sealed` - `nonce || ciphertext || tag` as produced by [`seal`]
///
/// # Returns
///
/// The plaintext, or an error if the payload is truncated or fails
/// authentication.
pub fn open(key: &[u8; KEY_SIZE], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Truncated(sealed.len()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::AeadDecryption)
}
