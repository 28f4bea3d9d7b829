//! Session id and session key generation.
//!
//! The initiating device mints the session id and the shared encryption
//! key exactly once per ceremony; both come from the OS RNG.

use rand::RngCore;

use crate::payload::KEY_SIZE;

/// Mint a globally unique session id (32 random bytes, hex-encoded).
pub fn mint_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a fresh session encryption key.
pub fn generate_session_key() -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_unique() {
        let a = mint_session_id();
        let b = mint_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_session_id_is_hex() {
        let id = mint_session_id();
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_keys_unique() {
        assert_ne!(generate_session_key(), generate_session_key());
    }
}
