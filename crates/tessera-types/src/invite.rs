//! Out-of-band session invite payload.
//!
//! The initiator shares a [`SessionInvite`] with joining devices over an
//! out-of-band channel (QR code or equivalent). It carries everything a
//! joiner needs to participate: the session id, a mediator address hint,
//! the shared encryption key, and the ceremony kind. The invite itself is
//! the secret channel; it is never sent over the mediator transport.
//!
//! Encoding is JSON wrapped in URL-safe base64 so the payload fits QR
//! codes and deep links without escaping issues.

use serde::{Deserialize, Serialize};

use crate::session::{CeremonyKind, Session};
use crate::SESSION_KEY_SIZE;

/// Errors raised when encoding or decoding an invite.
#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    /// The invite payload is malformed.
    #[error("malformed invite: {0}")]
    Malformed(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The encryption key has the wrong length.
    #[error("invalid key length: {0} bytes, expected {SESSION_KEY_SIZE}")]
    InvalidKeyLength(usize),
}

/// Convenience result type for invite operations.
pub type Result<T> = std::result::Result<T, InviteError>;

/// The out-of-band payload carried from initiator to joiners.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInvite {
    /// The session to join.
    pub session_id: String,
    /// Hint for resolving the mediator (a relay URL, or a local service name).
    pub mediator_hint: String,
    /// The shared session encryption key.
    pub encryption_key: Vec<u8>,
    /// Keygen or reshare.
    pub kind: CeremonyKind,
}

impl SessionInvite {
    /// Build an invite for a session.
    pub fn for_session(session: &Session, mediator_hint: impl Into<String>) -> Self {
        Self {
            session_id: session.session_id.clone(),
            mediator_hint: mediator_hint.into(),
            encryption_key: session.encryption_key.to_vec(),
            kind: session.kind.clone(),
        }
    }

    /// Encode to a base64 string for QR/deep-link sharing.
    pub fn encode(&self) -> Result<String> {
        let json =
            serde_json::to_vec(self).map_err(|e| InviteError::Serialization(e.to_string()))?;
        Ok(base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            json,
        ))
    }

    /// Decode from a base64 string, validating the key length.
    pub fn decode(encoded: &str) -> Result<Self> {
        let json =
            base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, encoded)
                .map_err(|e| InviteError::Malformed(format!("invalid base64: {}", e)))?;
        let invite: SessionInvite =
            serde_json::from_slice(&json).map_err(|e| InviteError::Malformed(e.to_string()))?;
        if invite.encryption_key.len() != SESSION_KEY_SIZE {
            return Err(InviteError::InvalidKeyLength(invite.encryption_key.len()));
        }
        Ok(invite)
    }

    /// The encryption key as a fixed-size array.
    pub fn key_bytes(&self) -> Result<[u8; SESSION_KEY_SIZE]> {
        let mut key = [0u8; SESSION_KEY_SIZE];
        if self.encryption_key.len() != SESSION_KEY_SIZE {
            return Err(InviteError::InvalidKeyLength(self.encryption_key.len()));
        }
        key.copy_from_slice(&self.encryption_key);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session() -> Session {
        Session {
            session_id: "S1".to_string(),
            mediator_address: "http://192.168.1.10:18080".to_string(),
            encryption_key: [0x42u8; SESSION_KEY_SIZE],
            kind: CeremonyKind::Keygen,
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let session = make_session();
        let invite = SessionInvite::for_session(&session, "http://192.168.1.10:18080");
        let encoded = invite.encode().expect("encode");
        let decoded = SessionInvite::decode(&encoded).expect("decode");
        assert_eq!(decoded, invite);
        assert_eq!(decoded.key_bytes().expect("key"), session.encryption_key);
    }

    #[test]
    fn test_reshare_invite_carries_old_committee() {
        let mut session = make_session();
        session.kind = CeremonyKind::Reshare {
            old_committee: vec!["dev-A".to_string(), "dev-B".to_string()],
        };
        let invite = SessionInvite::for_session(&session, "tessera-mediator");
        let decoded = SessionInvite::decode(&invite.encode().expect("encode")).expect("decode");
        match decoded.kind {
            CeremonyKind::Reshare { old_committee } => assert_eq!(old_committee.len(), 2),
            CeremonyKind::Keygen => unreachable!("expected reshare"),
        }
    }

    #[test]
    fn test_decode_invalid_base64() {
        assert!(SessionInvite::decode("not valid base64!!!").is_err());
    }

    #[test]
    fn test_decode_bad_key_length() {
        let invite = SessionInvite {
            session_id: "S1".to_string(),
            mediator_hint: "relay".to_string(),
            encryption_key: vec![0u8; 16],
            kind: CeremonyKind::Keygen,
        };
        let encoded = invite.encode().expect("encode");
        assert!(matches!(
            SessionInvite::decode(&encoded),
            Err(InviteError::InvalidKeyLength(16))
        ));
    }
}
