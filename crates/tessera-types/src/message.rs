//! Relayed protocol message envelope.
//!
//! The MPC engine produces and consumes opaque payload bytes; the
//! coordination layer wraps them in a [`MessageEnvelope`] carrying
//! addressing and a per-sender monotonic sequence number. On the wire the
//! envelope is JSON with a base64 payload (ciphertext in transit,
//! plaintext once decrypted for the engine).
//!
//! Delivery of the same `(from_party, sequence)` pair more than once is
//! expected — the relay poll may observe a message repeatedly — so
//! receivers deduplicate on that pair.

use serde::{Deserialize, Serialize};

use crate::PartyId;

/// The addressee of a protocol message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// One specific committee member.
    Unicast(PartyId),
    /// Every committee member except the sender.
    Broadcast,
}

/// A protocol message as relayed between parties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// The session this message belongs to.
    pub session_id: String,
    /// Sending party.
    pub from_party: PartyId,
    /// Receiving party or broadcast.
    pub to_party: Recipient,
    /// Monotonic counter per sender; duplicates are dropped by receivers.
    pub sequence: u64,
    /// Opaque payload bytes, base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
}

impl MessageEnvelope {
    /// The dedup key for redelivery suppression.
    pub fn dedup_key(&self) -> (PartyId, u64) {
        (self.from_party.clone(), self.sequence)
    }

    /// Serialize to the JSON wire form.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from the JSON wire form.
    pub fn from_wire(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

/// Per-party acknowledgement that the local ceremony succeeded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// The party that completed.
    pub party_id: PartyId,
    /// Unix timestamp of completion.
    pub timestamp: u64,
}

/// The two sequential key algorithms of a ceremony.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyKind {
    /// First phase: the ECDSA-family key.
    Ecdsa,
    /// Second phase: the EdDSA-family key.
    Eddsa,
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyKind::Ecdsa => write!(f, "ecdsa"),
            KeyKind::Eddsa => write!(f, "eddsa"),
        }
    }
}

mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes);
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &encoded)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_envelope(sequence: u64) -> MessageEnvelope {
        MessageEnvelope {
            session_id: "S1".to_string(),
            from_party: "dev-A".to_string(),
            to_party: Recipient::Unicast("dev-B".to_string()),
            sequence,
            payload: vec![0x01, 0x02, 0xFF],
        }
    }

    #[test]
    fn test_wire_roundtrip() {
        let envelope = make_envelope(7);
        let wire = envelope.to_wire().expect("serialize");
        let parsed = MessageEnvelope::from_wire(&wire).expect("parse");
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn test_payload_is_base64_on_wire() {
        let envelope = make_envelope(0);
        let wire = envelope.to_wire().expect("serialize");
        // Raw bytes must not appear; the base64 of [1, 2, 255] is "AQL/".
        assert!(wire.contains("AQL/"));
    }

    #[test]
    fn test_broadcast_roundtrip() {
        let mut envelope = make_envelope(3);
        envelope.to_party = Recipient::Broadcast;
        let wire = envelope.to_wire().expect("serialize");
        let parsed = MessageEnvelope::from_wire(&wire).expect("parse");
        assert_eq!(parsed.to_party, Recipient::Broadcast);
    }

    #[test]
    fn test_malformed_wire_rejected() {
        assert!(MessageEnvelope::from_wire("{not json").is_err());
        assert!(MessageEnvelope::from_wire("{\"session_id\":\"S1\"}").is_err());
    }

    #[test]
    fn test_dedup_key() {
        let envelope = make_envelope(42);
        assert_eq!(envelope.dedup_key(), ("dev-A".to_string(), 42));
    }
}
