//! # tessera-relay
//!
//! Encrypted message relay between ceremony parties.
//!
//! The relay is the MPC engine's network: outbound protocol messages are
//! sealed with the session key and pushed to each recipient's mailbox on
//! the mediator; a background pull loop polls the local mailbox, drops
//! redelivered messages, opens the payloads and forwards plaintext to the
//! engine's inbound sink.
//!
//! One relay serves one ceremony attempt. It is an owned resource:
//! explicitly spawned, explicitly stopped, never a process-wide
//! singleton, and [`MessageRelay::stop`] does not return until the
//! background task has finished.

pub mod relay;

pub use relay::{MessageRelay, RelayHandle};

use serde::{Deserialize, Serialize};
use tessera_types::PartyId;

/// Error types for relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Payload sealing or opening failed.
    #[error("payload crypto error: {0}")]
    Crypto(#[from] tessera_crypto::CryptoError),

    /// The mediator call failed.
    #[error("mediator error: {0}")]
    Mediator(#[from] tessera_mediator::MediatorError),

    /// Envelope serialization failed.
    #[error("envelope serialization error: {0}")]
    Serialization(String),
}

/// Convenience result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Default mailbox poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Relay tuning knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Mailbox poll interval in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// A decrypted protocol message delivered to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sending party.
    pub from_party: PartyId,
    /// Sender's sequence number.
    pub sequence: u64,
    /// Decrypted payload for the engine.
    pub payload: Vec<u8>,
}
