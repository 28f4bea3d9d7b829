//! Seam to the external MPC library.
//!
//! The actual threshold cryptography lives outside this workspace. The
//! state machine drives it through [`MpcEngine`], one instance per
//! ceremony attempt, created by an application-supplied [`EngineFactory`]
//! from the attempt's relay binding. Engines are single-use: a failed
//! attempt discards the engine along with its relay, and the next attempt
//! gets fresh ones.

use async_trait::async_trait;
use tokio::sync::mpsc;

use tessera_relay::{InboundMessage, RelayHandle};
use tessera_types::message::KeyKind;
use tessera_types::session::Committee;
use tessera_types::PartyId;

/// Opaque failure reported by the engine.
///
/// The state machine does not inspect engine failures beyond logging
/// them; any engine error costs the whole attempt.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    /// Build an error from any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

/// Network binding handed to a freshly created engine.
///
/// `outbound` seals and pushes; `inbound` yields decrypted peer messages
/// from the attempt's pull loop.
pub struct EngineBinding {
    /// The local party id.
    pub local_party: PartyId,
    /// The frozen committee for this ceremony.
    pub committee: Committee,
    /// Outbound message path.
    pub outbound: RelayHandle,
    /// Inbound message path.
    pub inbound: mpsc::UnboundedReceiver<InboundMessage>,
}

/// Inputs for one key-generation phase.
#[derive(Clone, Debug, Default)]
pub struct PhaseParams {
    /// Previous committee when resharing; `None` for fresh keygen.
    pub old_committee: Option<Committee>,
    /// Existing public key of this kind when resharing.
    pub existing_public_key: Option<Vec<u8>>,
    /// Reshare chain prefix. For the second phase this is the first
    /// phase's output prefix.
    pub reshare_prefix: Option<String>,
}

/// Outputs of one successful key-generation phase.
#[derive(Clone, Debug)]
pub struct PhaseOutput {
    /// Public key produced by the phase.
    pub public_key: Vec<u8>,
    /// Reshare chain prefix produced by the phase, if any.
    pub reshare_prefix: Option<String>,
}

/// One attempt's multi-party computation engine.
#[async_trait]
pub trait MpcEngine: Send {
    /// Run one key-generation phase to completion.
    async fn compute(
        &mut self,
        kind: KeyKind,
        params: PhaseParams,
    ) -> std::result::Result<PhaseOutput, EngineError>;
}

/// Creates one engine per ceremony attempt.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Build an engine wired to the attempt's relay.
    async fn create(
        &self,
        binding: EngineBinding,
    ) -> std::result::Result<Box<dyn MpcEngine>, EngineError>;
}
