//! # tessera-ceremony
//!
//! The two-phase ceremony state machine and the seam to the external MPC
//! engine.
//!
//! A ceremony runs two sequential legs over the same committee: first the
//! ECDSA-family key, then the EdDSA-family key. The engine performing the
//! actual multi-party computation is an external collaborator behind the
//! [`engine::MpcEngine`] trait; this crate owns sequencing, the bounded
//! retry policy (fresh relay listener and fresh engine per attempt), and
//! the completion-quorum hand-off that decides whether the result may be
//! trusted.
//!
//! ## Modules
//!
//! - [`engine`] — `MpcEngine`/`EngineFactory` traits and phase I/O types.
//! - [`machine`] — the `CeremonyStateMachine` and peer-discovery helper.

pub mod engine;
pub mod machine;

use serde::{Deserialize, Serialize};

use tessera_relay::RelayConfig;
use tessera_types::message::KeyKind;
use tessera_types::PartyId;

/// Maximum ceremony attempts before giving up.
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff between the two phases in milliseconds, letting the relay
/// drain residual late messages.
pub const INTER_PHASE_DELAY_MS: u64 = 1000;

/// Terminal errors a ceremony can surface to its caller.
///
/// Pollers below this layer log and retry; the state machine is the only
/// component that reports a terminal outcome, and it names the failed leg
/// so the caller can decide how to retry.
#[derive(Debug, thiserror::Error)]
pub enum CeremonyError {
    /// Not enough peers were discovered in time. Recoverable; the caller
    /// may restart discovery.
    #[error("discovery timed out: found {found} of {required} peers")]
    DiscoveryTimeout {
        /// Peers found before the deadline.
        found: usize,
        /// Peers required.
        required: usize,
    },

    /// The mediator refused the local party's registration.
    #[error("join rejected: {0}")]
    JoinRejected(String),

    /// A phase kept failing after every allowed attempt.
    #[error("{phase} phase failed after {attempts} attempts: {reason}")]
    PhaseFailure {
        /// Which key leg failed.
        phase: KeyKind,
        /// Attempts made.
        attempts: u32,
        /// The engine's error, verbatim.
        reason: String,
    },

    /// The committee did not confirm completion in time. The local result
    /// must be discarded even though the local phases succeeded.
    #[error("completion quorum timed out; missing {missing:?}")]
    QuorumTimeout {
        /// Committee members without a completion record.
        missing: Vec<PartyId>,
    },

    /// Network failure on a non-polling call.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<tessera_session::SessionError> for CeremonyError {
    fn from(e: tessera_session::SessionError) -> Self {
        match e {
            tessera_session::SessionError::JoinRejected { status } => {
                CeremonyError::JoinRejected(format!("mediator returned status {status}"))
            }
            other => CeremonyError::Transport(other.to_string()),
        }
    }
}

/// Convenience result type for ceremony operations.
pub type Result<T> = std::result::Result<T, CeremonyError>;

/// Ceremony tuning knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CeremonyConfig {
    /// Maximum attempts of the phase pair.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between Phase 1 and Phase 2 in milliseconds.
    #[serde(default = "default_inter_phase_delay")]
    pub inter_phase_delay_ms: u64,
    /// Completion quorum timeout in seconds.
    #[serde(default = "default_quorum_timeout")]
    pub quorum_timeout_secs: u64,
    /// Poll interval for the completion gate in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Relay tuning.
    #[serde(default)]
    pub relay: RelayConfig,
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            inter_phase_delay_ms: INTER_PHASE_DELAY_MS,
            quorum_timeout_secs: tessera_session::QUORUM_TIMEOUT_SECS,
            poll_interval_ms: tessera_session::DEFAULT_POLL_INTERVAL_MS,
            relay: RelayConfig::default(),
        }
    }
}

fn default_max_attempts() -> u32 {
    MAX_ATTEMPTS
}

fn default_inter_phase_delay() -> u64 {
    INTER_PHASE_DELAY_MS
}

fn default_quorum_timeout() -> u64 {
    tessera_session::QUORUM_TIMEOUT_SECS
}

fn default_poll_interval() -> u64 {
    tessera_session::DEFAULT_POLL_INTERVAL_MS
}
