//! # tessera-session
//!
//! Session lifecycle coordination for a ceremony.
//!
//! The [`coordinator::SessionCoordinator`] gets N independently started
//! devices into lockstep before any cryptography runs: register with the
//! mediator, discover peers, freeze a committee (initiator) or adopt the
//! frozen committee (joiner). After the ceremony's phases succeed locally,
//! the [`completion::CompletionGate`] publishes local completion and
//! confirms the whole committee finished — a partial ceremony is not a
//! usable key.
//!
//! Polling loops here never escalate transient network errors; they log
//! and retry until stopped or satisfied.

pub mod completion;
pub mod coordinator;

use serde::{Deserialize, Serialize};

/// Error types for session coordination.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The mediator refused the local party's registration.
    #[error("join rejected by mediator (status {status})")]
    JoinRejected {
        /// HTTP status returned by the mediator.
        status: u16,
    },

    /// Only the initiator may freeze the committee.
    #[error("party acting as {role} cannot start the ceremony")]
    NotInitiator {
        /// The offending role.
        role: String,
    },

    /// Committee validation failed.
    #[error(transparent)]
    Committee(#[from] tessera_types::session::CommitteeError),

    /// Network failure on a non-polling call.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<tessera_mediator::MediatorError> for SessionError {
    fn from(e: tessera_mediator::MediatorError) -> Self {
        match e {
            tessera_mediator::MediatorError::Rejected { status } => {
                SessionError::JoinRejected { status }
            }
            other => SessionError::Transport(other.to_string()),
        }
    }
}

/// Convenience result type for session coordination.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Default poll interval for discovery, start-wait and completion loops
/// in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Timeout for the completion quorum in seconds.
pub const QUORUM_TIMEOUT_SECS: u64 = 60;

/// Session loop tuning knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Poll interval for discovery/start/completion loops in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
