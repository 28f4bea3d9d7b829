//! # tessera-mediator
//!
//! Client side of the mediator REST surface and mediator address
//! resolution.
//!
//! The mediator is a dumb message board: parties register under a session
//! id, the initiator freezes a committee, encrypted protocol messages are
//! pushed and pulled per party, and completions are recorded. This crate
//! knows the REST contract and nothing about the ceremony protocol.
//!
//! ## Modules
//!
//! - [`client`] — the [`MediatorClient`](client::MediatorClient) trait
//!   mirroring the REST contract.
//! - [`http`] — reqwest-backed implementation.
//! - [`memory`] — in-memory implementation for tests and local simulation.
//! - [`locator`] — mediator address resolution (fixed relay URL or local
//!   service discovery callback).

pub mod client;
pub mod http;
pub mod locator;
pub mod memory;

pub use client::MediatorClient;

/// Error types for mediator operations.
#[derive(Debug, thiserror::Error)]
pub enum MediatorError {
    /// Network-level failure talking to the mediator.
    #[error("mediator transport error: {0}")]
    Transport(String),

    /// The mediator refused a registration or push.
    #[error("mediator rejected request: status {status}")]
    Rejected {
        /// HTTP status code returned.
        status: u16,
    },

    /// The discovery channel closed before an address was resolved.
    #[error("service discovery ended without resolving an address")]
    DiscoveryClosed,
}

/// Convenience result type for mediator operations.
pub type Result<T> = std::result::Result<T, MediatorError>;
