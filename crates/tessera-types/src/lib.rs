//! # tessera-types
//!
//! Shared domain types for the Tessera ceremony coordination workspace.
//!
//! A *ceremony* is one run of threshold key generation (keygen) or key
//! rotation (reshare) across a committee of devices. These types describe
//! the session identity, the participant set, the relayed message
//! envelope, and the out-of-band invite payload that carries session
//! secrets from the initiating device to joiners.

pub mod invite;
pub mod message;
pub mod session;

/// A party identifier: a human/device-readable label unique within a session.
pub type PartyId = String;

/// Size of the shared session encryption key in bytes.
pub const SESSION_KEY_SIZE: usize = 32;

/// Minimum committee size for a ceremony to be meaningful.
pub const MIN_COMMITTEE_SIZE: usize = 2;
