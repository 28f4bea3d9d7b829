//! Session identity and committee membership.
//!
//! A [`Session`] identifies one ceremony instance. It is created once by
//! the initiating device, shared out-of-band with joiners (see
//! [`crate::invite`]), and read-only thereafter. The [`Committee`] is the
//! participant set the ceremony runs over; for a reshare the old and new
//! committees may differ.

use serde::{Deserialize, Serialize};

use crate::{PartyId, MIN_COMMITTEE_SIZE, SESSION_KEY_SIZE};

/// The kind of ceremony a session runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CeremonyKind {
    /// Generate a fresh split key.
    Keygen,
    /// Rotate an existing split key to a (possibly different) committee.
    Reshare {
        /// The signer set of the key before rotation.
        old_committee: Vec<PartyId>,
    },
}

impl std::fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CeremonyKind::Keygen => write!(f, "keygen"),
            CeremonyKind::Reshare { .. } => write!(f, "reshare"),
        }
    }
}

/// The role a device plays in a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyRole {
    /// Created the session and decides committee membership.
    Initiator,
    /// Joined an existing session; adopts the server-frozen committee.
    Joiner,
}

/// One ceremony instance.
///
/// Immutable once the ceremony starts. The `encryption_key` is shared
/// out-of-band and is never sent over the transport; every relayed
/// payload is encrypted with it.
#[derive(Clone, Debug)]
pub struct Session {
    /// Globally unique session identifier, minted by the initiator.
    pub session_id: String,
    /// Resolved mediator transport endpoint (e.g., `http://host:port`).
    pub mediator_address: String,
    /// Symmetric key for relayed payload encryption.
    pub encryption_key: [u8; SESSION_KEY_SIZE],
    /// Keygen or reshare.
    pub kind: CeremonyKind,
}

/// Errors raised by committee construction and membership checks.
#[derive(Debug, thiserror::Error)]
pub enum CommitteeError {
    /// Fewer members than the minimum committee size.
    #[error("committee too small: {size} members, minimum {minimum}")]
    TooSmall {
        /// Number of members provided.
        size: usize,
        /// Minimum required.
        minimum: usize,
    },

    /// The same party id appears more than once.
    #[error("duplicate party id in committee: {0}")]
    DuplicateParty(PartyId),

    /// A required party is not a member.
    #[error("party {0} is not a committee member")]
    NotAMember(PartyId),
}

/// The participant set used for one ceremony.
///
/// Member order is preserved as received: a joiner adopts the
/// server-returned list verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committee {
    members: Vec<PartyId>,
}

impl Committee {
    /// Build a committee, rejecting undersized or duplicated member lists.
    pub fn new(members: Vec<PartyId>) -> Result<Self, CommitteeError> {
        if members.len() < MIN_COMMITTEE_SIZE {
            return Err(CommitteeError::TooSmall {
                size: members.len(),
                minimum: MIN_COMMITTEE_SIZE,
            });
        }
        for (i, member) in members.iter().enumerate() {
            if members[..i].contains(member) {
                return Err(CommitteeError::DuplicateParty(member.clone()));
            }
        }
        Ok(Self { members })
    }

    /// The committee members, in received order.
    pub fn members(&self) -> &[PartyId] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the committee is empty (never true for a validated committee).
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `party` is a member.
    pub fn contains(&self, party: &str) -> bool {
        self.members.iter().any(|m| m == party)
    }

    /// Error unless `party` is a member.
    pub fn require_member(&self, party: &str) -> Result<(), CommitteeError> {
        if self.contains(party) {
            Ok(())
        } else {
            Err(CommitteeError::NotAMember(party.to_string()))
        }
    }

    /// Members other than `party`, in committee order.
    pub fn peers_of(&self, party: &str) -> Vec<PartyId> {
        self.members
            .iter()
            .filter(|m| m.as_str() != party)
            .cloned()
            .collect()
    }
}
