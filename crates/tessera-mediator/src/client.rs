//! The mediator REST contract as an object-safe trait.
//!
//! | Operation         | Route                              | Not-ready |
//! |-------------------|------------------------------------|-----------|
//! | Register/join     | `POST /{sessionId}`                | —         |
//! | List participants | `GET /{sessionId}`                 | 404       |
//! | Start ceremony    | `POST /start/{sessionId}`          | —         |
//! | Poll start        | `GET /start/{sessionId}`           | 404       |
//! | Push message      | `POST /message/{sessionId}/{party}`| —         |
//! | Pull messages     | `GET /message/{sessionId}/{party}` | 404/empty |
//! | Mark complete     | `POST /complete/{sessionId}`       | —         |
//! | Poll completion   | `GET /complete/{sessionId}`        | 404       |
//!
//! "Not-ready" responses map to empty/`None` results, never errors: a
//! session with no registered parties yet is a normal polling state.

use async_trait::async_trait;

use tessera_types::PartyId;

use crate::Result;

/// Uniform client for the mediator's REST surface.
///
/// Implementations carry no protocol knowledge; message bodies are opaque
/// strings (JSON envelopes with encrypted payloads, produced elsewhere).
#[async_trait]
pub trait MediatorClient: Send + Sync {
    /// Register the local party under a session, creating the session
    /// server-side if it does not exist yet.
    async fn register(&self, session_id: &str, party_id: &str) -> Result<()>;

    /// List currently registered parties. Not-ready means empty.
    async fn participants(&self, session_id: &str) -> Result<Vec<PartyId>>;

    /// Freeze the committee and start the ceremony (initiator only).
    async fn start(&self, session_id: &str, committee: &[PartyId]) -> Result<()>;

    /// Poll for the frozen committee. `None` until the initiator starts.
    async fn poll_start(&self, session_id: &str) -> Result<Option<Vec<PartyId>>>;

    /// Push one opaque message body to a party's mailbox.
    async fn push_message(&self, session_id: &str, to_party: &str, body: &str) -> Result<()>;

    /// Pull pending message bodies for a party. The same message may be
    /// observed on consecutive pulls; callers deduplicate.
    async fn pull_messages(&self, session_id: &str, party_id: &str) -> Result<Vec<String>>;

    /// Record the local party's successful completion.
    async fn mark_complete(&self, session_id: &str, party_id: &str) -> Result<()>;

    /// List parties that have recorded completion. Not-ready means empty.
    async fn completions(&self, session_id: &str) -> Result<Vec<PartyId>>;
}
