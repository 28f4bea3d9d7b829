//! In-memory mediator for tests and local simulation.
//!
//! Implements the same contract as the HTTP client against process-local
//! state. Pulls intentionally redeliver: a pulled message stays in the
//! mailbox, matching a mediator without a delete route, so relay-side
//! deduplication is exercised by every test that runs on top of this.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use tessera_types::PartyId;

use crate::{client::MediatorClient, MediatorError, Result};

#[derive(Default)]
struct SessionState {
    parties: Vec<PartyId>,
    committee: Option<Vec<PartyId>>,
    mailboxes: HashMap<PartyId, Vec<String>>,
    completions: Vec<PartyId>,
}

/// A mediator living entirely in process memory.
#[derive(Default)]
pub struct InMemoryMediator {
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl InMemoryMediator {
    /// Create an empty mediator.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_session<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(Option<&mut SessionState>) -> T,
    ) -> T {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        f(sessions.get_mut(session_id))
    }

    /// Drop every message queued for a party (test helper).
    pub fn clear_mailbox(&self, session_id: &str, party_id: &str) {
        self.with_session(session_id, |state| {
            if let Some(state) = state {
                state.mailboxes.remove(party_id);
            }
        });
    }
}

#[async_trait]
impl MediatorClient for InMemoryMediator {
    async fn register(&self, session_id: &str, party_id: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let state = sessions.entry(session_id.to_string()).or_default();
        if state.parties.iter().any(|p| p == party_id) {
            // Party id collisions are rejected.
            return Err(MediatorError::Rejected { status: 409 });
        }
        state.parties.push(party_id.to_string());
        Ok(())
    }

    async fn participants(&self, session_id: &str) -> Result<Vec<PartyId>> {
        Ok(self.with_session(session_id, |state| {
            state.map(|s| s.parties.clone()).unwrap_or_default()
        }))
    }

    async fn start(&self, session_id: &str, committee: &[PartyId]) -> Result<()> {
        self.with_session(session_id, |state| match state {
            Some(state) => {
                state.committee = Some(committee.to_vec());
                Ok(())
            }
            None => Err(MediatorError::Transport(format!(
                "unknown session {session_id}"
            ))),
        })
    }

    async fn poll_start(&self, session_id: &str) -> Result<Option<Vec<PartyId>>> {
        Ok(self.with_session(session_id, |state| {
            state.and_then(|s| s.committee.clone())
        }))
    }

    async fn push_message(&self, session_id: &str, to_party: &str, body: &str) -> Result<()> {
        self.with_session(session_id, |state| match state {
            Some(state) => {
                state
                    .mailboxes
                    .entry(to_party.to_string())
                    .or_default()
                    .push(body.to_string());
                Ok(())
            }
            None => Err(MediatorError::Transport(format!(
                "unknown session {session_id}"
            ))),
        })
    }

    async fn pull_messages(&self, session_id: &str, party_id: &str) -> Result<Vec<String>> {
        Ok(self.with_session(session_id, |state| {
            state
                .and_then(|s| s.mailboxes.get(party_id).cloned())
                .unwrap_or_default()
        }))
    }

    async fn mark_complete(&self, session_id: &str, party_id: &str) -> Result<()> {
        self.with_session(session_id, |state| match state {
            Some(state) => {
                if !state.completions.iter().any(|p| p == party_id) {
                    state.completions.push(party_id.to_string());
                }
                Ok(())
            }
            None => Err(MediatorError::Transport(format!(
                "unknown session {session_id}"
            ))),
        })
    }

    async fn completions(&self, session_id: &str) -> Result<Vec<PartyId>> {
        Ok(self.with_session(session_id, |state| {
            state.map(|s| s.completions.clone()).unwrap_or_default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_list() {
        let mediator = InMemoryMediator::new();
        mediator.register("S1", "dev-A").await.expect("register A");
        mediator.register("S1", "dev-B").await.expect("register B");

        let parties = mediator.participants("S1").await.expect("participants");
        assert_eq!(parties, vec!["dev-A".to_string(), "dev-B".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_party_rejected() {
        let mediator = InMemoryMediator::new();
        mediator.register("S1", "dev-A").await.expect("register");
        let result = mediator.register("S1", "dev-A").await;
        assert!(matches!(
            result,
            Err(MediatorError::Rejected { status: 409 })
        ));
    }

    #[tokio::test]
    async fn test_unknown_session_lists_empty() {
        let mediator = InMemoryMediator::new();
        assert!(mediator
            .participants("nope")
            .await
            .expect("participants")
            .is_empty());
        assert!(mediator
            .poll_start("nope")
            .await
            .expect("poll_start")
            .is_none());
        assert!(mediator
            .completions("nope")
            .await
            .expect("completions")
            .is_empty());
    }

    #[tokio::test]
    async fn test_start_and_poll() {
        let mediator = InMemoryMediator::new();
        mediator.register("S1", "dev-A").await.expect("register");
        assert!(mediator.poll_start("S1").await.expect("poll").is_none());

        let committee = vec!["dev-A".to_string(), "dev-B".to_string()];
        mediator.start("S1", &committee).await.expect("start");
        assert_eq!(
            mediator.poll_start("S1").await.expect("poll"),
            Some(committee)
        );
    }

    #[tokio::test]
    async fn test_pull_redelivers() {
        let mediator = InMemoryMediator::new();
        mediator.register("S1", "dev-A").await.expect("register");
        mediator
            .push_message("S1", "dev-B", "body-1")
            .await
            .expect("push");

        let first = mediator.pull_messages("S1", "dev-B").await.expect("pull");
        let second = mediator.pull_messages("S1", "dev-B").await.expect("pull");
        assert_eq!(first, vec!["body-1".to_string()]);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_completions_deduplicated() {
        let mediator = InMemoryMediator::new();
        mediator.register("S1", "dev-A").await.expect("register");
        mediator.mark_complete("S1", "dev-A").await.expect("mark");
        mediator.mark_complete("S1", "dev-A").await.expect("mark");
        assert_eq!(
            mediator.completions("S1").await.expect("completions"),
            vec!["dev-A".to_string()]
        );
    }
}
