//! Completion quorum gate.
//!
//! Local success is not ceremony success: the split key is only usable if
//! every member of the started committee finished. After its phases
//! complete, each device publishes a completion record and then polls the
//! completion list until it covers the whole committee or the timeout
//! elapses. A `false` from [`CompletionGate::await_quorum`] means the
//! ceremony failed and its result must be discarded, even though the
//! local phases succeeded.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use tessera_mediator::MediatorClient;
use tessera_types::session::Committee;
use tessera_types::PartyId;

use crate::{Result, SessionConfig, QUORUM_TIMEOUT_SECS};

/// Publishes and checks completion records for one session.
pub struct CompletionGate {
    client: Arc<dyn MediatorClient>,
    session_id: String,
    local_party: PartyId,
    poll_interval: Duration,
}

impl CompletionGate {
    /// Create a gate for the local party.
    pub fn new(
        client: Arc<dyn MediatorClient>,
        session_id: impl Into<String>,
        local_party: impl Into<PartyId>,
    ) -> Self {
        Self::with_config(client, session_id, local_party, SessionConfig::default())
    }

    /// Create a gate with explicit loop tuning.
    pub fn with_config(
        client: Arc<dyn MediatorClient>,
        session_id: impl Into<String>,
        local_party: impl Into<PartyId>,
        config: SessionConfig,
    ) -> Self {
        Self {
            client,
            session_id: session_id.into(),
            local_party: local_party.into(),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        }
    }

    /// The default quorum timeout.
    pub fn default_timeout() -> Duration {
        Duration::from_secs(QUORUM_TIMEOUT_SECS)
    }

    /// Publish the local party's completion record.
    pub async fn mark_local_complete(&self) -> Result<()> {
        self.client
            .mark_complete(&self.session_id, &self.local_party)
            .await?;
        Ok(())
    }

    /// Poll until every committee member has recorded completion or the
    /// timeout elapses.
    ///
    /// Returns `true` iff the completed set is a superset of `committee`
    /// before the deadline. Completions from parties outside the
    /// committee are irrelevant either way. Transport errors are logged
    /// and retried within the deadline.
    pub async fn await_quorum(&self, committee: &Committee, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            match self.client.completions(&self.session_id).await {
                Ok(completed) => {
                    let missing: Vec<&PartyId> = committee
                        .members()
                        .iter()
                        .filter(|m| !completed.contains(m))
                        .collect();
                    if missing.is_empty() {
                        tracing::info!(
                            session_id = %self.session_id,
                            members = committee.len(),
                            "completion quorum reached"
                        );
                        return true;
                    }
                    tracing::debug!(
                        session_id = %self.session_id,
                        missing = missing.len(),
                        "awaiting completion quorum"
                    );
                }
                Err(e) => {
                    tracing::warn!(session_id = %self.session_id, error = %e, "completion poll failed; retrying");
                }
            }

            if Instant::now() + self.poll_interval > deadline {
                tracing::warn!(
                    session_id = %self.session_id,
                    "completion quorum timed out"
                );
                return false;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use tessera_mediator::memory::InMemoryMediator;

    use super::*;

    fn fast_config() -> SessionConfig {
        SessionConfig {
            poll_interval_ms: 10,
        }
    }

    fn gate(mediator: &Arc<InMemoryMediator>, party: &str) -> CompletionGate {
        CompletionGate::with_config(
            mediator.clone() as Arc<dyn MediatorClient>,
            "S1",
            party,
            fast_config(),
        )
    }

    async fn setup(parties: &[&str]) -> Arc<InMemoryMediator> {
        let mediator = Arc::new(InMemoryMediator::new());
        for party in parties {
            mediator.register("S1", party).await.expect("register");
        }
        mediator
    }

    fn committee(members: &[&str]) -> Committee {
        Committee::new(members.iter().map(|m| m.to_string()).collect()).expect("committee")
    }

    #[tokio::test]
    async fn test_quorum_reached_when_all_complete() {
        let mediator = setup(&["dev-A", "dev-B", "dev-C"]).await;
        for party in ["dev-A", "dev-B", "dev-C"] {
            gate(&mediator, party)
                .mark_local_complete()
                .await
                .expect("mark");
        }

        let reached = gate(&mediator, "dev-A")
            .await_quorum(&committee(&["dev-A", "dev-B", "dev-C"]), Duration::from_secs(1))
            .await;
        assert!(reached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quorum_false_when_member_missing() {
        let mediator = setup(&["dev-A", "dev-B"]).await;
        gate(&mediator, "dev-A")
            .mark_local_complete()
            .await
            .expect("mark");

        // dev-B never completes.
        let reached = gate(&mediator, "dev-A")
            .await_quorum(&committee(&["dev-A", "dev-B"]), Duration::from_secs(60))
            .await;
        assert!(!reached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_completions_do_not_satisfy_quorum() {
        let mediator = setup(&["dev-A", "dev-B", "dev-X", "dev-Y"]).await;
        // Plenty of completions, but dev-B is still missing.
        for party in ["dev-A", "dev-X", "dev-Y"] {
            gate(&mediator, party)
                .mark_local_complete()
                .await
                .expect("mark");
        }

        let reached = gate(&mediator, "dev-A")
            .await_quorum(&committee(&["dev-A", "dev-B"]), Duration::from_secs(60))
            .await;
        assert!(!reached);
    }

    #[tokio::test]
    async fn test_quorum_reached_while_waiting() {
        let mediator = setup(&["dev-A", "dev-B"]).await;
        gate(&mediator, "dev-A")
            .mark_local_complete()
            .await
            .expect("mark");

        let waiter = {
            let mediator = mediator.clone();
            tokio::spawn(async move {
                gate(&mediator, "dev-A")
                    .await_quorum(&committee(&["dev-A", "dev-B"]), Duration::from_secs(5))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        gate(&mediator, "dev-B")
            .mark_local_complete()
            .await
            .expect("mark");

        assert!(waiter.await.expect("join"));
    }
}
