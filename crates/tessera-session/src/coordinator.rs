//! Participant discovery, committee freeze and start-wait.
//!
//! The initiator mints the session, registers itself, watches the
//! participant list grow, and freezes the committee with the start call —
//! that server-recorded committee is what the completion gate later checks
//! against. Joiners register once they have resolved the mediator address
//! and then poll the start endpoint until they appear in the frozen
//! committee; joiners never decide membership themselves.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use tessera_mediator::MediatorClient;
use tessera_types::session::{Committee, PartyRole, Session};
use tessera_types::PartyId;

use crate::{Result, SessionConfig, SessionError};

/// Cap on the failure backoff multiplier for the start-wait poll.
const MAX_BACKOFF_MULTIPLIER: u32 = 8;

/// Coordinates one device's participation in a session.
pub struct SessionCoordinator {
    client: Arc<dyn MediatorClient>,
    session: Arc<Session>,
    local_party: PartyId,
    role: PartyRole,
    config: SessionConfig,
}

impl SessionCoordinator {
    /// Create a coordinator for the local party.
    pub fn new(
        client: Arc<dyn MediatorClient>,
        session: Arc<Session>,
        local_party: impl Into<PartyId>,
        role: PartyRole,
    ) -> Self {
        Self::with_config(client, session, local_party, role, SessionConfig::default())
    }

    /// Create a coordinator with explicit loop tuning.
    pub fn with_config(
        client: Arc<dyn MediatorClient>,
        session: Arc<Session>,
        local_party: impl Into<PartyId>,
        role: PartyRole,
        config: SessionConfig,
    ) -> Self {
        Self {
            client,
            session,
            local_party: local_party.into(),
            role,
            config,
        }
    }

    /// The local party id.
    pub fn local_party(&self) -> &str {
        &self.local_party
    }

    /// Register the local party with the mediator, creating the session
    /// server-side if this is the first registration.
    pub async fn register(&self) -> Result<()> {
        self.client
            .register(&self.session.session_id, &self.local_party)
            .await?;
        tracing::info!(
            session_id = %self.session.session_id,
            party = %self.local_party,
            role = ?self.role,
            "joined session"
        );
        Ok(())
    }

    /// Start the participant discovery loop.
    ///
    /// Every newly seen party id other than the local one is sent over
    /// the returned channel exactly once. A 404 from the mediator means
    /// "no participants yet"; transport errors are logged and retried.
    /// The loop runs until the returned handle is stopped.
    pub fn spawn_discovery(&self) -> (PeerDiscovery, mpsc::UnboundedReceiver<PartyId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let client = Arc::clone(&self.client);
        let session_id = self.session.session_id.clone();
        let local_party = self.local_party.clone();
        let interval = Duration::from_millis(self.config.poll_interval_ms.max(1));

        let task = tokio::spawn(async move {
            let mut seen: HashSet<PartyId> = HashSet::new();
            seen.insert(local_party.clone());

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = tokio::time::sleep(interval) => {
                        match client.participants(&session_id).await {
                            Ok(parties) => {
                                for party in parties {
                                    if seen.insert(party.clone()) {
                                        tracing::info!(session_id = %session_id, peer = %party, "discovered peer");
                                        if tx.send(party).is_err() {
                                            tracing::debug!("discovery receiver dropped; stopping loop");
                                            return;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::warn!(session_id = %session_id, error = %e, "participant poll failed; retrying");
                            }
                        }
                    }
                }
            }
            tracing::debug!(session_id = %session_id, "peer discovery stopped");
        });

        (
            PeerDiscovery {
                shutdown: Some(shutdown_tx),
                task: Some(task),
            },
            rx,
        )
    }

    /// Freeze the committee and start the ceremony (initiator only).
    ///
    /// The committee must include the local party; the list sent here is
    /// the authoritative membership for the whole ceremony.
    pub async fn start_ceremony(&self, committee: &Committee) -> Result<()> {
        if self.role != PartyRole::Initiator {
            return Err(SessionError::NotInitiator {
                role: format!("{:?}", self.role),
            });
        }
        committee.require_member(&self.local_party)?;

        self.client
            .start(&self.session.session_id, committee.members())
            .await?;
        Ok(())
    }

    /// Wait for the initiator to start the ceremony (joiner side).
    ///
    /// Polls until the server returns a committee that includes the local
    /// party and adopts that list verbatim. Retries indefinitely with a
    /// backoff that grows on consecutive failures; the caller cancels by
    /// dropping the future or wrapping it in a timeout.
    pub async fn wait_for_start(&self) -> Result<Committee> {
        let base_interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let mut failures: u32 = 0;

        loop {
            match self.client.poll_start(&self.session.session_id).await {
                Ok(Some(members)) if members.iter().any(|m| m == &self.local_party) => {
                    match Committee::new(members) {
                        Ok(committee) => {
                            tracing::info!(
                                session_id = %self.session.session_id,
                                members = committee.len(),
                                "ceremony started; committee adopted"
                            );
                            return Ok(committee);
                        }
                        Err(e) => {
                            // Malformed committee; treat as not started yet.
                            tracing::warn!(session_id = %self.session.session_id, error = %e, "discarding invalid committee");
                        }
                    }
                    failures = 0;
                }
                Ok(Some(_)) => {
                    tracing::debug!(
                        session_id = %self.session.session_id,
                        "committee frozen without local party; waiting"
                    );
                    failures = 0;
                }
                Ok(None) => {
                    failures = 0;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    tracing::warn!(
                        session_id = %self.session.session_id,
                        consecutive_failures = failures,
                        error = %e,
                        "start poll failed; retrying"
                    );
                }
            }

            let multiplier = 1u32 << failures.min(MAX_BACKOFF_MULTIPLIER.trailing_zeros());
            tokio::time::sleep(base_interval * multiplier).await;
        }
    }
}

/// Stop handle for the discovery loop.
pub struct PeerDiscovery {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PeerDiscovery {
    /// Signal shutdown and wait for the loop, including any in-flight
    /// poll, to finish. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "discovery task ended abnormally");
            }
        }
    }
}
