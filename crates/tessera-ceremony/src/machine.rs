//! The two-phase ceremony state machine.
//!
//! One run drives `CreatingEngine -> Phase1 (ECDSA) -> Phase2 (EdDSA)`
//! to `Success` or `Failed`. A failure in either phase restarts the whole
//! pair: the attempt's relay is stopped, a fresh relay and a fresh engine
//! are created, and the phases run again, up to the configured attempt
//! bound. After both phases succeed locally the machine hands off to the
//! completion gate; a missed quorum is a failed ceremony regardless of
//! local success.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use tessera_mediator::MediatorClient;
use tessera_relay::MessageRelay;
use tessera_session::completion::CompletionGate;
use tessera_session::coordinator::SessionCoordinator;
use tessera_session::SessionConfig;
use tessera_types::message::KeyKind;
use tessera_types::session::{CeremonyKind, Committee, CommitteeError, Session};
use tessera_types::PartyId;

use crate::engine::{EngineBinding, EngineFactory, PhaseOutput, PhaseParams};
use crate::{CeremonyConfig, CeremonyError, Result};

/// Where a running ceremony currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CeremonyPhase {
    /// Building the relay and the attempt's engine.
    CreatingEngine,
    /// Generating the ECDSA-family key.
    Phase1,
    /// Generating the EdDSA-family key.
    Phase2,
    /// Both phases done and quorum confirmed.
    Success,
    /// Attempts exhausted or quorum missed.
    Failed,
}

impl std::fmt::Display for CeremonyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CeremonyPhase::CreatingEngine => write!(f, "creating-engine"),
            CeremonyPhase::Phase1 => write!(f, "phase1-ecdsa"),
            CeremonyPhase::Phase2 => write!(f, "phase2-eddsa"),
            CeremonyPhase::Success => write!(f, "success"),
            CeremonyPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Key material the device holds before the ceremony.
///
/// Empty for a first keygen. For a reshare it carries the public keys
/// being rotated, the reshare chain prefix from the previous ceremony,
/// and the current key epoch.
#[derive(Clone, Debug, Default)]
pub struct LocalShares {
    /// Existing ECDSA-family public key, if any.
    pub ecdsa_public_key: Option<Vec<u8>>,
    /// Existing EdDSA-family public key, if any.
    pub eddsa_public_key: Option<Vec<u8>>,
    /// Reshare chain prefix from the last successful ceremony.
    pub reshare_prefix: Option<String>,
    /// Monotonic epoch of the key; bumped by each successful reshare.
    pub key_epoch: u64,
}

/// Result of a successful ceremony.
#[derive(Clone, Debug)]
pub struct CeremonyOutcome {
    /// Public key from the ECDSA phase.
    pub ecdsa_public_key: Vec<u8>,
    /// Public key from the EdDSA phase.
    pub eddsa_public_key: Vec<u8>,
    /// Key epoch after this ceremony.
    pub key_epoch: u64,
}

/// Drives one device through a full ceremony.
pub struct CeremonyStateMachine {
    client: Arc<dyn MediatorClient>,
    session: Arc<Session>,
    local_party: PartyId,
    committee: Committee,
    old_committee: Option<Committee>,
    shares: LocalShares,
    factory: Arc<dyn EngineFactory>,
    config: CeremonyConfig,
}

impl CeremonyStateMachine {
    /// Build a machine for the local party over a frozen committee.
    ///
    /// The local party must belong to the committee it acts under: the
    /// new committee, or for a reshare alternatively the old one (a
    /// retiring device participates without receiving a new share).
    pub fn new(
        client: Arc<dyn MediatorClient>,
        session: Arc<Session>,
        local_party: impl Into<PartyId>,
        committee: Committee,
        shares: LocalShares,
        factory: Arc<dyn EngineFactory>,
    ) -> std::result::Result<Self, CommitteeError> {
        Self::with_config(
            client,
            session,
            local_party,
            committee,
            shares,
            factory,
            CeremonyConfig::default(),
        )
    }

    /// Build a machine with explicit tuning.
    pub fn with_config(
        client: Arc<dyn MediatorClient>,
        session: Arc<Session>,
        local_party: impl Into<PartyId>,
        committee: Committee,
        shares: LocalShares,
        factory: Arc<dyn EngineFactory>,
        config: CeremonyConfig,
    ) -> std::result::Result<Self, CommitteeError> {
        let local_party = local_party.into();

        let old_committee = match &session.kind {
            CeremonyKind::Keygen => None,
            CeremonyKind::Reshare { old_committee } => {
                Some(Committee::new(old_committee.clone())?)
            }
        };

        let in_new = committee.contains(&local_party);
        let in_old = old_committee
            .as_ref()
            .is_some_and(|old| old.contains(&local_party));
        if !in_new && !in_old {
            committee.require_member(&local_party)?;
        }

        Ok(Self {
            client,
            session,
            local_party,
            committee,
            old_committee,
            shares,
            factory,
            config,
        })
    }

    /// Run the ceremony to a terminal outcome.
    ///
    /// Consumes the machine; a failed ceremony is retried by building a
    /// new one.
    pub async fn run(self) -> Result<CeremonyOutcome> {
        let attempts = self.config.max_attempts.max(1);
        let inter_phase = Duration::from_millis(self.config.inter_phase_delay_ms);

        let mut relay: Option<MessageRelay> = None;
        let mut outputs: Option<(PhaseOutput, PhaseOutput)> = None;
        let mut last_failure = (KeyKind::Ecdsa, "engine never ran".to_string());

        for attempt in 1..=attempts {
            if let Some(mut previous) = relay.take() {
                previous.stop().await;
            }

            tracing::info!(
                session_id = %self.session.session_id,
                kind = %self.session.kind,
                attempt,
                max_attempts = attempts,
                phase = %CeremonyPhase::CreatingEngine,
                "starting ceremony attempt"
            );

            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let attempt_relay = MessageRelay::spawn(
                Arc::clone(&self.client),
                Arc::clone(&self.session),
                self.local_party.clone(),
                self.committee.members(),
                inbound_tx,
                self.config.relay.clone(),
            );
            let outbound = attempt_relay.handle();
            relay = Some(attempt_relay);

            let binding = EngineBinding {
                local_party: self.local_party.clone(),
                committee: self.committee.clone(),
                outbound,
                inbound: inbound_rx,
            };
            let mut engine = match self.factory.create(binding).await {
                Ok(engine) => engine,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "engine creation failed");
                    last_failure = (KeyKind::Ecdsa, e.to_string());
                    continue;
                }
            };

            let first_params = PhaseParams {
                old_committee: self.old_committee.clone(),
                existing_public_key: self.shares.ecdsa_public_key.clone(),
                reshare_prefix: self.shares.reshare_prefix.clone(),
            };
            tracing::info!(attempt, phase = %CeremonyPhase::Phase1, "phase started");
            let first = match engine.compute(KeyKind::Ecdsa, first_params).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(attempt, phase = %CeremonyPhase::Phase1, error = %e, "phase failed");
                    last_failure = (KeyKind::Ecdsa, e.to_string());
                    continue;
                }
            };

            // Let the relay drain stragglers from the first phase before
            // the second begins.
            tokio::time::sleep(inter_phase).await;

            let second_params = PhaseParams {
                old_committee: self.old_committee.clone(),
                existing_public_key: self.shares.eddsa_public_key.clone(),
                reshare_prefix: first
                    .reshare_prefix
                    .clone()
                    .or_else(|| self.shares.reshare_prefix.clone()),
            };
            tracing::info!(attempt, phase = %CeremonyPhase::Phase2, "phase started");
            match engine.compute(KeyKind::Eddsa, second_params).await {
                Ok(second) => {
                    outputs = Some((first, second));
                    break;
                }
                Err(e) => {
                    tracing::warn!(attempt, phase = %CeremonyPhase::Phase2, error = %e, "phase failed");
                    last_failure = (KeyKind::Eddsa, e.to_string());
                }
            }
        }

        if let Some(mut active) = relay.take() {
            active.stop().await;
        }

        let Some((first, second)) = outputs else {
            let (phase, reason) = last_failure;
            tracing::error!(
                session_id = %self.session.session_id,
                failed_phase = %phase,
                attempts,
                state = %CeremonyPhase::Failed,
                "ceremony attempts exhausted"
            );
            return Err(CeremonyError::PhaseFailure {
                phase,
                attempts,
                reason,
            });
        };

        let gate = CompletionGate::with_config(
            Arc::clone(&self.client),
            self.session.session_id.clone(),
            self.local_party.clone(),
            SessionConfig {
                poll_interval_ms: self.config.poll_interval_ms,
            },
        );
        if let Err(e) = gate.mark_local_complete().await {
            tracing::error!(
                session_id = %self.session.session_id,
                error = %e,
                state = %CeremonyPhase::Failed,
                "failed to publish completion"
            );
            return Err(CeremonyError::Transport(e.to_string()));
        }

        let quorum_timeout = Duration::from_secs(self.config.quorum_timeout_secs);
        if !gate.await_quorum(&self.committee, quorum_timeout).await {
            let completed = self
                .client
                .completions(&self.session.session_id)
                .await
                .unwrap_or_default();
            let missing: Vec<PartyId> = self
                .committee
                .members()
                .iter()
                .filter(|m| !completed.contains(m))
                .cloned()
                .collect();
            tracing::error!(
                session_id = %self.session.session_id,
                missing = missing.len(),
                state = %CeremonyPhase::Failed,
                "completion quorum missed"
            );
            return Err(CeremonyError::QuorumTimeout { missing });
        }

        let key_epoch = if self.old_committee.is_some() {
            self.shares.key_epoch.saturating_add(1)
        } else {
            self.shares.key_epoch
        };
        tracing::info!(
            session_id = %self.session.session_id,
            kind = %self.session.kind,
            key_epoch,
            state = %CeremonyPhase::Success,
            "ceremony complete"
        );
        Ok(CeremonyOutcome {
            ecdsa_public_key: first.public_key,
            eddsa_public_key: second.public_key,
            key_epoch,
        })
    }
}

/// Collect peers from the coordinator's discovery loop until `required`
/// have appeared or `timeout` elapses.
///
/// The discovery loop is stopped before returning either way.
pub async fn discover_peers(
    coordinator: &SessionCoordinator,
    required: usize,
    timeout: Duration,
) -> Result<Vec<PartyId>> {
    let (mut discovery, mut peers) = coordinator.spawn_discovery();
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut found = Vec::new();
    while found.len() < required {
        tokio::select! {
            _ = &mut deadline => break,
            peer = peers.recv() => match peer {
                Some(peer) => found.push(peer),
                None => break,
            },
        }
    }
    discovery.stop().await;

    if found.len() < required {
        return Err(CeremonyError::DiscoveryTimeout {
            found: found.len(),
            required,
        });
    }
    Ok(found)
}
