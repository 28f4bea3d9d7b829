//! Pull loop and outbound handle.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use tessera_crypto::payload;
use tessera_mediator::MediatorClient;
use tessera_types::message::{MessageEnvelope, Recipient};
use tessera_types::session::Session;
use tessera_types::PartyId;

use crate::{InboundMessage, RelayConfig, RelayError, Result};

/// Outbound side of the relay, handed to the MPC engine.
///
/// Cloneable; all clones share one monotonic sequence counter, so every
/// message this party sends in a ceremony attempt carries a unique
/// sequence number.
#[derive(Clone)]
pub struct RelayHandle {
    client: Arc<dyn MediatorClient>,
    session: Arc<Session>,
    local_party: PartyId,
    peers: Vec<PartyId>,
    sequence: Arc<AtomicU64>,
}

impl RelayHandle {
    /// Seal and push one outbound protocol message.
    ///
    /// Unicast issues a single push; broadcast fans out to every
    /// committee member except the local party, one push per recipient.
    pub async fn send(&self, to: Recipient, plaintext: &[u8]) -> Result<()> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let sealed = payload::seal(&self.session.encryption_key, plaintext)?;
        let envelope = MessageEnvelope {
            session_id: self.session.session_id.clone(),
            from_party: self.local_party.clone(),
            to_party: to.clone(),
            sequence,
            payload: sealed,
        };
        let body = envelope
            .to_wire()
            .map_err(|e| RelayError::Serialization(e.to_string()))?;

        match &to {
            Recipient::Unicast(party) => {
                self.client
                    .push_message(&self.session.session_id, party, &body)
                    .await?;
                tracing::debug!(to = %party, sequence, "pushed unicast message");
            }
            Recipient::Broadcast => {
                for party in &self.peers {
                    self.client
                        .push_message(&self.session.session_id, party, &body)
                        .await?;
                }
                tracing::debug!(
                    recipients = self.peers.len(),
                    sequence,
                    "pushed broadcast message"
                );
            }
        }
        Ok(())
    }

    /// The committee members this handle fans broadcasts out to.
    pub fn peers(&self) -> &[PartyId] {
        &self.peers
    }
}

/// The background relay for one ceremony attempt.
pub struct MessageRelay {
    handle: RelayHandle,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MessageRelay {
    /// Start the pull loop and return the owned relay.
    ///
    /// Decrypted inbound messages are forwarded to `inbound`; the loop
    /// polls every [`RelayConfig::poll_interval_ms`] and deduplicates by
    /// `(from_party, sequence)` since the mediator may redeliver.
    pub fn spawn(
        client: Arc<dyn MediatorClient>,
        session: Arc<Session>,
        local_party: PartyId,
        committee_members: &[PartyId],
        inbound: mpsc::UnboundedSender<InboundMessage>,
        config: RelayConfig,
    ) -> Self {
        let peers: Vec<PartyId> = committee_members
            .iter()
            .filter(|m| *m != &local_party)
            .cloned()
            .collect();

        let handle = RelayHandle {
            client: Arc::clone(&client),
            session: Arc::clone(&session),
            local_party: local_party.clone(),
            peers,
            sequence: Arc::new(AtomicU64::new(0)),
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(pull_loop(
            client,
            session,
            local_party,
            inbound,
            config,
            shutdown_rx,
        ));

        Self {
            handle,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Outbound handle for the MPC engine.
    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    /// Signal shutdown and wait for the pull loop to finish.
    ///
    /// Idempotent; a second call is a no-op.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "relay pull task ended abnormally");
            }
        }
    }
}

async fn pull_loop(
    client: Arc<dyn MediatorClient>,
    session: Arc<Session>,
    local_party: PartyId,
    inbound: mpsc::UnboundedSender<InboundMessage>,
    config: RelayConfig,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut seen: HashSet<(PartyId, u64)> = HashSet::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(config.poll_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::debug!(
        session_id = %session.session_id,
        party = %local_party,
        "relay pull loop started"
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                match client.pull_messages(&session.session_id, &local_party).await {
                    Ok(bodies) => {
                        for body in bodies {
                            deliver(&session, &mut seen, &inbound, &body);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "relay pull failed; retrying");
                    }
                }
            }
        }
    }

    tracing::debug!(
        session_id = %session.session_id,
        party = %local_party,
        "relay pull loop stopped"
    );
}

/// Parse, dedup, decrypt and forward one pulled body.
fn deliver(
    session: &Session,
    seen: &mut HashSet<(PartyId, u64)>,
    inbound: &mpsc::UnboundedSender<InboundMessage>,
    body: &str,
) {
    let envelope = match MessageEnvelope::from_wire(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed relayed message");
            return;
        }
    };

    let key = envelope.dedup_key();
    if seen.contains(&key) {
        tracing::debug!(
            from = %key.0,
            sequence = key.1,
            "dropping redelivered message"
        );
        return;
    }

    let plaintext = match payload::open(&session.encryption_key, &envelope.payload) {
        Ok(plaintext) => plaintext,
        Err(e) => {
            tracing::warn!(from = %envelope.from_party, error = %e, "dropping undecryptable message");
            return;
        }
    };

    seen.insert(key);
    let message = InboundMessage {
        from_party: envelope.from_party,
        sequence: envelope.sequence,
        payload: plaintext,
    };
    if inbound.send(message).is_err() {
        tracing::debug!("engine inbound sink closed; discarding message");
    }
}

#[cfg(test)]
mod tests {
    use tessera_mediator::memory::InMemoryMediator;
    use tessera_types::session::CeremonyKind;

    use super::*;

    const KEY: [u8; 32] = [0x42u8; 32];

    fn make_session() -> Arc<Session> {
        Arc::new(Session {
            session_id: "S1".to_string(),
            mediator_address: "memory".to_string(),
            encryption_key: KEY,
            kind: CeremonyKind::Keygen,
        })
    }

    fn test_config() -> RelayConfig {
        RelayConfig {
            poll_interval_ms: 10,
        }
    }

    async fn make_mediator(parties: &[&str]) -> Arc<InMemoryMediator> {
        let mediator = Arc::new(InMemoryMediator::new());
        for party in parties {
            mediator.register("S1", party).await.expect("register");
        }
        mediator
    }

    fn committee(members: &[&str]) -> Vec<PartyId> {
        members.iter().map(|m| m.to_string()).collect()
    }

    #[tokio::test]
    async fn test_unicast_delivery() {
        let mediator = make_mediator(&["dev-A", "dev-B"]).await;
        let session = make_session();
        let members = committee(&["dev-A", "dev-B"]);

        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let mut relay_b = MessageRelay::spawn(
            mediator.clone(),
            session.clone(),
            "dev-B".to_string(),
            &members,
            tx_b,
            test_config(),
        );

        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let mut relay_a = MessageRelay::spawn(
            mediator.clone(),
            session.clone(),
            "dev-A".to_string(),
            &members,
            tx_a,
            test_config(),
        );

        relay_a
            .handle()
            .send(Recipient::Unicast("dev-B".to_string()), b"round-1")
            .await
            .expect("send");

        let received = rx_b.recv().await.expect("inbound");
        assert_eq!(received.from_party, "dev-A");
        assert_eq!(received.sequence, 0);
        assert_eq!(received.payload, b"round-1");

        relay_a.stop().await;
        relay_b.stop().await;
    }

    #[tokio::test]
    async fn test_idempotent_delivery() {
        let mediator = make_mediator(&["dev-A", "dev-B"]).await;
        let session = make_session();
        let members = committee(&["dev-A", "dev-B"]);

        // Craft one envelope and push the identical body twice.
        let sealed = payload::seal(&KEY, b"dup-payload").expect("seal");
        let envelope = MessageEnvelope {
            session_id: "S1".to_string(),
            from_party: "dev-A".to_string(),
            to_party: Recipient::Unicast("dev-B".to_string()),
            sequence: 5,
            payload: sealed,
        };
        let body = envelope.to_wire().expect("wire");
        mediator
            .push_message("S1", "dev-B", &body)
            .await
            .expect("push");
        mediator
            .push_message("S1", "dev-B", &body)
            .await
            .expect("push");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut relay = MessageRelay::spawn(
            mediator.clone(),
            session,
            "dev-B".to_string(),
            &members,
            tx,
            test_config(),
        );

        let first = rx.recv().await.expect("first delivery");
        assert_eq!(first.payload, b"dup-payload");

        // Several more polls (which all redeliver) must not produce a second copy.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err());

        relay.stop().await;
    }

    #[tokio::test]
    async fn test_broadcast_fan_out() {
        let mediator = make_mediator(&["dev-A", "dev-B", "dev-C"]).await;
        let session = make_session();
        let members = committee(&["dev-A", "dev-B", "dev-C"]);

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut relay = MessageRelay::spawn(
            mediator.clone(),
            session,
            "dev-A".to_string(),
            &members,
            tx,
            test_config(),
        );

        relay
            .handle()
            .send(Recipient::Broadcast, b"to-everyone")
            .await
            .expect("send");

        // K-1 unicast pushes for a committee of K.
        let b = mediator.pull_messages("S1", "dev-B").await.expect("pull");
        let c = mediator.pull_messages("S1", "dev-C").await.expect("pull");
        let a = mediator.pull_messages("S1", "dev-A").await.expect("pull");
        assert_eq!(b.len(), 1);
        assert_eq!(c.len(), 1);
        assert!(a.is_empty());

        relay.stop().await;
    }

    #[tokio::test]
    async fn test_sequence_monotonic_across_clones() {
        let mediator = make_mediator(&["dev-A", "dev-B"]).await;
        let session = make_session();
        let members = committee(&["dev-A", "dev-B"]);

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut relay = MessageRelay::spawn(
            mediator.clone(),
            session,
            "dev-A".to_string(),
            &members,
            tx,
            test_config(),
        );

        let h1 = relay.handle();
        let h2 = relay.handle();
        h1.send(Recipient::Unicast("dev-B".to_string()), b"m0")
            .await
            .expect("send");
        h2.send(Recipient::Unicast("dev-B".to_string()), b"m1")
            .await
            .expect("send");

        let bodies = mediator.pull_messages("S1", "dev-B").await.expect("pull");
        let sequences: Vec<u64> = bodies
            .iter()
            .map(|b| MessageEnvelope::from_wire(b).expect("parse").sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1]);

        relay.stop().await;
    }

    #[tokio::test]
    async fn test_malformed_and_foreign_key_bodies_dropped() {
        let mediator = make_mediator(&["dev-A", "dev-B"]).await;
        let session = make_session();
        let members = committee(&["dev-A", "dev-B"]);

        mediator
            .push_message("S1", "dev-B", "{definitely not an envelope")
            .await
            .expect("push");

        // Sealed under a different session key: parses but fails to open.
        let sealed = payload::seal(&[0x99u8; 32], b"secret").expect("seal");
        let envelope = MessageEnvelope {
            session_id: "S1".to_string(),
            from_party: "dev-A".to_string(),
            to_party: Recipient::Unicast("dev-B".to_string()),
            sequence: 0,
            payload: sealed,
        };
        mediator
            .push_message("S1", "dev-B", &envelope.to_wire().expect("wire"))
            .await
            .expect("push");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut relay = MessageRelay::spawn(
            mediator.clone(),
            session,
            "dev-B".to_string(),
            &members,
            tx,
            test_config(),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err());

        relay.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mediator = make_mediator(&["dev-A", "dev-B"]).await;
        let session = make_session();
        let members = committee(&["dev-A", "dev-B"]);

        let (tx, _rx) = mpsc::unbounded_channel();
        let mut relay = MessageRelay::spawn(
            mediator,
            session,
            "dev-A".to_string(),
            &members,
            tx,
            test_config(),
        );

        relay.stop().await;
        relay.stop().await;
    }
}
