//! Mediator address resolution.
//!
//! Two strategies exist. [`RelayLocator`] returns a fixed, well-known
//! relay URL immediately. [`LocalLocator`] waits for the platform's
//! service-discovery collaborator to call [`DiscoverySink::on_address_resolved`]
//! and resolves to the first non-loopback IPv4 address whose advertised
//! service name matches. Later callbacks for the same service are ignored
//! once resolved.
//!
//! No timeout is enforced here; callers wrap [`ServiceLocator::resolve`]
//! in `tokio::time::timeout` as appropriate.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::{MediatorError, Result};

/// Resolves the mediator's network address for a session.
#[async_trait]
pub trait ServiceLocator: Send + Sync {
    /// Resolve to a mediator base URL (e.g., `http://192.168.1.10:18080`).
    async fn resolve(&self) -> Result<String>;
}

/// Fixed relay URL strategy.
pub struct RelayLocator {
    url: String,
}

impl RelayLocator {
    /// Create a locator that always resolves to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl ServiceLocator for RelayLocator {
    async fn resolve(&self) -> Result<String> {
        Ok(self.url.clone())
    }
}

/// Local-network discovery strategy.
///
/// Created together with its [`DiscoverySink`]; the sink is handed to the
/// platform discovery collaborator, which may invoke it any number of
/// times from any thread.
pub struct LocalLocator {
    rx: watch::Receiver<Option<String>>,
}

impl LocalLocator {
    /// Create a locator waiting for `service_name` to be discovered.
    pub fn new(service_name: impl Into<String>) -> (Self, DiscoverySink) {
        let (tx, rx) = watch::channel(None);
        let sink = DiscoverySink {
            service_name: service_name.into(),
            tx: Arc::new(tx),
        };
        (Self { rx }, sink)
    }
}

#[async_trait]
impl ServiceLocator for LocalLocator {
    async fn resolve(&self) -> Result<String> {
        let mut rx = self.rx.clone();
        let resolved = rx
            .wait_for(|addr| addr.is_some())
            .await
            .map_err(|_| MediatorError::DiscoveryClosed)?;
        // wait_for only returns once the value is Some.
        resolved
            .clone()
            .ok_or(MediatorError::DiscoveryClosed)
    }
}

/// Pure callback surface for the platform's service discovery.
///
/// Independent of any discovery API shape: the collaborator just reports
/// `(service name, address, port)` tuples as it finds them.
#[derive(Clone)]
pub struct DiscoverySink {
    service_name: String,
    tx: Arc<watch::Sender<Option<String>>>,
}

impl DiscoverySink {
    /// Report a discovered service instance.
    ///
    /// The first matching non-loopback IPv4 address wins; everything else
    /// is ignored. Safe to call repeatedly and concurrently.
    pub fn on_address_resolved(&self, service_name: &str, addr: IpAddr, port: u16) {
        if service_name != self.service_name {
            tracing::debug!(
                reported = service_name,
                expected = %self.service_name,
                "ignoring discovery callback for other service"
            );
            return;
        }
        let ipv4 = match addr {
            IpAddr::V4(v4) if !v4.is_loopback() => v4,
            _ => {
                tracing::debug!(%addr, "ignoring loopback or non-IPv4 discovery address");
                return;
            }
        };

        let url = format!("http://{ipv4}:{port}");
        let newly_resolved = self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(url.clone());
                true
            } else {
                false
            }
        });
        if newly_resolved {
            tracing::info!(service = %self.service_name, url, "mediator address resolved");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[tokio::test]
    async fn test_relay_locator_immediate() {
        let locator = RelayLocator::new("https://relay.example.com");
        let url = locator.resolve().await.expect("resolve");
        assert_eq!(url, "https://relay.example.com");
    }

    #[tokio::test]
    async fn test_local_locator_first_match_wins() {
        let (locator, sink) = LocalLocator::new("tessera-mediator");

        sink.on_address_resolved(
            "tessera-mediator",
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
            18080,
        );
        // A second callback must not overwrite the resolved address.
        sink.on_address_resolved(
            "tessera-mediator",
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 99)),
            18080,
        );

        let url = locator.resolve().await.expect("resolve");
        assert_eq!(url, "http://192.168.1.10:18080");
    }

    #[tokio::test]
    async fn test_local_locator_ignores_other_services() {
        let (locator, sink) = LocalLocator::new("tessera-mediator");

        sink.on_address_resolved(
            "some-printer",
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)),
            631,
        );
        sink.on_address_resolved(
            "tessera-mediator",
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
            18080,
        );

        let url = locator.resolve().await.expect("resolve");
        assert_eq!(url, "http://192.168.1.10:18080");
    }

    #[tokio::test]
    async fn test_local_locator_ignores_loopback_and_v6() {
        let (locator, sink) = LocalLocator::new("tessera-mediator");

        sink.on_address_resolved("tessera-mediator", IpAddr::V4(Ipv4Addr::LOCALHOST), 18080);
        sink.on_address_resolved(
            "tessera-mediator",
            "fe80::1".parse().expect("ipv6"),
            18080,
        );
        sink.on_address_resolved(
            "tessera-mediator",
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)),
            18080,
        );

        let url = locator.resolve().await.expect("resolve");
        assert_eq!(url, "http://10.0.0.7:18080");
    }

    #[tokio::test]
    async fn test_resolve_blocks_until_callback() {
        let (locator, sink) = LocalLocator::new("tessera-mediator");

        let resolver = tokio::spawn(async move { locator.resolve().await });
        tokio::task::yield_now().await;

        sink.on_address_resolved(
            "tessera-mediator",
            IpAddr::V4(Ipv4Addr::new(192, 168, 0, 2)),
            9000,
        );

        let url = resolver
            .await
            .expect("join")
            .expect("resolve");
        assert_eq!(url, "http://192.168.0.2:9000");
    }

    #[tokio::test]
    async fn test_discovery_closed_errors() {
        let (locator, sink) = LocalLocator::new("tessera-mediator");
        drop(sink);
        let result = locator.resolve().await;
        assert!(matches!(result, Err(MediatorError::DiscoveryClosed)));
    }
}
