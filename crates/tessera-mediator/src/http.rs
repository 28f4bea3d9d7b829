//! reqwest-backed mediator client.
//!
//! Response handling follows the discovery/start polling semantics of the
//! coordination layer: 404 means "not ready yet" and maps to an empty or
//! `None` result, and malformed bodies are discarded (logged, treated as
//! empty) rather than escalated — the pollers above retry on their own
//! schedule.

use async_trait::async_trait;

use tessera_types::PartyId;

use crate::{client::MediatorClient, MediatorError, Result};

/// HTTP client for a mediator server.
pub struct HttpMediatorClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMediatorClient {
    /// Create a client for the mediator at `base_url`
    /// (e.g., `http://192.168.1.10:18080`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// GET a JSON list of party ids; 404 and malformed bodies map to empty.
    async fn get_party_list(&self, url: &str) -> Result<Vec<PartyId>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediatorError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(MediatorError::Transport(format!(
                "unexpected status {} from {url}",
                response.status()
            )));
        }
        match response.json::<Vec<PartyId>>().await {
            Ok(parties) => Ok(parties),
            Err(e) => {
                tracing::warn!(url, error = %e, "discarding malformed party list");
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl MediatorClient for HttpMediatorClient {
    async fn register(&self, session_id: &str, party_id: &str) -> Result<()> {
        let url = self.url(session_id);
        let response = self
            .client
            .post(&url)
            .json(&[party_id])
            .send()
            .await
            .map_err(|e| MediatorError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(session_id, party_id, "registered with mediator");
            Ok(())
        } else if status.is_client_error() {
            Err(MediatorError::Rejected {
                status: status.as_u16(),
            })
        } else {
            Err(MediatorError::Transport(format!(
                "register failed with status {status}"
            )))
        }
    }

    async fn participants(&self, session_id: &str) -> Result<Vec<PartyId>> {
        self.get_party_list(&self.url(session_id)).await
    }

    async fn start(&self, session_id: &str, committee: &[PartyId]) -> Result<()> {
        let url = self.url(&format!("start/{session_id}"));
        let response = self
            .client
            .post(&url)
            .json(committee)
            .send()
            .await
            .map_err(|e| MediatorError::Transport(e.to_string()))?;

        if response.status().is_success() {
            tracing::info!(session_id, members = committee.len(), "committee frozen");
            Ok(())
        } else {
            Err(MediatorError::Transport(format!(
                "start failed with status {}",
                response.status()
            )))
        }
    }

    async fn poll_start(&self, session_id: &str) -> Result<Option<Vec<PartyId>>> {
        let url = self.url(&format!("start/{session_id}"));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MediatorError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(MediatorError::Transport(format!(
                "poll_start failed with status {}",
                response.status()
            )));
        }
        match response.json::<Vec<PartyId>>().await {
            Ok(committee) => Ok(Some(committee)),
            Err(e) => {
                tracing::warn!(session_id, error = %e, "discarding malformed start response");
                Ok(None)
            }
        }
    }

    async fn push_message(&self, session_id: &str, to_party: &str, body: &str) -> Result<()> {
        let url = self.url(&format!("message/{session_id}/{to_party}"));
        let response = self
            .client
            .post(&url)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| MediatorError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MediatorError::Transport(format!(
                "push to {to_party} failed with status {}",
                response.status()
            )))
        }
    }

    async fn pull_messages(&self, session_id: &str, party_id: &str) -> Result<Vec<String>> {
        let url = self.url(&format!("message/{session_id}/{party_id}"));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MediatorError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(MediatorError::Transport(format!(
                "pull failed with status {}",
                response.status()
            )));
        }
        match response.json::<Vec<String>>().await {
            Ok(bodies) => Ok(bodies),
            Err(e) => {
                tracing::warn!(session_id, party_id, error = %e, "discarding malformed mailbox");
                Ok(Vec::new())
            }
        }
    }

    async fn mark_complete(&self, session_id: &str, party_id: &str) -> Result<()> {
        let url = self.url(&format!("complete/{session_id}"));
        let response = self
            .client
            .post(&url)
            .json(&[party_id])
            .send()
            .await
            .map_err(|e| MediatorError::Transport(e.to_string()))?;

        if response.status().is_success() {
            tracing::info!(session_id, party_id, "completion recorded");
            Ok(())
        } else {
            Err(MediatorError::Transport(format!(
                "mark_complete failed with status {}",
                response.status()
            )))
        }
    }

    async fn completions(&self, session_id: &str) -> Result<Vec<PartyId>> {
        self.get_party_list(&self.url(&format!("complete/{session_id}")))
            .await
    }
}
