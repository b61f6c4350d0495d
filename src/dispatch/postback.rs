//! Postback forwarding to ad networks.
//!
//! # Responsibilities
//! - Map a conversion's parameters to the owning ad network
//! - Build the network's postback URL from its template
//! - Issue the outbound GET through the network's circuit breaker
//!
//! # Design Decisions
//! - Dispatch is spawned off the request path; the inbound postback
//!   response never waits for the network
//! - HTTP status ≥ 400 counts as failure for breaker accounting even
//!   though the transport call succeeded

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::{NetworkConfig, PostbackConfig};
use crate::dispatch::template::build_url;
use crate::observability::events::{Event, EventSink};
use crate::observability::metrics;
use crate::resilience::{BreakerError, BreakerRegistry};

/// Resolve the target network: explicit `network` param first, then
/// the `type_ads` code used by the click trackers.
pub fn network_from_params(params: &HashMap<String, String>) -> Option<String> {
    if let Some(network) = params.get("network").filter(|n| !n.is_empty()) {
        return Some(network.clone());
    }
    match params.get("type_ads").map(String::as_str) {
        Some("1") => Some("propeller".to_string()),
        Some("2") => Some("galaksion".to_string()),
        Some("3") => Some("popcash".to_string()),
        _ => None,
    }
}

/// Errors raised while forwarding one postback.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown network `{0}`")]
    UnknownNetwork(String),

    /// Fail-fast from an Open breaker; the call was never attempted.
    #[error("circuit breaker open for `{0}`")]
    BreakerOpen(String),

    /// Transport error or HTTP error status from the network.
    #[error("postback to `{network}` failed: {cause}")]
    Forward { network: String, cause: String },
}

/// Forwards conversion postbacks, best-effort.
pub struct PostbackDispatcher {
    client: reqwest::Client,
    networks: HashMap<String, NetworkConfig>,
    registry: Arc<BreakerRegistry>,
    events: Arc<dyn EventSink>,
}

impl PostbackDispatcher {
    /// Build the dispatcher and its HTTP client.
    pub fn new(
        cfg: &PostbackConfig,
        registry: Arc<BreakerRegistry>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        let networks = cfg
            .networks
            .iter()
            .map(|n| (n.name.clone(), n.clone()))
            .collect();
        Ok(Self {
            client,
            networks,
            registry,
            events,
        })
    }

    /// Fire-and-forget entry point used by the postback handler.
    pub fn spawn(self: &Arc<Self>, network: String, params: HashMap<String, String>) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.dispatch(&network, params).await;
        });
    }

    /// Forward one postback. Failures are recorded and swallowed so
    /// they never reach the click path.
    pub async fn dispatch(&self, network: &str, params: HashMap<String, String>) {
        match self.forward(network, params).await {
            Ok(url) => {
                metrics::record_postback(network, "ok");
                self.events.emit(
                    Event::new("postback_forwarded")
                        .field("network", network)
                        .field("url", url),
                );
            }
            Err(e) => {
                let outcome = match &e {
                    DispatchError::BreakerOpen(_) => "breaker_open",
                    _ => "error",
                };
                metrics::record_postback(network, outcome);
                tracing::warn!(network = %network, error = %e, "Postback forwarding failed");
                self.events.emit(
                    Event::new("postback_failed")
                        .field("network", network)
                        .field("error", e.to_string()),
                );
            }
        }
    }

    /// Build the URL and call it through the breaker. Returns the
    /// resolved URL on success.
    async fn forward(
        &self,
        network: &str,
        mut params: HashMap<String, String>,
    ) -> Result<String, DispatchError> {
        let net = self
            .networks
            .get(network)
            .ok_or_else(|| DispatchError::UnknownNetwork(network.to_string()))?;

        // Static account params lose to per-postback values.
        for (key, value) in &net.params {
            params.entry(key.clone()).or_insert_with(|| value.clone());
        }
        let url = build_url(&net.postback_url, &params);

        let breaker = self.registry.get_or_create(network);
        let client = self.client.clone();
        let call_url = url.clone();
        let call_network = network.to_string();

        breaker
            .execute(async move {
                let response =
                    client
                        .get(&call_url)
                        .send()
                        .await
                        .map_err(|e| DispatchError::Forward {
                            network: call_network.clone(),
                            cause: e.to_string(),
                        })?;
                let status = response.status();
                if status.as_u16() >= 400 {
                    return Err(DispatchError::Forward {
                        network: call_network,
                        cause: format!("status {status}"),
                    });
                }
                Ok(())
            })
            .await
            .map_err(|e| match e {
                BreakerError::Open => DispatchError::BreakerOpen(network.to_string()),
                BreakerError::Call(inner) => inner,
            })?;

        Ok(url)
    }
}
