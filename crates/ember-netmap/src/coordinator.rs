//! HTTP client for the coordinator service.
//!
//! The coordinator is consumed, not trusted: any non-2xx status, timeout,
//! or malformed body is treated identically to "coordinator unavailable"
//! and surfaces as [`Error::Unavailable`]. The caller's fallback path
//! does the rest.

use crate::error::{Error, Result};
use crate::map::{MapNode, NetworkMap, Provenance};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Registration payload for announcing this node to the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRegistration {
    pub node_id: String,
    pub node_type: String,
    pub port: u16,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
struct MapRequest {
    max_distance_km: f64,
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct MapResponse {
    status: String,
    map: Option<MapPayload>,
}

#[derive(Debug, Deserialize)]
struct MapPayload {
    timestamp: u64,
    active_nodes: u32,
    genesis_nodes: u32,
    #[serde(default)]
    nodes: Vec<MapNode>,
    #[serde(default)]
    bootstrap_phase: bool,
}

/// Client for the coordinator's node registry.
#[derive(Debug, Clone)]
pub struct HttpCoordinator {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCoordinator {
    /// Build a client. The timeout applies to every request — a missing
    /// timeout here would let one dead coordinator stall bootstrap.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Unavailable(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Announce this node. Returns whether the coordinator accepted it.
    pub async fn register_node(&self, registration: &NodeRegistration) -> Result<bool> {
        let url = format!("{}/api/v1/nodes/register", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(registration)
            .send()
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::Unavailable(format!("register: {}", resp.status())));
        }

        let body: StatusResponse = resp
            .json()
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;
        Ok(body.status == "success")
    }

    /// Report liveness. Best-effort; callers absorb failures.
    pub async fn keepalive(&self, node_id: &str) -> Result<bool> {
        let url = format!("{}/api/v1/nodes/keepalive", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "node_id": node_id }))
            .send()
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::Unavailable(format!("keepalive: {}", resp.status())));
        }

        let body: StatusResponse = resp
            .json()
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;
        Ok(body.status == "success")
    }

    /// Fetch the network map. `Ok(None)` means the coordinator answered
    /// but has no map to give; errors mean it is effectively unavailable.
    pub async fn get_network_map(
        &self,
        radius_km: f64,
        max_nodes: u32,
    ) -> Result<Option<NetworkMap>> {
        let url = format!("{}/api/v1/network/map", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&MapRequest {
                max_distance_km: radius_km,
                limit: max_nodes,
            })
            .send()
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::Unavailable(format!("map: {}", resp.status())));
        }

        let body: MapResponse = resp
            .json()
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;

        if body.status != "success" {
            return Err(Error::Unavailable(format!("map status {}", body.status)));
        }

        let Some(payload) = body.map else {
            return Ok(None);
        };

        debug!(
            active = payload.active_nodes,
            genesis = payload.genesis_nodes,
            candidates = payload.nodes.len(),
            "received network map"
        );

        Ok(Some(NetworkMap {
            timestamp: payload.timestamp,
            active_nodes: payload.active_nodes,
            genesis_nodes: payload.genesis_nodes,
            candidates: payload.nodes,
            provenance: Provenance::Coordinator,
            bootstrap_implied: payload.bootstrap_phase,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let c = HttpCoordinator::new("http://localhost:9999/", Duration::from_millis(100)).unwrap();
        assert_eq!(c.base_url, "http://localhost:9999");
    }

    #[tokio::test]
    async fn unreachable_coordinator_is_unavailable() {
        // Port 9 (discard) with a tiny timeout: connection refused or timeout
        let c = HttpCoordinator::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let err = c.get_network_map(500.0, 50).await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));

        let err = c.keepalive("node-1").await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }
}
