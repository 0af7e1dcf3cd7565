//! Map validation and the degraded-fallback pipeline.

use crate::coordinator::HttpCoordinator;
use crate::error::MapRejection;
use crate::map::{NetworkMap, Provenance};
use crate::store::MapStore;
use ember_peer::now_millis;
use std::time::Duration;
use tracing::{info, warn};

/// Tolerated clock skew before a map counts as timestamped in the future.
pub const MAX_FUTURE_SKEW: Duration = Duration::from_secs(5 * 60);

/// Structural and temporal validation of a candidate map.
///
/// Rejection means the map must not be acted on *and* must not be
/// persisted — a bad map never displaces a good snapshot.
pub fn validate_map(map: &NetworkMap, now: u64) -> Result<(), MapRejection> {
    if map.active_nodes < 1 {
        return Err(MapRejection::NoActiveNodes {
            active: map.active_nodes,
        });
    }

    let skew_ms = MAX_FUTURE_SKEW.as_millis() as u64;
    if map.timestamp > now + skew_ms {
        return Err(MapRejection::FromTheFuture {
            ahead: Duration::from_millis(map.timestamp - now),
        });
    }

    if !map.is_fresh(now) {
        return Err(MapRejection::Stale {
            age: map.age(now),
            bound: map.freshness_bound(),
        });
    }

    for (index, node) in map.candidates.iter().enumerate() {
        if node.id.is_empty() {
            return Err(MapRejection::MalformedCandidate {
                index,
                reason: "empty id",
            });
        }
        if node.port == 0 {
            return Err(MapRejection::MalformedCandidate {
                index,
                reason: "zero port",
            });
        }
    }

    Ok(())
}

/// Fetches, validates, and persists network maps, degrading gracefully.
///
/// Constructed with its collaborators passed in; owns the snapshot store
/// (single writer).
#[derive(Debug)]
pub struct MapValidator {
    coordinator: HttpCoordinator,
    store: MapStore,
}

impl MapValidator {
    pub fn new(coordinator: HttpCoordinator, store: MapStore) -> Self {
        Self { coordinator, store }
    }

    /// Fetch a validated map, falling back to the cached snapshot and
    /// finally to a degraded map. Never fails: the worst case is a
    /// degraded map the caller must explicitly acknowledge.
    pub async fn fetch_validated_map(&self, radius_km: f64, max_nodes: u32) -> NetworkMap {
        let fetched = match self.coordinator.get_network_map(radius_km, max_nodes).await {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "network map fetch failed");
                None
            }
        };
        self.resolve(fetched, now_millis())
    }

    /// The fallback pipeline, separated from I/O for testability.
    pub fn resolve(&self, fetched: Option<NetworkMap>, now: u64) -> NetworkMap {
        if let Some(map) = fetched {
            match validate_map(&map, now) {
                Ok(()) => {
                    if let Err(e) = self.store.save(&map) {
                        warn!(error = %e, "failed to persist network map snapshot");
                    }
                    info!(
                        active = map.active_nodes,
                        genesis = map.genesis_nodes,
                        "accepted coordinator network map"
                    );
                    return map;
                }
                Err(rejection) => {
                    warn!(%rejection, "rejecting coordinator network map");
                }
            }
        }

        // Reload-on-start must re-validate freshness, not trust the cache
        match self.store.load_latest() {
            Ok(Some(mut cached)) => {
                cached.provenance = Provenance::Cached;
                match validate_map(&cached, now) {
                    Ok(()) => {
                        info!(age = ?cached.age(now), "using cached network map");
                        return cached;
                    }
                    Err(rejection) => {
                        warn!(%rejection, "cached network map unusable");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to load cached network map"),
        }

        info!("no usable network map; synthesizing degraded map");
        NetworkMap::degraded(now)
    }
}
