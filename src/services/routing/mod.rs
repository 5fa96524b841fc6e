//! Distance/time matrix builder
//!
//! Uses an external routing service for production, with a haversine-based
//! fallback that is always available.

mod external;

pub use external::{ExternalMatrixClient, ExternalMatrixConfig};

use async_trait::async_trait;
use anyhow::Result;
use crate::types::Location;

/// Distance (km) and time (min) matrices between locations, in request order.
#[derive(Debug, Clone)]
pub struct DistanceTimeMatrices {
    pub distances_km: Vec<Vec<f64>>,
    pub durations_min: Vec<Vec<f64>>,
    pub size: usize,
    /// True if computed via the fallback strategy rather than the external service.
    pub degraded: bool,
}

impl DistanceTimeMatrices {
    pub fn empty() -> Self {
        Self { distances_km: vec![], durations_min: vec![], size: 0, degraded: false }
    }

    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.distances_km[from][to]
    }

    pub fn duration(&self, from: usize, to: usize) -> f64 {
        self.durations_min[from][to]
    }
}

/// Abstraction over the distance/time matrix provider (external service, fallback).
#[async_trait]
pub trait RoutingService: Send + Sync {
    async fn get_matrices(&self, locations: &[Location]) -> Result<DistanceTimeMatrices>;
    fn name(&self) -> &str;
}

/// Haversine-based fallback. Pure and always succeeds.
pub struct FallbackRoutingService {
    average_speed_kmh: f64,
}

impl Default for FallbackRoutingService {
    fn default() -> Self {
        Self { average_speed_kmh: 40.0 }
    }
}

impl FallbackRoutingService {
    pub fn new(average_speed_kmh: f64) -> Self {
        Self { average_speed_kmh }
    }
}

#[async_trait]
impl RoutingService for FallbackRoutingService {
    async fn get_matrices(&self, locations: &[Location]) -> Result<DistanceTimeMatrices> {
        use crate::services::geo::{distance_matrix, time_matrix};

        let n = locations.len();
        if n == 0 {
            return Ok(DistanceTimeMatrices::empty());
        }

        Ok(DistanceTimeMatrices {
            distances_km: distance_matrix(locations),
            durations_min: time_matrix(locations, self.average_speed_kmh),
            size: n,
            degraded: true,
        })
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

/// Wraps a primary routing service with an always-available haversine
/// fallback. A per-call failure of the primary (e.g. a transient external
/// outage) degrades that single call to the fallback instead of surfacing
/// `MatrixUnavailable` — the fallback only fails to absorb a failure if it
/// itself fails, which it is built not to do.
pub struct RoutingServiceWithFallback {
    primary: Box<dyn RoutingService>,
    fallback: FallbackRoutingService,
}

impl RoutingServiceWithFallback {
    pub fn new(primary: Box<dyn RoutingService>, fallback: FallbackRoutingService) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl RoutingService for RoutingServiceWithFallback {
    async fn get_matrices(&self, locations: &[Location]) -> Result<DistanceTimeMatrices> {
        use tracing::warn;

        match self.primary.get_matrices(locations).await {
            Ok(matrices) => Ok(matrices),
            Err(e) => {
                warn!(error = %e, "primary matrix service call failed, falling back to haversine");
                self.fallback.get_matrices(locations).await
            }
        }
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}

/// Build a routing service, preferring the external service and falling back
/// to haversine when it is unconfigured, over its location cap, or unhealthy
/// at startup. When the external service is used, every call is still
/// guarded by a per-call haversine fallback so a later transient outage
/// degrades gracefully instead of failing the job.
pub async fn create_routing_service_with_fallback(
    config: Option<ExternalMatrixConfig>,
    max_locations: usize,
    average_speed_kmh: f64,
    location_count: usize,
) -> Box<dyn RoutingService> {
    use tracing::{info, warn};

    if let Some(cfg) = config {
        if location_count > max_locations {
            warn!(
                location_count,
                max_locations, "location count exceeds external matrix cap, using fallback"
            );
        } else {
            let client = ExternalMatrixClient::new(cfg.clone());
            match client.health_check().await {
                Ok(()) => {
                    info!(url = %cfg.base_url, "external matrix service available");
                    return Box::new(RoutingServiceWithFallback::new(
                        Box::new(client),
                        FallbackRoutingService::new(average_speed_kmh),
                    ));
                }
                Err(e) => {
                    warn!(url = %cfg.base_url, error = %e, "external matrix service unavailable, falling back");
                }
            }
        }
    }

    info!("using haversine fallback matrix service");
    Box::new(FallbackRoutingService::new(average_speed_kmh))
}
