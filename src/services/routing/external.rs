//! External distance/time matrix service client
//!
//! Wire format modeled on a Valhalla-style `sources_to_targets` matrix API:
//! https://valhalla.github.io/valhalla/api/matrix/api-reference/

use async_trait::async_trait;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::Location;
use super::{DistanceTimeMatrices, RoutingService};

#[derive(Debug, Clone)]
pub struct ExternalMatrixConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl ExternalMatrixConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), api_key: None, timeout_ms: 10_000 }
    }
}

pub struct ExternalMatrixClient {
    client: Client,
    config: ExternalMatrixConfig,
}

impl ExternalMatrixClient {
    pub fn new(config: ExternalMatrixConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .expect("failed to build HTTP client");

        Self { client, config }
    }

    fn build_matrix_request(&self, locations: &[Location]) -> MatrixRequest {
        let locs: Vec<ExternalLocation> = locations
            .iter()
            .map(|l| ExternalLocation { lat: l.lat, lon: l.lng })
            .collect();

        MatrixRequest {
            sources: locs.clone(),
            targets: locs,
            costing: "auto".to_string(),
            units: "kilometers".to_string(),
        }
    }

    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/status", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("failed to reach external matrix service")?;

        if response.status().is_success() {
            Ok(())
        } else {
            anyhow::bail!("external matrix service returned status {}", response.status())
        }
    }
}

#[async_trait]
impl RoutingService for ExternalMatrixClient {
    async fn get_matrices(&self, locations: &[Location]) -> Result<DistanceTimeMatrices> {
        let n = locations.len();
        if n == 0 {
            return Ok(DistanceTimeMatrices::empty());
        }
        if n == 1 {
            return Ok(DistanceTimeMatrices {
                distances_km: vec![vec![0.0]],
                durations_min: vec![vec![0.0]],
                size: 1,
                degraded: false,
            });
        }

        let request = self.build_matrix_request(locations);
        let url = format!("{}/sources_to_targets", self.config.base_url);

        debug!(n, "requesting distance/time matrix from external service");

        let mut req = self.client.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.context("failed to send matrix request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("external matrix service returned {}: {}", status, body);
        }

        let matrix_response: MatrixResponse = response
            .json()
            .await
            .context("failed to parse matrix response")?;

        let mut distances_km = vec![vec![0.0; n]; n];
        let mut durations_min = vec![vec![0.0; n]; n];

        for (i, row) in matrix_response.sources_to_targets.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                distances_km[i][j] = cell.distance.unwrap_or_else(|| {
                    warn!(i, j, "no distance for pair");
                    0.0
                });
                durations_min[i][j] = cell.time.map(|s| s / 60.0).unwrap_or_else(|| {
                    warn!(i, j, "no duration for pair");
                    0.0
                });
            }
        }

        debug!(n, "received distance/time matrix from external service");

        Ok(DistanceTimeMatrices { distances_km, durations_min, size: n, degraded: false })
    }

    fn name(&self) -> &str {
        "external"
    }
}

#[derive(Debug, Serialize, Clone)]
struct ExternalLocation {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize)]
struct MatrixRequest {
    sources: Vec<ExternalLocation>,
    targets: Vec<ExternalLocation>,
    costing: String,
    units: String,
}

#[derive(Debug, Deserialize)]
struct MatrixCell {
    distance: Option<f64>,
    time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    sources_to_targets: Vec<Vec<MatrixCell>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_matrix_request_shape() {
        let client = ExternalMatrixClient::new(ExternalMatrixConfig::new("http://localhost:8002"));
        let locations = vec![Location::new(50.0, 14.0), Location::new(50.1, 14.1)];
        let request = client.build_matrix_request(&locations);
        assert_eq!(request.sources.len(), 2);
        assert_eq!(request.targets.len(), 2);
        assert_eq!(request.units, "kilometers");
    }

    #[tokio::test]
    #[ignore = "requires a running external matrix service"]
    async fn test_health_check_against_live_service() {
        let client = ExternalMatrixClient::new(ExternalMatrixConfig::new("http://localhost:8002"));
        client.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_health_check_fails_against_unreachable_service() {
        let client = ExternalMatrixClient::new(ExternalMatrixConfig::new("http://localhost:99999"));
        assert!(client.health_check().await.is_err());
    }
}
