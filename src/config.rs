//! Configuration management

use crate::services::routing::ExternalMatrixConfig;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Number of worker tasks draining the job queue
    pub worker_pool_size: usize,

    /// External matrix service base URL (optional, falls back to haversine)
    pub external_matrix_url: Option<String>,
    pub external_matrix_key: Option<String>,
    pub external_matrix_cap: usize,
    pub external_matrix_timeout_ms: u64,

    /// Soft wall-clock budget for a single solve, in milliseconds
    pub solver_timeout_ms: u64,

    /// Fixed dwell time added at every stop, in minutes
    pub service_time_min: f64,

    /// Average travel speed assumed by the haversine fallback, km/h
    pub avg_speed_kmh: f64,

    /// Per-subscriber channel capacity on the route event bus
    pub bus_subscriber_buffer: usize,

    pub rust_log: String,
    pub logs_dir: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let nats_url =
            std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let worker_pool_size = env_or("WORKER_POOL_SIZE", 4usize);
        let external_matrix_url = std::env::var("EXTERNAL_MATRIX_URL").ok();
        let external_matrix_key = std::env::var("EXTERNAL_MATRIX_KEY").ok();
        let external_matrix_cap = env_or("EXTERNAL_MATRIX_CAP", 49usize);
        let external_matrix_timeout_ms = env_or("EXTERNAL_MATRIX_TIMEOUT_MS", 10_000u64);
        let solver_timeout_ms = env_or("SOLVER_TIMEOUT_MS", 30_000u64);
        let service_time_min = env_or("SERVICE_TIME_MIN", 5.0f64);
        let avg_speed_kmh = env_or("AVG_SPEED_KMH", 40.0f64);
        let bus_subscriber_buffer = env_or("BUS_SUBSCRIBER_BUFFER", 64usize);

        let rust_log =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,vrptw_worker=debug".to_string());
        let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "../logs".to_string());

        Ok(Self {
            nats_url,
            worker_pool_size,
            external_matrix_url,
            external_matrix_key,
            external_matrix_cap,
            external_matrix_timeout_ms,
            solver_timeout_ms,
            service_time_min,
            avg_speed_kmh,
            bus_subscriber_buffer,
            rust_log,
            logs_dir,
        })
    }

    pub fn external_matrix_config(&self) -> Option<ExternalMatrixConfig> {
        self.external_matrix_url.as_ref().map(|url| ExternalMatrixConfig {
            base_url: url.clone(),
            api_key: self.external_matrix_key.clone(),
            timeout_ms: self.external_matrix_timeout_ms,
        })
    }
}
