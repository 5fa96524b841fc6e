//! Traffic events consumed by the rerouter

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reported slowdown on one edge of a route's tour.
///
/// `delay_factor` multiplies the baseline travel time on the (u, v) edge;
/// it applies symmetrically in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficEvent {
    pub edge: (Uuid, Uuid),
    pub delay_factor: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traffic_event_deserialize() {
        let json = r#"{
            "edge": ["123e4567-e89b-12d3-a456-426614174000", "123e4567-e89b-12d3-a456-426614174001"],
            "delayFactor": 2.0
        }"#;
        let event: TrafficEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.delay_factor, 2.0);
    }
}
