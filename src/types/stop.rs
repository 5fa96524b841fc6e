//! Delivery stop type

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::Location;

/// A delivery stop. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: Uuid,
    pub location: Location,
    pub earliest_time: NaiveTime,
    pub latest_time: NaiveTime,
    pub package_weight_kg: f64,
    pub address: Option<String>,
}

impl Stop {
    pub fn window_contains(&self, t: NaiveTime) -> bool {
        self.earliest_time <= t && t <= self.latest_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(earliest: &str, latest: &str) -> Stop {
        Stop {
            id: Uuid::nil(),
            location: Location::new(50.0, 14.0),
            earliest_time: NaiveTime::parse_from_str(earliest, "%H:%M").unwrap(),
            latest_time: NaiveTime::parse_from_str(latest, "%H:%M").unwrap(),
            package_weight_kg: 5.0,
            address: None,
        }
    }

    #[test]
    fn test_window_contains() {
        let s = stop("09:00", "11:00");
        assert!(s.window_contains(NaiveTime::parse_from_str("10:00", "%H:%M").unwrap()));
        assert!(!s.window_contains(NaiveTime::parse_from_str("08:00", "%H:%M").unwrap()));
        assert!(!s.window_contains(NaiveTime::parse_from_str("12:00", "%H:%M").unwrap()));
    }

    #[test]
    fn test_stop_deserialize_camel_case() {
        let json = r#"{
            "id": "123e4567-e89b-12d3-a456-426614174000",
            "location": {"lat": 50.0, "lng": 14.0},
            "earliestTime": "09:00:00",
            "latestTime": "11:00:00",
            "packageWeightKg": 5.0,
            "address": null
        }"#;
        let stop: Stop = serde_json::from_str(json).unwrap();
        assert_eq!(stop.package_weight_kg, 5.0);
    }
}
