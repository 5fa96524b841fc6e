//! Vehicle entity

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A vehicle available to carry stops out of its home depot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    pub capacity_kg: f64,
    pub home_depot_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_deserialize() {
        let json = r#"{
            "id": "123e4567-e89b-12d3-a456-426614174000",
            "capacityKg": 500.0,
            "homeDepotId": "123e4567-e89b-12d3-a456-426614174001"
        }"#;
        let vehicle: Vehicle = serde_json::from_str(json).unwrap();
        assert_eq!(vehicle.capacity_kg, 500.0);
    }
}
