//! Route types

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::Location;

/// A feasible tour assigned to one vehicle: depot -> stops -> depot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub date: NaiveDate,
    pub stops: Vec<RouteStop>,
    pub total_distance_km: f64,
    pub total_time_min: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One stop within a route, in visit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    pub stop_id: Uuid,
    pub sequence: usize,
    pub location: Location,
    pub planned_arrival: NaiveTime,
    pub planned_arrival_min: f64,
    pub late: bool,
}

/// Request to optimize a new route for a depot's stops over a fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRouteRequest {
    pub depot_id: Uuid,
    pub vehicle_ids: Vec<Uuid>,
    pub stop_ids: Vec<Uuid>,
    pub date: NaiveDate,
}

/// Result of a completed optimization job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub route_ids: Vec<Uuid>,
    pub greedy_distance_km: f64,
    pub total_distance_km: f64,
    pub improvement_pct: f64,
    pub num_routes: usize,
    pub solver_log: Vec<String>,
    pub optimization_score: u8,
    pub warnings: Vec<RouteWarning>,
}

/// A non-fatal issue surfaced alongside a solver result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteWarning {
    pub stop_id: Option<Uuid>,
    pub warning_type: String,
    pub message: String,
}
