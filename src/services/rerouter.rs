//! Live rerouter: applies traffic events to an existing route's ETAs
//! without changing its stop sequence or vehicle assignment.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::bus::{RerouteEvent, RerouteStopEvent, SharedRouteEventBus};
use crate::services::routing::RoutingService;
use crate::services::validator::compute_arrivals;
use crate::store::SharedEntityStore;
use crate::types::TrafficEvent;

pub struct Rerouter {
    store: SharedEntityStore,
    routing: Arc<dyn RoutingService>,
    bus: SharedRouteEventBus,
    service_time_min: f64,
    /// Per-route lock so concurrent traffic events on the same route
    /// update the time matrix and persisted ETAs atomically.
    route_locks: SyncMutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl Rerouter {
    pub fn new(
        store: SharedEntityStore,
        routing: Arc<dyn RoutingService>,
        bus: SharedRouteEventBus,
        service_time_min: f64,
    ) -> Self {
        Self { store, routing, bus, service_time_min, route_locks: SyncMutex::new(HashMap::new()) }
    }

    pub async fn reroute(&self, route_id: Uuid, events: &[TrafficEvent]) -> Result<(), AppError> {
        let lock = Arc::clone(self.route_locks.lock().entry(route_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))));
        let _guard = lock.lock().await;

        let mut route = self
            .store
            .get_route(route_id)
            .ok_or_else(|| AppError::NotFound(format!("route {}", route_id)))?;

        let vehicle = self
            .store
            .get_vehicle(route.vehicle_id)
            .ok_or_else(|| AppError::NotFound(format!("vehicle {}", route.vehicle_id)))?;
        let depot = self
            .store
            .get_depot(vehicle.home_depot_id)
            .ok_or_else(|| AppError::NotFound(format!("depot {}", vehicle.home_depot_id)))?;

        let stop_ids: Vec<Uuid> = route.stops.iter().map(|s| s.stop_id).collect();
        let stops = self.store.get_stops(&stop_ids);
        if stops.len() != stop_ids.len() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "route references stops no longer in the store"
            )));
        }
        let stops_by_id: HashMap<Uuid, _> = stops.iter().map(|s| (s.id, s)).collect();

        let mut locations = vec![depot.location];
        locations.extend(route.stops.iter().map(|s| s.location));

        let mut id_to_pos: HashMap<Uuid, usize> = HashMap::new();
        id_to_pos.insert(depot.id, 0);
        for (i, stop_id) in stop_ids.iter().enumerate() {
            id_to_pos.insert(*stop_id, i + 1);
        }

        let matrices = self
            .routing
            .get_matrices(&locations)
            .await
            .map_err(|e| AppError::MatrixUnavailable(e.to_string()))?;
        let mut time_matrix = matrices.durations_min;

        let mut factors: HashMap<(usize, usize), f64> = HashMap::new();
        for event in events {
            let (Some(&pu), Some(&pv)) =
                (id_to_pos.get(&event.edge.0), id_to_pos.get(&event.edge.1))
            else {
                continue;
            };
            if pu.abs_diff(pv) != 1 {
                continue; // not an edge actually present in this route's tour
            }
            let key = (pu.min(pv), pu.max(pv));
            let existing = factors.entry(key).or_insert(1.0);
            if event.delay_factor > *existing {
                *existing = event.delay_factor;
            }
        }

        for (&(a, b), &factor) in &factors {
            time_matrix[a][b] *= factor;
            time_matrix[b][a] *= factor;
        }

        let sequence: Vec<usize> = (1..=stop_ids.len()).collect();
        let depot_open_min = minutes(depot.open_time);
        let arrivals = compute_arrivals(&sequence, &time_matrix, depot_open_min, self.service_time_min);

        let mut stop_events = Vec::with_capacity(route.stops.len());
        for (route_stop, &arrival) in route.stops.iter_mut().zip(arrivals.iter()) {
            let stop = stops_by_id[&route_stop.stop_id];
            let earliest = minutes(stop.earliest_time);
            let latest = minutes(stop.latest_time);
            let late = arrival > latest + 1e-6 || arrival < earliest - 1e-6;

            route_stop.planned_arrival_min = arrival;
            route_stop.planned_arrival = minutes_to_time(arrival);
            route_stop.late = late;

            stop_events.push(RerouteStopEvent {
                stop_id: route_stop.stop_id,
                sequence: route_stop.sequence,
                planned_arrival: route_stop.planned_arrival,
                planned_arrival_min: arrival,
                lat: route_stop.location.lat,
                lng: route_stop.location.lng,
                late,
            });
        }

        route.updated_at = chrono::Utc::now();
        self.store.put_route(route);

        info!(%route_id, applied_events = factors.len(), "rerouted");
        self.bus.publish(route_id, RerouteEvent { route_id, stops: stop_events });

        Ok(())
    }
}

fn minutes(t: chrono::NaiveTime) -> f64 {
    use chrono::Timelike;
    (t.hour() * 60 + t.minute()) as f64
}

fn minutes_to_time(minutes: f64) -> chrono::NaiveTime {
    let total = minutes.round().clamp(0.0, 24.0 * 60.0 - 1.0) as u32;
    chrono::NaiveTime::from_hms_opt(total / 60, total % 60, 0)
        .unwrap_or_else(|| chrono::NaiveTime::from_hms_opt(23, 59, 0).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::bus::RouteEventBus;
    use crate::services::routing::FallbackRoutingService;
    use crate::store::EntityStore;
    use crate::types::{Depot, Location, Route, RouteStop, Stop, Vehicle};
    use chrono::NaiveTime;

    fn build_fixture() -> (SharedEntityStore, Uuid, Uuid) {
        let store: SharedEntityStore = Arc::new(EntityStore::default());

        let depot_id = Uuid::new_v4();
        let depot = Depot {
            id: depot_id,
            location: Location::new(50.0, 14.0),
            open_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        };
        store.put_depot(depot.clone());

        let vehicle_id = Uuid::new_v4();
        store.put_vehicle(Vehicle { id: vehicle_id, capacity_kg: 100.0, home_depot_id: depot_id });

        let stop0_id = Uuid::new_v4();
        let stop0 = Stop {
            id: stop0_id,
            location: Location::new(50.01, 14.0),
            earliest_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            latest_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            package_weight_kg: 1.0,
            address: None,
        };
        store.put_stop(stop0.clone());

        let stop1_id = Uuid::new_v4();
        let stop1 = Stop {
            id: stop1_id,
            location: Location::new(50.02, 14.0),
            earliest_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            latest_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            package_weight_kg: 1.0,
            address: None,
        };
        store.put_stop(stop1.clone());

        let route_id = Uuid::new_v4();
        let route = Route {
            id: route_id,
            vehicle_id,
            date: chrono::NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(),
            stops: vec![
                RouteStop {
                    stop_id: stop0_id,
                    sequence: 0,
                    location: stop0.location,
                    planned_arrival: NaiveTime::from_hms_opt(8, 10, 0).unwrap(),
                    planned_arrival_min: 490.0,
                    late: false,
                },
                RouteStop {
                    stop_id: stop1_id,
                    sequence: 1,
                    location: stop1.location,
                    planned_arrival: NaiveTime::from_hms_opt(8, 20, 0).unwrap(),
                    planned_arrival_min: 500.0,
                    late: false,
                },
            ],
            total_distance_km: 5.0,
            total_time_min: 20.0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        store.put_route(route);

        (store, route_id, stop0_id)
    }

    #[tokio::test]
    async fn test_identity_event_list_rebuilds_but_preserves_sequence() {
        let (store, route_id, _) = build_fixture();
        let routing: Arc<dyn RoutingService> = Arc::new(FallbackRoutingService::default());
        let bus: SharedRouteEventBus = Arc::new(RouteEventBus::default());
        let rerouter = Rerouter::new(Arc::clone(&store), routing, Arc::clone(&bus), 5.0);

        let before = store.get_route(route_id).unwrap();
        rerouter.reroute(route_id, &[]).await.unwrap();
        let after = store.get_route(route_id).unwrap();

        assert_eq!(
            before.stops.iter().map(|s| s.stop_id).collect::<Vec<_>>(),
            after.stops.iter().map(|s| s.stop_id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_delay_factor_increases_downstream_arrivals() {
        let (store, route_id, stop0_id) = build_fixture();
        let routing: Arc<dyn RoutingService> = Arc::new(FallbackRoutingService::default());
        let bus: SharedRouteEventBus = Arc::new(RouteEventBus::default());
        let rerouter = Rerouter::new(Arc::clone(&store), routing, Arc::clone(&bus), 5.0);
        let vehicle = store.get_vehicle(store.get_route(route_id).unwrap().vehicle_id).unwrap();
        let depot_id = vehicle.home_depot_id;

        let before = store.get_route(route_id).unwrap();
        let before_arrival = before.stops[0].planned_arrival_min;

        let events = vec![TrafficEvent { edge: (depot_id, stop0_id), delay_factor: 2.0 }];
        rerouter.reroute(route_id, &events).await.unwrap();

        let after = store.get_route(route_id).unwrap();
        assert!(after.stops[0].planned_arrival_min > before_arrival);
    }

    #[tokio::test]
    async fn test_unmatched_edge_is_ignored() {
        let (store, route_id, _) = build_fixture();
        let routing: Arc<dyn RoutingService> = Arc::new(FallbackRoutingService::default());
        let bus: SharedRouteEventBus = Arc::new(RouteEventBus::default());
        let rerouter = Rerouter::new(Arc::clone(&store), routing, Arc::clone(&bus), 5.0);

        let before = store.get_route(route_id).unwrap();
        let events = vec![TrafficEvent { edge: (Uuid::new_v4(), Uuid::new_v4()), delay_factor: 5.0 }];
        rerouter.reroute(route_id, &events).await.unwrap();
        let after = store.get_route(route_id).unwrap();

        assert_eq!(before.stops[0].planned_arrival_min, after.stops[0].planned_arrival_min);
    }

    #[tokio::test]
    async fn test_reroute_publishes_on_bus() {
        let (store, route_id, _) = build_fixture();
        let routing: Arc<dyn RoutingService> = Arc::new(FallbackRoutingService::default());
        let bus: SharedRouteEventBus = Arc::new(RouteEventBus::default());
        let mut sub = bus.subscribe(route_id);
        let rerouter = Rerouter::new(Arc::clone(&store), routing, Arc::clone(&bus), 5.0);

        rerouter.reroute(route_id, &[]).await.unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.route_id, route_id);
    }

    #[tokio::test]
    async fn test_missing_route_is_not_found() {
        let store: SharedEntityStore = Arc::new(EntityStore::default());
        let routing: Arc<dyn RoutingService> = Arc::new(FallbackRoutingService::default());
        let bus: SharedRouteEventBus = Arc::new(RouteEventBus::default());
        let rerouter = Rerouter::new(store, routing, bus, 5.0);

        let result = rerouter.reroute(Uuid::new_v4(), &[]).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
