//! In-memory entity store
//!
//! Stands in for the key-addressable CRUD store (depots, vehicles, stops,
//! routes, jobs) that a real deployment would back with a database. The
//! `EntityStore` trait is the seam: swap this implementation out without
//! touching the solver, dispatcher, or rerouter.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::{Depot, Job, Route, Stop, Vehicle};

/// Shared, in-process CRUD store keyed by entity id.
pub struct EntityStore {
    depots: RwLock<HashMap<Uuid, Depot>>,
    vehicles: RwLock<HashMap<Uuid, Vehicle>>,
    stops: RwLock<HashMap<Uuid, Stop>>,
    routes: RwLock<HashMap<Uuid, Route>>,
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self {
            depots: RwLock::new(HashMap::new()),
            vehicles: RwLock::new(HashMap::new()),
            stops: RwLock::new(HashMap::new()),
            routes: RwLock::new(HashMap::new()),
            jobs: RwLock::new(HashMap::new()),
        }
    }
}

pub type SharedEntityStore = Arc<EntityStore>;

macro_rules! crud {
    ($get:ident, $put:ident, $field:ident, $ty:ty) => {
        pub fn $get(&self, id: Uuid) -> Option<$ty> {
            self.$field.read().get(&id).cloned()
        }

        pub fn $put(&self, entity: $ty) {
            self.$field.write().insert(entity.id, entity);
        }
    };
}

impl EntityStore {
    crud!(get_depot, put_depot, depots, Depot);
    crud!(get_vehicle, put_vehicle, vehicles, Vehicle);
    crud!(get_stop, put_stop, stops, Stop);
    crud!(get_route, put_route, routes, Route);
    crud!(get_job, put_job, jobs, Job);

    pub fn get_stops(&self, ids: &[Uuid]) -> Vec<Stop> {
        let stops = self.stops.read();
        ids.iter().filter_map(|id| stops.get(id).cloned()).collect()
    }

    pub fn get_vehicles(&self, ids: &[Uuid]) -> Vec<Vehicle> {
        let vehicles = self.vehicles.read();
        ids.iter().filter_map(|id| vehicles.get(id).cloned()).collect()
    }
}
