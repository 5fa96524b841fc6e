//! Asynchronous job dispatcher: bounded worker pool draining a FIFO queue.
//!
//! Submission is non-blocking and returns a job id immediately; a fixed pool
//! of worker tasks drains the queue, runs the solver, and persists the
//! result. Job state only ever moves forward: `queued -> running ->
//! {done | failed}`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::routing::RoutingService;
use crate::services::vrptw::VrptwSolver;
use crate::store::SharedEntityStore;
use crate::types::{Job, JobState, OptimizationResult, OptimizeRouteRequest, Route, RouteStop, RouteWarning};

struct WorkItem {
    job_id: Uuid,
    request: OptimizeRouteRequest,
}

pub struct DispatcherConfig {
    pub worker_pool_size: usize,
    pub service_time_min: f64,
    pub solver_timeout_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { worker_pool_size: 4, service_time_min: 5.0, solver_timeout_ms: 30_000 }
    }
}

pub struct Dispatcher {
    store: SharedEntityStore,
    tx: mpsc::UnboundedSender<WorkItem>,
}

impl Dispatcher {
    pub fn spawn(
        store: SharedEntityStore,
        routing: Arc<dyn RoutingService>,
        config: DispatcherConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<WorkItem>();
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..config.worker_pool_size.max(1) {
            let rx = Arc::clone(&rx);
            let store = Arc::clone(&store);
            let routing = Arc::clone(&routing);
            let service_time_min = config.service_time_min;
            let timeout = Duration::from_millis(config.solver_timeout_ms);

            tokio::spawn(async move {
                loop {
                    let item = { rx.lock().await.recv().await };
                    let Some(item) = item else { break };
                    info!(worker_id, job_id = %item.job_id, "picked up job");
                    run_job(&store, &routing, item, service_time_min, timeout).await;
                }
            });
        }

        Self { store, tx }
    }

    /// Enqueue a request and return its job id without waiting on any compute.
    pub fn submit(&self, request: OptimizeRouteRequest) -> Uuid {
        let job_id = Uuid::new_v4();
        self.store.put_job(Job::new(job_id));
        // An unbounded queue keeps submit non-blocking regardless of backlog.
        let _ = self.tx.send(WorkItem { job_id, request });
        job_id
    }

    pub fn status(&self, job_id: Uuid) -> Option<Job> {
        self.store.get_job(job_id)
    }
}

async fn run_job(
    store: &SharedEntityStore,
    routing: &Arc<dyn RoutingService>,
    item: WorkItem,
    service_time_min: f64,
    timeout: Duration,
) {
    let job_id = item.job_id;

    if let Some(mut job) = store.get_job(job_id) {
        job.state = JobState::Running;
        store.put_job(job);
    }

    let outcome = tokio::time::timeout(
        timeout,
        solve(store, routing, &item.request, service_time_min),
    )
    .await;

    let final_state = match outcome {
        Ok(Ok(result)) => JobState::Done { result },
        Ok(Err(AppError::Infeasible { unassigned })) => {
            warn!(job_id = %job_id, count = unassigned.len(), "job infeasible");
            JobState::Failed {
                reason: format!("infeasible: {} stop(s) could not be assigned", unassigned.len()),
            }
        }
        Ok(Err(e)) => {
            error!(job_id = %job_id, error = %e, "job failed");
            JobState::Failed { reason: e.to_string() }
        }
        Err(_) => {
            warn!(job_id = %job_id, "job exceeded solver timeout");
            JobState::Failed { reason: "timeout".to_string() }
        }
    };

    if let Some(mut job) = store.get_job(job_id) {
        job.state = final_state;
        job.completed_at = Some(Utc::now());
        store.put_job(job);
    }
}

async fn solve(
    store: &SharedEntityStore,
    routing: &Arc<dyn RoutingService>,
    request: &OptimizeRouteRequest,
    service_time_min: f64,
) -> Result<OptimizationResult, AppError> {
    let depot = store
        .get_depot(request.depot_id)
        .ok_or_else(|| AppError::Validation(format!("unknown depot {}", request.depot_id)))?;
    let vehicles = store.get_vehicles(&request.vehicle_ids);
    if vehicles.len() != request.vehicle_ids.len() {
        return Err(AppError::Validation("one or more vehicle ids are unknown".into()));
    }
    let stops = store.get_stops(&request.stop_ids);
    if stops.len() != request.stop_ids.len() {
        return Err(AppError::Validation("one or more stop ids are unknown".into()));
    }

    let mut locations = vec![depot.location];
    locations.extend(stops.iter().map(|s| s.location));

    let matrices = routing
        .get_matrices(&locations)
        .await
        .map_err(|e| AppError::MatrixUnavailable(e.to_string()))?;

    let solver = VrptwSolver::new(&vehicles, &stops, &matrices, depot.open_time, service_time_min);
    let solution = solver.solve();

    if !solution.unassigned.is_empty() {
        return Err(AppError::Infeasible { unassigned: solution.unassigned });
    }

    let mut route_ids = Vec::with_capacity(solution.routes.len());
    let mut warnings = Vec::new();

    for solved in &solution.routes {
        let route_id = Uuid::new_v4();
        let route_stops: Vec<RouteStop> = solved
            .stops
            .iter()
            .enumerate()
            .map(|(sequence, s)| {
                let stop = &stops[s.stop_index];
                if s.late {
                    warnings.push(RouteWarning {
                        stop_id: Some(stop.id),
                        warning_type: "TIME_WINDOW_MISSED".to_string(),
                        message: format!("arrival at stop {} falls outside its window", stop.id),
                    });
                }
                RouteStop {
                    stop_id: stop.id,
                    sequence,
                    location: stop.location,
                    planned_arrival: minutes_to_time(s.arrival_min),
                    planned_arrival_min: s.arrival_min,
                    late: s.late,
                }
            })
            .collect();

        let route = Route {
            id: route_id,
            vehicle_id: solved.vehicle_id,
            date: request.date,
            stops: route_stops,
            total_distance_km: solved.distance_km,
            total_time_min: solved.time_min,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.put_route(route);
        route_ids.push(route_id);
    }

    Ok(OptimizationResult {
        route_ids,
        greedy_distance_km: solution.greedy_distance_km,
        total_distance_km: solution.total_distance_km,
        improvement_pct: solution.improvement_pct,
        num_routes: solution.routes.len(),
        solver_log: solution.solver_log,
        optimization_score: solution.optimization_score,
        warnings,
    })
}

fn minutes_to_time(minutes: f64) -> chrono::NaiveTime {
    let total = minutes.round().clamp(0.0, 24.0 * 60.0 - 1.0) as u32;
    chrono::NaiveTime::from_hms_opt(total / 60, total % 60, 0)
        .unwrap_or_else(|| chrono::NaiveTime::from_hms_opt(23, 59, 0).unwrap())
}
