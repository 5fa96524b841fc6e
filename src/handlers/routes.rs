//! NATS handlers for the VRPTW job and rerouting surface.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::services::bus::SharedRouteEventBus;
use crate::services::dispatcher::Dispatcher;
use crate::services::rerouter::Rerouter;
use crate::store::SharedEntityStore;
use crate::types::{
    ErrorResponse, JobStatusResponse, JobSubmitResponse, OptimizeRouteRequest, Request,
    SuccessResponse, TrafficEvent,
};

/// `vrptw.routes.optimize` — submit a new optimization job, reply immediately.
pub async fn handle_optimize(
    client: Client,
    mut subscriber: Subscriber,
    dispatcher: Arc<Dispatcher>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let Some(reply) = msg.reply.clone() else {
            warn!("optimize message without reply subject");
            continue;
        };

        let request: Request<OptimizeRouteRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("failed to parse optimize request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "invalid_request", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let job_id = dispatcher.submit(request.payload);
        let response = SuccessResponse::new(
            request.id,
            JobSubmitResponse { job_id, status: "queued" },
        );
        let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
    }
    Ok(())
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobIdRequest {
    job_id: Uuid,
}

/// `vrptw.routes.status` — poll a job's current state.
pub async fn handle_status(
    client: Client,
    mut subscriber: Subscriber,
    dispatcher: Arc<Dispatcher>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let Some(reply) = msg.reply.clone() else {
            warn!("status message without reply subject");
            continue;
        };

        let request: Request<JobIdRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("failed to parse status request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "invalid_request", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let response = match dispatcher.status(request.payload.job_id) {
            Some(job) => {
                let status: JobStatusResponse = (&job).into();
                serde_json::to_vec(&SuccessResponse::new(request.id, status))?
            }
            None => {
                let error = ErrorResponse::new(
                    request.id,
                    "not_found",
                    format!("job {} not found", request.payload.job_id),
                );
                serde_json::to_vec(&error)?
            }
        };
        let _ = client.publish(reply, response.into()).await;
    }
    Ok(())
}

/// `vrptw.routes.detail` — fetch a completed route by id.
pub async fn handle_detail(
    client: Client,
    mut subscriber: Subscriber,
    store: SharedEntityStore,
) -> Result<()> {
    #[derive(serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RouteIdRequest {
        route_id: Uuid,
    }

    while let Some(msg) = subscriber.next().await {
        let Some(reply) = msg.reply.clone() else {
            warn!("detail message without reply subject");
            continue;
        };

        let request: Request<RouteIdRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("failed to parse detail request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "invalid_request", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let response = match store.get_route(request.payload.route_id) {
            Some(route) => serde_json::to_vec(&SuccessResponse::new(request.id, route))?,
            None => serde_json::to_vec(&ErrorResponse::new(
                request.id,
                "not_found",
                format!("route {} not found", request.payload.route_id),
            ))?,
        };
        let _ = client.publish(reply, response.into()).await;
    }
    Ok(())
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RerouteRequest {
    route_id: Uuid,
    traffic_events: Vec<TrafficEvent>,
}

/// `vrptw.routes.reroute` — apply traffic events to a live route and
/// publish the resulting deltas on its event bus topic.
pub async fn handle_reroute(
    client: Client,
    mut subscriber: Subscriber,
    rerouter: Arc<Rerouter>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let Some(reply) = msg.reply.clone() else {
            warn!("reroute message without reply subject");
            continue;
        };

        let request: Request<RerouteRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("failed to parse reroute request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "invalid_request", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        debug!(route_id = %request.payload.route_id, "reroute requested");
        let response = match rerouter
            .reroute(request.payload.route_id, &request.payload.traffic_events)
            .await
        {
            Ok(()) => serde_json::to_vec(&SuccessResponse::new(request.id, ()))?,
            Err(e) => serde_json::to_vec(&e.into_response(request.id))?,
        };
        let _ = client.publish(reply, response.into()).await;
    }
    Ok(())
}

/// `vrptw.routes.{id}.events` subscriber for external consumers is bus-native
/// (no request/reply semantics); publishing onto NATS is left to a future
/// transport adapter and is out of scope for this worker's NATS surface.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_submit_response_status_is_queued() {
        let resp = JobSubmitResponse { job_id: Uuid::nil(), status: "queued" };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"queued\""));
    }
}
