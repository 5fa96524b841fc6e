//! NATS message handlers

pub mod ping;
pub mod routes;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use futures::future::FutureExt;
use tracing::info;

use crate::config::Config;
use crate::services::bus::RouteEventBus;
use crate::services::dispatcher::{Dispatcher, DispatcherConfig};
use crate::services::rerouter::Rerouter;
use crate::services::routing::create_routing_service_with_fallback;
use crate::store::EntityStore;

pub async fn start_handlers(client: Client, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let routing_service = Arc::from(
        create_routing_service_with_fallback(
            config.external_matrix_config(),
            config.external_matrix_cap,
            config.avg_speed_kmh,
            0,
        )
        .await,
    );
    info!("Routing service initialized");

    let store = Arc::new(EntityStore::default());
    let bus = Arc::new(RouteEventBus::new(config.bus_subscriber_buffer));

    let dispatcher = Arc::new(Dispatcher::spawn(
        Arc::clone(&store),
        Arc::clone(&routing_service),
        DispatcherConfig {
            worker_pool_size: config.worker_pool_size,
            service_time_min: config.service_time_min,
            solver_timeout_ms: config.solver_timeout_ms,
        },
    ));

    let rerouter = Arc::new(Rerouter::new(
        Arc::clone(&store),
        Arc::clone(&routing_service),
        Arc::clone(&bus),
        config.service_time_min,
    ));

    let ping_sub = client.subscribe("vrptw.ping").await?;
    let optimize_sub = client.subscribe("vrptw.routes.optimize").await?;
    let status_sub = client.subscribe("vrptw.routes.status").await?;
    let detail_sub = client.subscribe("vrptw.routes.detail").await?;
    let reroute_sub = client.subscribe("vrptw.routes.reroute").await?;

    let ping_handle = tokio::spawn(ping::handle_ping(client.clone(), ping_sub));
    let optimize_handle =
        tokio::spawn(routes::handle_optimize(client.clone(), optimize_sub, Arc::clone(&dispatcher)));
    let status_handle =
        tokio::spawn(routes::handle_status(client.clone(), status_sub, Arc::clone(&dispatcher)));
    let detail_handle =
        tokio::spawn(routes::handle_detail(client.clone(), detail_sub, Arc::clone(&store)));
    let reroute_handle =
        tokio::spawn(routes::handle_reroute(client.clone(), reroute_sub, Arc::clone(&rerouter)));

    info!("All handlers started, waiting for messages...");

    let handles = vec![
        ping_handle.boxed(),
        optimize_handle.boxed(),
        status_handle.boxed(),
        detail_handle.boxed(),
        reroute_handle.boxed(),
    ];

    let (result, _index, _remaining) = futures::future::select_all(handles).await;
    tracing::error!("A handler finished unexpectedly: {:?}", result);

    Ok(())
}
