//! Per-route pub/sub event bus.
//!
//! Hot subscriptions (no replay), fan-out publish, and a slow subscriber gets
//! disconnected rather than stalling the publisher. In-memory, shared via
//! `Arc` across the worker pool and the rerouter.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Broadcast payload delivered to every subscriber of a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerouteEvent {
    pub route_id: Uuid,
    pub stops: Vec<RerouteStopEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerouteStopEvent {
    pub stop_id: Uuid,
    pub sequence: usize,
    pub planned_arrival: NaiveTime,
    pub planned_arrival_min: f64,
    pub lat: f64,
    pub lng: f64,
    pub late: bool,
}

pub type Subscription = mpsc::Receiver<RerouteEvent>;

/// Per-route topic registry. A slow subscriber's channel fills up and is
/// dropped on the next publish rather than blocking other subscribers.
pub struct RouteEventBus {
    buffer: usize,
    topics: Mutex<HashMap<Uuid, Vec<mpsc::Sender<RerouteEvent>>>>,
}

impl RouteEventBus {
    pub fn new(buffer: usize) -> Self {
        Self { buffer, topics: Mutex::new(HashMap::new()) }
    }

    /// Subscribe to a route's topic. Only events published after this call
    /// are delivered — there is no replay of past events.
    pub fn subscribe(&self, route_id: Uuid) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        self.topics.lock().entry(route_id).or_default().push(tx);
        rx
    }

    /// Fan out an event to every current subscriber of `route_id`. Non-blocking:
    /// a subscriber whose channel is full is dropped from the topic instead of
    /// stalling the publish.
    pub fn publish(&self, route_id: Uuid, event: RerouteEvent) {
        let mut topics = self.topics.lock();
        if let Some(subscribers) = topics.get_mut(&route_id) {
            subscribers.retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(%route_id, "subscriber buffer full, disconnecting");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
        }
    }

    pub fn subscriber_count(&self, route_id: Uuid) -> usize {
        self.topics.lock().get(&route_id).map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for RouteEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

pub type SharedRouteEventBus = Arc<RouteEventBus>;
