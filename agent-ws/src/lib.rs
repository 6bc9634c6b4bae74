//! WebSocket fan-out layer (C17): a generic base connection handler plus
//! the `/ws/tasks` channel built on top of it.

pub mod base;
pub mod tasks_channel;

pub use base::{ChannelHandler, ConnectionHandle, ConnectionRegistry, HeartbeatConfig};
pub use tasks_channel::TasksChannelHandler;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

#[derive(Clone)]
struct TasksState {
    registry: Arc<ConnectionRegistry>,
    handler: Arc<TasksChannelHandler>,
    heartbeat: HeartbeatConfig,
}

async fn tasks_ws_handler(State(state): State<TasksState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        base::run_connection(socket, state.registry, state.handler, state.heartbeat).await;
    })
}

/// Builds the `/ws/tasks` route. Callers nest this into their own axum
/// app alongside whatever other channels they add.
pub fn tasks_router(
    registry: Arc<ConnectionRegistry>,
    handler: Arc<TasksChannelHandler>,
    heartbeat: HeartbeatConfig,
) -> Router {
    let state = TasksState {
        registry,
        handler,
        heartbeat,
    };
    Router::new().route("/ws/tasks", get(tasks_ws_handler)).with_state(state)
}
