//! Base WebSocket connection handling shared by every fan-out channel
//! (C17): accept/welcome, heartbeat supervision, the receive loop, and
//! broadcast with dead-connection cleanup.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(90),
        }
    }
}

/// Per-connection bookkeeping (§4.17's `{connectedAt, lastHeartbeat,
/// lastActivity, isActive, handlerName}`).
pub struct ConnectionHandle {
    pub id: Uuid,
    pub handler_name: String,
    pub connected_at: Instant,
    last_heartbeat: parking_lot::Mutex<Instant>,
    last_activity: parking_lot::Mutex<Instant>,
    is_active: AtomicBool,
    outbox: mpsc::UnboundedSender<Message>,
}

impl ConnectionHandle {
    pub fn send_json(&self, value: &Value) {
        if self.outbox.send(Message::Text(value.to_string())).is_err() {
            self.is_active.store(false, Ordering::SeqCst);
        }
    }

    pub fn touch_activity(&self) {
        let now = Instant::now();
        *self.last_activity.lock() = now;
        *self.last_heartbeat.lock() = now;
    }

    pub fn touch_heartbeat(&self) {
        *self.last_heartbeat.lock() = Instant::now();
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    fn seconds_since_heartbeat(&self) -> f64 {
        self.last_heartbeat.lock().elapsed().as_secs_f64()
    }

    /// Builds a standalone handle wired to a channel the caller can drain,
    /// bypassing the real socket accept/heartbeat machinery. Used by
    /// channel-handler unit tests (e.g. `tasks_channel`) that only care
    /// about what gets sent back, not the transport around it.
    #[cfg(any(test, feature = "test-util"))]
    pub fn for_test(handler_name: &str) -> (Arc<Self>, mpsc::UnboundedReceiver<Message>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        let handle = Arc::new(Self {
            id: Uuid::new_v4(),
            handler_name: handler_name.to_string(),
            connected_at: Instant::now(),
            last_heartbeat: parking_lot::Mutex::new(Instant::now()),
            last_activity: parking_lot::Mutex::new(Instant::now()),
            is_active: AtomicBool::new(true),
            outbox,
        });
        (handle, rx)
    }
}

/// The connected-set every channel broadcasts against.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<Uuid, Arc<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, handle: Arc<ConnectionHandle>) {
        self.connections.write().insert(handle.id, handle);
    }

    fn remove(&self, id: Uuid) {
        self.connections.write().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Sends `message` to every connected handle except `exclude`, dropping
    /// any connection whose send failed.
    pub fn broadcast(&self, message: &Value, exclude: Option<Uuid>) {
        let targets: Vec<Arc<ConnectionHandle>> = self
            .connections
            .read()
            .values()
            .filter(|h| Some(h.id) != exclude)
            .cloned()
            .collect();
        self.send_and_reap(&targets, message);
    }

    /// Sends `message` to exactly the connections in `ids`, excluding
    /// `exclude`. Used by channels whose fan-out is scoped to a
    /// subscriber set rather than every connected socket.
    pub fn send_to(&self, ids: &[Uuid], message: &Value, exclude: Option<Uuid>) {
        let targets: Vec<Arc<ConnectionHandle>> = {
            let connections = self.connections.read();
            ids.iter()
                .filter(|id| Some(**id) != exclude)
                .filter_map(|id| connections.get(id).cloned())
                .collect()
        };
        self.send_and_reap(&targets, message);
    }

    fn send_and_reap(&self, targets: &[Arc<ConnectionHandle>], message: &Value) {
        let mut dead = Vec::new();
        for handle in targets {
            handle.send_json(message);
            if !handle.is_active() {
                dead.push(handle.id);
            }
        }
        for id in dead {
            self.remove(id);
        }
    }
}

/// Implemented by each fan-out channel (`/ws/tasks`, …) to receive
/// dispatched, non-heartbeat envelopes.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_message(&self, conn: &ConnectionHandle, registry: &ConnectionRegistry, msg_type: &str, payload: &Value);

    async fn on_cleanup(&self, conn_id: Uuid);
}

/// Drives one accepted socket end to end: welcome, heartbeat task, receive
/// loop, and cleanup on disconnect (§4.17's base handler contract).
pub async fn run_connection(
    socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    handler: Arc<dyn ChannelHandler>,
    config: HeartbeatConfig,
) {
    let (mut sink, mut stream) = socket.split();
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let conn = Arc::new(ConnectionHandle {
        id: Uuid::new_v4(),
        handler_name: handler.name().to_string(),
        connected_at: Instant::now(),
        last_heartbeat: parking_lot::Mutex::new(Instant::now()),
        last_activity: parking_lot::Mutex::new(Instant::now()),
        is_active: AtomicBool::new(true),
        outbox: outbox_tx,
    });
    registry.insert(conn.clone());

    conn.send_json(&json!({
        "type": "welcome",
        "message": format!("connected to {}", handler.name()),
        "timestamp": now_unix_s(),
        "config": {
            "heartbeat_interval": config.interval.as_secs(),
            "timeout": config.timeout.as_secs(),
        },
    }));

    let heartbeat_conn = conn.clone();
    let heartbeat_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        loop {
            ticker.tick().await;
            if heartbeat_conn.seconds_since_heartbeat() > config.timeout.as_secs_f64() {
                heartbeat_conn.is_active.store(false, Ordering::SeqCst);
                break;
            }
            heartbeat_conn.send_json(&json!({
                "type": "ping",
                "timestamp": now_unix_s(),
                "message": "heartbeat",
            }));
        }
    });

    loop {
        if !conn.is_active() {
            break;
        }
        let next = tokio::time::timeout(config.timeout, stream.next()).await;
        let message = match next {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(_))) | Ok(None) | Err(_) => break,
        };

        match message {
            Message::Text(text) => {
                conn.touch_activity();
                dispatch_envelope(&conn, &registry, &handler, &text).await;
            }
            Message::Binary(_) => {
                conn.touch_activity();
            }
            Message::Ping(_) | Message::Pong(_) => {
                conn.touch_heartbeat();
            }
            Message::Close(_) => break,
        }
    }

    heartbeat_task.abort();
    writer.abort();
    handler.on_cleanup(conn.id).await;
    registry.remove(conn.id);
}

async fn dispatch_envelope(
    conn: &ConnectionHandle,
    registry: &ConnectionRegistry,
    handler: &Arc<dyn ChannelHandler>,
    text: &str,
) {
    let parsed: Result<Value, _> = serde_json::from_str(text);
    let Ok(value) = parsed else {
        conn.send_json(&json!({
            "type": "error",
            "error_code": "INVALID_JSON",
            "message": "payload was not valid JSON",
        }));
        return;
    };
    let Some(msg_type) = value.get("type").and_then(Value::as_str) else {
        conn.send_json(&json!({
            "type": "error",
            "error_code": "UNKNOWN_MESSAGE_TYPE",
            "message": "message is missing a type field",
        }));
        return;
    };

    match msg_type {
        "ping" => {
            let client_ts = value.get("timestamp").cloned().unwrap_or(Value::Null);
            conn.send_json(&json!({
                "type": "pong",
                "timestamp": client_ts,
                "server_timestamp": now_unix_s(),
            }));
        }
        "pong" => conn.touch_heartbeat(),
        other => handler.on_message(conn, registry, other, &value).await,
    }
}

fn now_unix_s() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
