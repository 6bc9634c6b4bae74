//! The `/ws/tasks` fan-out channel (C17).

use crate::base::{ChannelHandler, ConnectionHandle, ConnectionRegistry};
use agent_core::error::ErrorCode;
use agent_tasks::TaskList;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const MIN_UPDATE_INTERVAL_MS: u32 = 1000;
const MAX_UPDATE_INTERVAL_MS: u32 = 30000;
const DEFAULT_UPDATE_INTERVAL_MS: u32 = 1000;

/// Shares the single process-wide `TaskList` instance (§6) rather than
/// owning its own copy: the composition root hands this handler the same
/// `Arc<Mutex<TaskList>>` it keeps for the rest of the agent, so a mutation
/// made through the WS channel and one made through the planner/thinking
/// loop are never looking at two divergent in-memory copies of the same
/// on-disk file.
pub struct TasksChannelHandler {
    tasks: Arc<Mutex<TaskList>>,
    goal: String,
    subscriptions: parking_lot::RwLock<HashMap<Uuid, u32>>,
}

impl TasksChannelHandler {
    pub fn new(tasks: Arc<Mutex<TaskList>>, goal: impl Into<String>) -> Self {
        Self {
            tasks,
            goal: goal.into(),
            subscriptions: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    async fn snapshot(&self) -> Value {
        let mut tasks = self.tasks.lock().await;
        let is_done = tasks.check_if_all_done();
        let total = tasks.tasks().len();
        let completed = tasks.tasks().iter().filter(|t| t.done).count();
        json!({
            "type": "tasks_update",
            "tasks": tasks.tasks().iter().map(|t| json!({
                "id": t.id,
                "details": t.details,
                "done_criteria": t.done_criteria,
                "progress": t.progress,
                "done": t.done,
            })).collect::<Vec<_>>(),
            "total": total,
            "completed": completed,
            "pending": total - completed,
            "goal": self.goal,
            "is_done": is_done,
        })
    }

    fn error(conn: &ConnectionHandle, code: ErrorCode, message: impl Into<String>) {
        conn.send_json(&json!({
            "type": "error",
            "error_code": code.as_str(),
            "message": message.into(),
        }));
    }

    async fn handle_subscribe(&self, conn: &ConnectionHandle, payload: &Value) {
        let requested = payload
            .get("update_interval")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(DEFAULT_UPDATE_INTERVAL_MS);
        if !(MIN_UPDATE_INTERVAL_MS..=MAX_UPDATE_INTERVAL_MS).contains(&requested) {
            Self::error(
                conn,
                ErrorCode::InvalidInterval,
                format!("update_interval must be within [{MIN_UPDATE_INTERVAL_MS}, {MAX_UPDATE_INTERVAL_MS}] ms, got {requested}"),
            );
            return;
        }
        self.subscriptions.write().insert(conn.id, requested);
        conn.send_json(&self.snapshot().await);
    }

    fn handle_unsubscribe(&self, conn: &ConnectionHandle) {
        self.subscriptions.write().remove(&conn.id);
    }

    async fn handle_get_tasks(&self, conn: &ConnectionHandle) {
        conn.send_json(&self.snapshot().await);
    }

    async fn handle_add_task(&self, conn: &ConnectionHandle, registry: &ConnectionRegistry, payload: &Value) {
        let (Some(details), Some(done_criteria)) = (
            payload.get("details").and_then(Value::as_str),
            payload.get("done_criteria").and_then(Value::as_str),
        ) else {
            Self::error(conn, ErrorCode::ValidationError, "add_task requires details and done_criteria");
            return;
        };
        let task = match self.tasks.lock().await.add(details, done_criteria).await {
            Ok(task) => task,
            Err(e) => {
                Self::error(conn, ErrorCode::OperationFailed, e.to_string());
                return;
            }
        };
        conn.send_json(&json!({
            "type": "task_added",
            "id": task.id,
            "details": task.details,
            "done_criteria": task.done_criteria,
        }));
        self.broadcast_to_subscribers(registry, Some(conn.id)).await;
    }

    async fn handle_update_task(&self, conn: &ConnectionHandle, registry: &ConnectionRegistry, payload: &Value) {
        let Some(task_id) = payload.get("task_id").and_then(Value::as_str) else {
            Self::error(conn, ErrorCode::ValidationError, "update_task requires task_id");
            return;
        };
        let progress = payload.get("progress").and_then(Value::as_str).unwrap_or("");
        match self.tasks.lock().await.update_task_progress(task_id, progress).await {
            Ok(true) => {
                conn.send_json(&json!({"type": "task_updated", "task_id": task_id, "progress": progress}));
                self.broadcast_to_subscribers(registry, Some(conn.id)).await;
            }
            Ok(false) => Self::error(conn, ErrorCode::ValidationError, format!("no task with id {task_id}")),
            Err(e) => Self::error(conn, ErrorCode::OperationFailed, e.to_string()),
        }
    }

    async fn handle_delete_task(&self, conn: &ConnectionHandle, registry: &ConnectionRegistry, payload: &Value) {
        let Some(task_id) = payload.get("task_id").and_then(Value::as_str) else {
            Self::error(conn, ErrorCode::ValidationError, "delete_task requires task_id");
            return;
        };
        match self.tasks.lock().await.del_task_by_id(task_id).await {
            Ok(true) => {
                conn.send_json(&json!({"type": "task_deleted", "task_id": task_id}));
                self.broadcast_to_subscribers(registry, Some(conn.id)).await;
            }
            Ok(false) => Self::error(conn, ErrorCode::ValidationError, format!("no task with id {task_id}")),
            Err(e) => Self::error(conn, ErrorCode::OperationFailed, e.to_string()),
        }
    }

    async fn handle_mark_done(&self, conn: &ConnectionHandle, registry: &ConnectionRegistry, payload: &Value) {
        let Some(task_id) = payload.get("task_id").and_then(Value::as_str) else {
            Self::error(conn, ErrorCode::ValidationError, "mark_done requires task_id");
            return;
        };
        match self.tasks.lock().await.mark_task_done(task_id).await {
            Ok(true) => {
                conn.send_json(&json!({"type": "task_marked_done", "task_id": task_id}));
                self.broadcast_to_subscribers(registry, Some(conn.id)).await;
            }
            Ok(false) => Self::error(conn, ErrorCode::ValidationError, format!("no task with id {task_id}")),
            Err(e) => Self::error(conn, ErrorCode::OperationFailed, e.to_string()),
        }
    }

    /// Mutations are event-driven: broadcast to every subscribed
    /// connection except the originator, never on a timer.
    async fn broadcast_to_subscribers(&self, registry: &ConnectionRegistry, exclude: Option<Uuid>) {
        let subscribed: Vec<Uuid> = self.subscriptions.read().keys().copied().collect();
        if subscribed.is_empty() {
            return;
        }
        let snapshot = self.snapshot().await;
        registry.send_to(&subscribed, &snapshot, exclude);
    }
}

#[async_trait]
impl ChannelHandler for TasksChannelHandler {
    fn name(&self) -> &'static str {
        "tasks"
    }

    async fn on_message(&self, conn: &ConnectionHandle, registry: &ConnectionRegistry, msg_type: &str, payload: &Value) {
        match msg_type {
            "subscribe" => self.handle_subscribe(conn, payload).await,
            "unsubscribe" => self.handle_unsubscribe(conn),
            "get_tasks" => self.handle_get_tasks(conn).await,
            "add_task" => self.handle_add_task(conn, registry, payload).await,
            "update_task" => self.handle_update_task(conn, registry, payload).await,
            "delete_task" => self.handle_delete_task(conn, registry, payload).await,
            "mark_done" => self.handle_mark_done(conn, registry, payload).await,
            other => Self::error(conn, ErrorCode::UnknownMessageType, format!("unknown message type: {other}")),
        }
    }

    async fn on_cleanup(&self, conn_id: Uuid) {
        self.subscriptions.write().remove(&conn_id);
    }
}
