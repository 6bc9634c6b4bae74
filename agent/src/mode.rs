//! Mode state machine (C13): a process-wide registry of mode handlers, one
//! active mode at a time, auto-restore timers, and the environment-update
//! fan-out.
//!
//! `ModeHandler` and `EnvironmentListener` both live here, next to
//! `ModeManager`, rather than in `agent-world` or `agent-registry`: the
//! combat handler needs to both receive environment updates and request
//! mode transitions, and the composition root is the only place that can
//! see both ends without either crate depending on the other.

use agent_core::error::ModeTransitionError;
use agent_registry::mode_config::ModeConfig;
use agent_world::environment::EnvironmentUpdate;
use async_trait::async_trait;
use futures_util::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const HISTORY_CAPACITY: usize = 50;

/// A handler's suggested transition, ranked by the priority rule in
/// `ModeManager::set_mode`.
#[derive(Debug, Clone)]
pub struct ModeTransition {
    pub target_mode: String,
    pub priority: i32,
    pub condition_name: String,
}

#[async_trait]
pub trait ModeHandler: Send + Sync {
    fn mode_key(&self) -> &'static str;

    async fn can_enter(&self) -> bool {
        true
    }
    async fn can_exit(&self) -> bool {
        true
    }
    async fn on_enter(&self, reason: &str, triggered_by: &str);
    async fn on_exit(&self, reason: &str, triggered_by: &str);

    /// Priority-sorted candidate transitions; the first acceptable one
    /// wins (§4.13's "Transition semantics").
    async fn check_transitions(&self) -> Vec<ModeTransition> {
        Vec::new()
    }
}

#[async_trait]
pub trait EnvironmentListener: Send + Sync {
    async fn on_environment_updated(&self, update: &EnvironmentUpdate);
}

#[derive(Debug, Clone)]
pub struct ModeTransitionRecord {
    pub from_mode: String,
    pub to_mode: String,
    pub timestamp: f64,
    pub reason: String,
    pub triggered_by: String,
}

struct ActiveState {
    current: String,
    mode_start: Instant,
    history: VecDeque<ModeTransitionRecord>,
    restore_task: Option<JoinHandle<()>>,
    last_environment_update: Option<EnvironmentUpdate>,
}

/// Owns the mode registry and the single active mode. Handlers are
/// registered once at construction; environment listeners may be
/// registered and unregistered at any time.
pub struct ModeManager {
    handlers: HashMap<String, Arc<dyn ModeHandler>>,
    configs: HashMap<String, ModeConfig>,
    state: Mutex<ActiveState>,
    listeners: Mutex<Vec<Arc<dyn EnvironmentListener>>>,
}

impl ModeManager {
    pub fn new(handlers: Vec<Arc<dyn ModeHandler>>, configs: HashMap<String, ModeConfig>) -> Self {
        let mut by_key = HashMap::new();
        for h in handlers {
            by_key.insert(h.mode_key().to_string(), h);
        }
        Self {
            handlers: by_key,
            configs,
            state: Mutex::new(ActiveState {
                current: "main_mode".to_string(),
                mode_start: Instant::now(),
                history: VecDeque::with_capacity(HISTORY_CAPACITY),
                restore_task: None,
                last_environment_update: None,
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub async fn current_mode(&self) -> String {
        self.state.lock().await.current.clone()
    }

    pub fn register_listener(&self, listener: Arc<dyn EnvironmentListener>) {
        // Called from async contexts only via `register_listener_async`;
        // kept sync here because registration never races a transition in
        // practice (composition root does it once at startup).
        let listeners = self.listeners.try_lock();
        if let Ok(mut listeners) = listeners {
            listeners.push(listener);
        }
    }

    pub async fn register_listener_async(&self, listener: Arc<dyn EnvironmentListener>) {
        self.listeners.lock().await.push(listener);
    }

    pub async fn set_mode(
        self: &Arc<Self>,
        new_mode: &str,
        reason: &str,
        triggered_by: &str,
    ) -> Result<(), ModeTransitionError> {
        self.set_mode_inner(new_mode, reason, triggered_by, false).await
    }

    pub async fn force_restore_main_mode(self: &Arc<Self>, reason: &str) -> Result<(), ModeTransitionError> {
        self.set_mode_inner("main_mode", reason, "force_restore", true).await
    }

    async fn set_mode_inner(
        self: &Arc<Self>,
        new_mode: &str,
        reason: &str,
        triggered_by: &str,
        bypass_priority: bool,
    ) -> Result<(), ModeTransitionError> {
        let target_config = self
            .configs
            .get(new_mode)
            .ok_or_else(|| ModeTransitionError::UnknownMode(new_mode.to_string()))?
            .clone();

        let mut state = self.state.lock().await;
        if state.current == new_mode {
            return Err(ModeTransitionError::AlreadyActive(new_mode.to_string()));
        }

        if !bypass_priority && new_mode != "main_mode" {
            if let Some(current_config) = self.configs.get(&state.current) {
                if current_config.priority > target_config.priority {
                    return Err(ModeTransitionError::PriorityTooLow {
                        current: state.current.clone(),
                        current_priority: current_config.priority,
                        target: new_mode.to_string(),
                    });
                }
            }
        }

        if let Some(current_handler) = self.handlers.get(&state.current) {
            if !current_handler.can_exit().await {
                return Err(ModeTransitionError::RejectedByHandler(format!(
                    "{} refused to exit",
                    state.current
                )));
            }
        }

        let from_mode = state.current.clone();
        if let Some(current_handler) = self.handlers.get(&from_mode) {
            current_handler.on_exit(reason, triggered_by).await;
        }

        if state.history.len() == HISTORY_CAPACITY {
            state.history.pop_front();
        }
        state.history.push_back(ModeTransitionRecord {
            from_mode: from_mode.clone(),
            to_mode: new_mode.to_string(),
            timestamp: now_unix_s(),
            reason: reason.to_string(),
            triggered_by: triggered_by.to_string(),
        });

        state.current = new_mode.to_string();
        state.mode_start = Instant::now();

        if let Some(task) = state.restore_task.take() {
            task.abort();
        }

        if target_config.auto_restore && target_config.restore_delay_s > 0.0 {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let manager = self.clone();
                    let delay = Duration::from_secs_f64(target_config.restore_delay_s);
                    let task = handle.spawn(async move {
                        tokio::time::sleep(delay).await;
                        if let Err(e) = manager.force_restore_main_mode("auto_restore_timer").await {
                            log::warn!("auto-restore to main_mode failed: {e}");
                        }
                    });
                    state.restore_task = Some(task);
                }
                Err(_) => {
                    log::warn!("no tokio runtime reachable; skipping auto-restore scheduling for {new_mode}");
                }
            }
        }

        if let Some(new_handler) = self.handlers.get(new_mode) {
            if !new_handler.can_enter().await {
                log::warn!("{new_mode} rejected entry after transition committed");
            }
            new_handler.on_enter(reason, triggered_by).await;
        }

        Ok(())
    }

    /// Asks the current handler for suggestions and applies the first one
    /// the priority rule accepts. Returns whether a switch occurred.
    pub async fn check_auto_transitions(self: &Arc<Self>) -> bool {
        let current = self.current_mode().await;
        let Some(handler) = self.handlers.get(&current) else {
            return false;
        };
        let mut suggestions = handler.check_transitions().await;
        suggestions.sort_by(|a, b| b.priority.cmp(&a.priority));

        for suggestion in suggestions {
            if suggestion.target_mode == current {
                continue;
            }
            if self
                .set_mode(&suggestion.target_mode, &suggestion.condition_name, "auto_transition")
                .await
                .is_ok()
            {
                return true;
            }
        }
        false
    }

    /// Fans `update` out to every registered listener under its own
    /// try/catch equivalent: a panicking listener never stops the others.
    pub async fn notify_environment_updated(&self, update: EnvironmentUpdate) {
        {
            let mut state = self.state.lock().await;
            state.last_environment_update = Some(update.clone());
        }
        let listeners = self.listeners.lock().await.clone();
        for listener in listeners {
            let update = update.clone();
            let result = std::panic::AssertUnwindSafe(async move {
                listener.on_environment_updated(&update).await;
            })
            .catch_unwind()
            .await;
            if result.is_err() {
                log::error!("environment listener panicked handling an update");
            }
        }
    }

    pub async fn last_environment_update(&self) -> Option<EnvironmentUpdate> {
        self.state.lock().await.last_environment_update.clone()
    }

    pub async fn history(&self) -> Vec<ModeTransitionRecord> {
        self.state.lock().await.history.iter().cloned().collect()
    }

    pub async fn mode_elapsed(&self) -> Duration {
        self.state.lock().await.mode_start.elapsed()
    }
}

fn now_unix_s() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct RecordingHandler {
        key: &'static str,
        entered: AtomicBool,
    }

    #[async_trait]
    impl ModeHandler for RecordingHandler {
        fn mode_key(&self) -> &'static str {
            self.key
        }
        async fn on_enter(&self, _reason: &str, _triggered_by: &str) {
            self.entered.store(true, Ordering::SeqCst);
        }
        async fn on_exit(&self, _reason: &str, _triggered_by: &str) {
            self.entered.store(false, Ordering::SeqCst);
        }
    }

    fn configs() -> HashMap<String, ModeConfig> {
        agent_registry::mode_config::built_in_modes()
    }

    #[tokio::test]
    async fn unknown_mode_is_refused() {
        let manager = Arc::new(ModeManager::new(Vec::new(), configs()));
        let err = manager.set_mode("no_such_mode", "r", "t").await.unwrap_err();
        assert!(matches!(err, ModeTransitionError::UnknownMode(_)));
    }

    #[tokio::test]
    async fn already_active_is_refused() {
        let manager = Arc::new(ModeManager::new(Vec::new(), configs()));
        let err = manager.set_mode("main_mode", "r", "t").await.unwrap_err();
        assert!(matches!(err, ModeTransitionError::AlreadyActive(_)));
    }

    #[tokio::test]
    async fn higher_priority_current_mode_blocks_lower_priority_target() {
        let combat = Arc::new(RecordingHandler {
            key: "combat_mode",
            entered: AtomicBool::new(false),
        });
        let manager = Arc::new(ModeManager::new(vec![combat.clone()], configs()));
        manager.set_mode("combat_mode", "threat", "t").await.unwrap();
        let err = manager.set_mode("furnace_gui", "r", "t").await.unwrap_err();
        assert!(matches!(err, ModeTransitionError::PriorityTooLow { .. }));
    }

    #[tokio::test]
    async fn transition_records_history_and_calls_handler() {
        let combat = Arc::new(RecordingHandler {
            key: "combat_mode",
            entered: AtomicBool::new(false),
        });
        let manager = Arc::new(ModeManager::new(vec![combat.clone()], configs()));
        manager.set_mode("combat_mode", "threat", "tester").await.unwrap();
        assert!(combat.entered.load(Ordering::SeqCst));
        let history = manager.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to_mode, "combat_mode");
    }

    #[tokio::test]
    async fn force_restore_bypasses_priority() {
        let combat = Arc::new(RecordingHandler {
            key: "combat_mode",
            entered: AtomicBool::new(false),
        });
        let manager = Arc::new(ModeManager::new(vec![combat.clone()], configs()));
        manager.set_mode("combat_mode", "threat", "t").await.unwrap();
        manager.force_restore_main_mode("clear").await.unwrap();
        assert_eq!(manager.current_mode().await, "main_mode");
    }
}
