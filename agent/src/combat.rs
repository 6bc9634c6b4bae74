//! Combat handler (C14): both a `ModeHandler` for `combat_mode` and an
//! `EnvironmentListener` that watches nearby-entity updates for hostiles.

use crate::mode::{EnvironmentListener, ModeHandler, ModeManager, ModeTransition};
use agent_bridge::bridge::BridgeClient;
use agent_config::ThreatDetectionConfig;
use agent_core::entity::EntityKind;
use agent_core::position::Position;
use agent_tasks::{EntryKind, ThinkingLog};
use agent_world::environment::{EnvironmentModel, EnvironmentUpdate};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::RwLock as AsyncRwLock;
use tokio::task::JoinHandle;

const HOSTILE_NAMES: &[&str] = &[
    "zombie",
    "skeleton",
    "creeper",
    "spider",
    "enderman",
    "witch",
    "blaze",
    "ghast",
    "magma_cube",
    "slime",
    "guardian",
    "elder_guardian",
    "wither_skeleton",
    "stray",
    "husk",
    "drowned",
    "phantom",
    "zombie_villager",
    "skeleton_horse",
    "zombie_horse",
    "evoker",
    "vindicator",
    "pillager",
    "ravager",
    "vex",
    "warden",
];

const MAX_NAMED_IN_NOTICE: usize = 3;
const MAX_RETRIES_PER_ATTACK: u32 = 2;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);
const MAX_SIMULTANEOUS_TARGETS: usize = 3;

pub fn is_hostile(entity: &EntityKind) -> bool {
    let base = entity.base();
    is_hostile_name_and_kind(&base.name, &base.kind)
}

/// The closed-set/substring check, usable from anywhere a bare name and
/// type string are available (e.g. the hurt-response pipeline's damage
/// source, which never carries a full `EntityKind`).
pub fn is_hostile_name_and_kind(name: &str, kind: &str) -> bool {
    let kind = kind.to_ascii_lowercase();
    let name = name.to_ascii_lowercase();
    if kind == "hostile" {
        return true;
    }
    if HOSTILE_NAMES.contains(&name.as_str()) {
        return true;
    }
    ["zombie", "skeleton", "creeper", "spider"]
        .iter()
        .any(|needle| name.contains(needle))
}

struct CombatState {
    in_combat: bool,
    started_at: Option<Instant>,
    active_threats: HashMap<String, Position>,
    attack_attempts: HashMap<String, u32>,
    attack_task: Option<JoinHandle<()>>,
}

impl Default for CombatState {
    fn default() -> Self {
        Self {
            in_combat: false,
            started_at: None,
            active_threats: HashMap::new(),
            attack_attempts: HashMap::new(),
            attack_task: None,
        }
    }
}

/// Tracks nearby hostiles and drives the continuous-attack loop while
/// `combat_mode` is active.
pub struct CombatHandler {
    bridge: Arc<dyn BridgeClient>,
    thinking_log: Arc<AsyncMutex<ThinkingLog>>,
    environment: Arc<AsyncRwLock<EnvironmentModel>>,
    config: ThreatDetectionConfig,
    mode_manager: parking_lot::RwLock<Weak<ModeManager>>,
    self_handle: parking_lot::RwLock<Weak<CombatHandler>>,
    state: AsyncMutex<CombatState>,
}

impl CombatHandler {
    pub fn new(
        bridge: Arc<dyn BridgeClient>,
        thinking_log: Arc<AsyncMutex<ThinkingLog>>,
        environment: Arc<AsyncRwLock<EnvironmentModel>>,
        config: ThreatDetectionConfig,
    ) -> Self {
        Self {
            bridge,
            thinking_log,
            environment,
            config,
            mode_manager: parking_lot::RwLock::new(Weak::new()),
            self_handle: parking_lot::RwLock::new(Weak::new()),
            state: AsyncMutex::new(CombatState::default()),
        }
    }

    /// Wires the reciprocal references the composition root creates after
    /// both `Arc`s exist. Never held onto strongly, to avoid a reference
    /// cycle between the mode manager and its own handler.
    pub fn bind(self: &Arc<Self>, mode_manager: &Arc<ModeManager>) {
        *self.mode_manager.write() = Arc::downgrade(mode_manager);
        *self.self_handle.write() = Arc::downgrade(self);
    }

    async fn bot_position(&self) -> Option<Position> {
        self.environment.read().await.snapshot().position
    }

    fn classify(&self, update: &EnvironmentUpdate) -> Vec<(String, Position)> {
        update
            .entities
            .iter()
            .filter(|e| is_hostile(e))
            .map(|e| (e.base().name.clone(), e.base().position))
            .collect()
    }

    async fn run_attack_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(self.config.attack_interval));
        loop {
            ticker.tick().await;

            let elapsed = {
                let state = self.state.lock().await;
                if !state.in_combat {
                    return;
                }
                state.started_at.map(|s| s.elapsed()).unwrap_or_default()
            };

            if elapsed.as_secs_f64() > self.config.threat_timeout {
                if let Some(manager) = self.mode_manager.read().upgrade() {
                    let _ = manager.force_restore_main_mode("combat_timeout").await;
                }
                return;
            }

            let targets = self.nearest_targets(MAX_SIMULTANEOUS_TARGETS).await;
            for name in targets {
                self.attack_one(&name).await;
            }
        }
    }

    async fn nearest_targets(&self, limit: usize) -> Vec<String> {
        let bot_position = self.bot_position().await;
        let state = self.state.lock().await;
        let mut threats: Vec<(&String, &Position)> = state.active_threats.iter().collect();
        if let Some(bot_position) = bot_position {
            threats.sort_by(|a, b| {
                let da = a.1.distance(&bot_position);
                let db = b.1.distance(&bot_position);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        threats.into_iter().take(limit).map(|(name, _)| name.clone()).collect()
    }

    async fn attack_one(&self, name: &str) {
        let attempts = {
            let state = self.state.lock().await;
            *state.attack_attempts.get(name).unwrap_or(&0)
        };
        if attempts >= self.config.max_attack_attempts {
            return;
        }

        let mut last_err = None;
        for attempt in 0..=MAX_RETRIES_PER_ATTACK {
            if attempt > 0 {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            match self.bridge.kill_mob(name).await {
                Ok(_) => {
                    self.state.lock().await.attack_attempts.remove(name);
                    return;
                }
                Err(e) => last_err = Some(e),
            }
        }

        log::warn!("kill_mob failed for {name} after retries: {last_err:?}");
        let mut state = self.state.lock().await;
        let count = state.attack_attempts.entry(name.to_string()).or_insert(0);
        *count += 1;
    }

    async fn all_threats_beyond_min_distance(&self, threats: &HashMap<String, Position>) -> bool {
        let Some(bot_position) = self.bot_position().await else {
            return true;
        };
        threats
            .values()
            .all(|pos| pos.distance(&bot_position) > self.config.min_distance())
    }
}

#[async_trait]
impl ModeHandler for CombatHandler {
    fn mode_key(&self) -> &'static str {
        "combat_mode"
    }

    async fn on_enter(&self, _reason: &str, _triggered_by: &str) {
        {
            let mut state = self.state.lock().await;
            state.in_combat = true;
            state.started_at = Some(Instant::now());
        }
        if let Some(handle) = self.self_handle.read().upgrade() {
            let task = tokio::spawn(async move { handle.run_attack_loop().await });
            self.state.lock().await.attack_task = Some(task);
        }
    }

    async fn on_exit(&self, _reason: &str, _triggered_by: &str) {
        let mut state = self.state.lock().await;
        state.in_combat = false;
        state.started_at = None;
        state.active_threats.clear();
        state.attack_attempts.clear();
        if let Some(task) = state.attack_task.take() {
            task.abort();
        }
    }

    async fn check_transitions(&self) -> Vec<ModeTransition> {
        let state = self.state.lock().await;
        let timed_out = state
            .started_at
            .map(|s| s.elapsed().as_secs_f64() > self.config.threat_timeout)
            .unwrap_or(false);
        if state.active_threats.is_empty() || timed_out {
            vec![ModeTransition {
                target_mode: "main_mode".to_string(),
                priority: 10,
                condition_name: if timed_out { "threat_timeout" } else { "no_threats" }.to_string(),
            }]
        } else {
            Vec::new()
        }
    }
}

#[async_trait]
impl EnvironmentListener for CombatHandler {
    async fn on_environment_updated(&self, update: &EnvironmentUpdate) {
        // Registration here is static from startup; nothing to re-check,
        // kept as a named step for parity with the source's droppable
        // listener model.
        if update.update_type != "entity_update" {
            return;
        }

        let threats: HashMap<String, Position> = self.classify(update).into_iter().collect();
        let threat_count = threats.len();

        let in_combat = {
            let mut state = self.state.lock().await;
            state.active_threats = threats.clone();
            state.in_combat
        };

        if threat_count > 0 && !in_combat {
            if let Some(manager) = self.mode_manager.read().upgrade() {
                let _ = manager.set_mode("combat_mode", "hostiles detected", "CombatHandler").await;
            }
        } else if threat_count == 0 && in_combat && self.all_threats_beyond_min_distance(&threats).await {
            if let Some(manager) = self.mode_manager.read().upgrade() {
                let _ = manager.set_mode("main_mode", "no remaining threats", "CombatHandler").await;
            }
        }

        if threat_count > 0 {
            let names: Vec<&str> = threats.keys().take(MAX_NAMED_IN_NOTICE).map(String::as_str).collect();
            let text = format!("threat detected: {}", names.join(", "));
            let mut log = self.thinking_log.lock().await;
            if let Err(e) = log.push(text, EntryKind::Notice, now_unix_s()).await {
                log::warn!("failed to persist threat_detected notice: {e}");
            }
        }
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
    use agent_core::entity::{Entity, PlayerEntity};

    fn hostile(name: &str) -> EntityKind {
        EntityKind::Generic(Entity {
            kind: "hostile".to_string(),
            name: name.to_string(),
            position: Position::new(0.0, 64.0, 0.0),
            id: None,
            distance: None,
            health: None,
            max_health: None,
        })
    }

    #[test]
    fn closed_name_set_matches_regardless_of_type() {
        let e = EntityKind::Generic(Entity {
            kind: "mob".to_string(),
            name: "zombie".to_string(),
            position: Position::new(0.0, 0.0, 0.0),
            id: None,
            distance: None,
            health: None,
            max_health: None,
        });
        assert!(is_hostile(&e));
    }

    #[test]
    fn type_hostile_always_counts_even_with_unknown_name() {
        assert!(is_hostile(&hostile("some_modded_mob")));
    }

    #[test]
    fn substring_match_catches_variants_not_in_the_closed_set() {
        let e = EntityKind::Generic(Entity {
            kind: "mob".to_string(),
            name: "baby_zombie".to_string(),
            position: Position::new(0.0, 0.0, 0.0),
            id: None,
            distance: None,
            health: None,
            max_health: None,
        });
        assert!(is_hostile(&e));
    }

    #[test]
    fn players_are_never_hostile() {
        let e = EntityKind::Player(PlayerEntity {
            base: Entity {
                kind: "player".to_string(),
                name: "Alice".to_string(),
                position: Position::new(0.0, 0.0, 0.0),
                id: None,
                distance: None,
                health: None,
                max_health: None,
            },
            username: "Alice".to_string(),
        });
        assert!(!is_hostile(&e));
    }
}
