//! Hurt-response pipeline (C15): reacts to `entityHurt` events with a
//! critical-health short circuit, then player/hostile/unknown source
//! classification.

use crate::combat::is_hostile_name_and_kind;
use agent_bridge::bridge::BridgeClient;
use agent_bridge::llm::LlmClient;
use agent_core::events::{Event, EventData, EventEmitter, EventStore, ListenerFn, ListenerHandle};
use agent_core::position::BlockPosition;
use agent_tasks::{ChatHistory, EntryKind, TaskList, ThinkingLog};
use agent_world::environment::EnvironmentModel;
use agent_world::{nearby_blocks_text, BlockCache};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, RwLock as AsyncRwLock};

const CRITICAL_HEALTH_THRESHOLD: f64 = 3.0;
const LOW_HEALTH_THRESHOLD: f64 = 6.0;
const NEARBY_FULL_DISTANCE: f64 = 16.0;
const NEARBY_CAN_SEE_DISTANCE: f64 = 32.0;

pub struct HurtResponseHandler {
    bridge: Arc<dyn BridgeClient>,
    llm: Arc<dyn LlmClient>,
    movement: Arc<agent_world::MovementMonitor>,
    environment: Arc<AsyncRwLock<EnvironmentModel>>,
    block_cache: Arc<BlockCache>,
    event_store: Arc<AsyncRwLock<EventStore>>,
    thinking_log: Arc<AsyncMutex<ThinkingLog>>,
    tasks: Arc<AsyncMutex<TaskList>>,
    bot_username: String,
    goal: String,
    enable_damage_interrupt: bool,
}

impl HurtResponseHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bridge: Arc<dyn BridgeClient>,
        llm: Arc<dyn LlmClient>,
        movement: Arc<agent_world::MovementMonitor>,
        environment: Arc<AsyncRwLock<EnvironmentModel>>,
        block_cache: Arc<BlockCache>,
        event_store: Arc<AsyncRwLock<EventStore>>,
        thinking_log: Arc<AsyncMutex<ThinkingLog>>,
        tasks: Arc<AsyncMutex<TaskList>>,
        bot_username: impl Into<String>,
        goal: impl Into<String>,
        enable_damage_interrupt: bool,
    ) -> Self {
        Self {
            bridge,
            llm,
            movement,
            environment,
            block_cache,
            event_store,
            thinking_log,
            tasks,
            bot_username: bot_username.into(),
            goal: goal.into(),
            enable_damage_interrupt,
        }
    }

    pub fn register(self: &Arc<Self>, emitter: &EventEmitter) -> Result<ListenerHandle, String> {
        let handler = self.clone();
        let callback: ListenerFn = Arc::new(move |event| {
            let handler = handler.clone();
            Box::pin(async move { handler.on_entity_hurt(event).await })
        });
        emitter.on("entityHurt", Some("hurt_response_handler"), callback)
    }

    async fn on_entity_hurt(&self, event: Event) {
        if !self.enable_damage_interrupt {
            return;
        }
        let EventData::EntityHurt(data) = &event.data else {
            return;
        };
        if data.victim_username.as_deref() != Some(self.bot_username.as_str()) {
            return;
        }

        let current_health = data
            .current_health
            .or_else(|| self.environment.try_read().ok().and_then(|e| e.snapshot().health.as_ref().map(|h| h.current)));
        let current_health = current_health.unwrap_or(f64::MAX);

        if current_health <= CRITICAL_HEALTH_THRESHOLD {
            self.handle_critical(current_health).await;
            return;
        }

        self.movement.force_interrupt("damage");

        let source_type = data.source_type.as_deref().unwrap_or("unknown");
        let source_name = data.source_name.as_deref().unwrap_or("something");

        if source_type == "player" {
            self.handle_player_source(source_name).await;
        } else if source_type == "hostile" || is_hostile_name_and_kind(source_name, source_type) {
            self.handle_hostile_source(source_name, current_health).await;
        } else {
            self.handle_player_source("someone").await;
        }
    }

    async fn handle_critical(&self, current_health: f64) {
        self.movement.force_interrupt("critical_health_interrupt");
        let mut log = self.thinking_log.lock().await;
        let _ = log
            .push(
                format!("critical_health_interrupt at {current_health:.1} hp"),
                EntryKind::Notice,
                now_unix_s(),
            )
            .await;
        drop(log);

        let prompt = format!(
            "You are at {current_health:.1} health, critically low. Cry out for help in one short sentence. Goal: {}",
            self.goal
        );
        let message = self.llm.chat(&prompt).await.ok().filter(|s| !s.trim().is_empty());
        let message = message.unwrap_or_else(|| "Help, I'm about to die!".to_string());
        let _ = self.bridge.chat(&message).await;
    }

    async fn handle_player_source(&self, attacker_name: &str) {
        let prompt = self.build_negotiation_prompt(attacker_name).await;
        let reply = self.llm.chat(&prompt).await.ok().filter(|s| !s.trim().is_empty());
        let reply = reply.unwrap_or_else(|| format!("{attacker_name}, why did you hit me?"));
        let _ = self.bridge.chat(&reply).await;
    }

    async fn handle_hostile_source(&self, source_name: &str, current_health: f64) {
        if current_health <= LOW_HEALTH_THRESHOLD {
            let prompt = format!(
                "A {source_name} hit you and you're down to {current_health:.1} health. Call for help in one short sentence."
            );
            let message = self.llm.chat(&prompt).await.ok().filter(|s| !s.trim().is_empty());
            let message = message.unwrap_or_else(|| format!("Help, a {source_name} is attacking me!"));
            let _ = self.bridge.chat(&message).await;
            return;
        }

        if self.bridge.kill_mob(source_name).await.is_err() {
            let prompt = format!("A {source_name} is attacking you. Describe a short combat plan in one sentence.");
            if let Ok(strategy) = self.llm.chat(&prompt).await {
                let mut log = self.thinking_log.lock().await;
                let _ = log
                    .push(format!("combat intent vs {source_name}: {strategy}"), EntryKind::Thinking, now_unix_s())
                    .await;
            }
        }
    }

    async fn build_negotiation_prompt(&self, attacker_name: &str) -> String {
        let env = self.environment.read().await;
        let snapshot = env.snapshot();
        let position = snapshot.position.unwrap_or(agent_core::position::Position::new(0.0, 0.0, 0.0));
        let block_position: BlockPosition = position.into();
        let nearby = nearby_blocks_text(&self.block_cache, block_position, NEARBY_FULL_DISTANCE, NEARBY_CAN_SEE_DISTANCE);
        let nearby_summary: String = nearby.values().take(3).cloned().collect::<Vec<_>>().join("; ");

        let tasks = self.tasks.lock().await;
        let pending: Vec<&str> = tasks.tasks().iter().filter(|t| !t.done).map(|t| t.details.as_str()).collect();
        let pending_summary = pending.join(", ");
        drop(tasks);

        let store = self.event_store.read().await;
        let chat_history = ChatHistory::new(&self.bot_username);
        let recent = chat_history.recent(&store, now_unix_s());
        let recent_summary: String = recent
            .iter()
            .map(|line| format!("{}: {}", line.sender, line.message))
            .collect::<Vec<_>>()
            .join(" | ");
        drop(store);

        format!(
            "You were just attacked by {attacker_name}. Goal: {}. Pending tasks: {}. Position: ({:.1},{:.1},{:.1}). Nearby: {}. Recent chat: {attacker_name} hit you | {}. Reply in one short, in-character sentence.",
            self.goal, pending_summary, position.x, position.y, position.z, nearby_summary, recent_summary
        )
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
    use agent_bridge::bridge::{BridgeResult, MineBlockRequest, RawRecipe};
    use agent_core::error::{AgentError, BridgeError};
    use agent_core::events::{EntityHurtEvent, EventData};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct FakeBridge {
        chats: StdMutex<Vec<String>>,
        kill_mob_fails: bool,
    }

    #[async_trait]
    impl BridgeClient for FakeBridge {
        async fn query_area_blocks(&self, _s: (i64, i64, i64), _e: (i64, i64, i64), _r: bool, _m: u32) -> BridgeResult<Value> {
            Ok(Value::Null)
        }
        async fn mine_block(&self, _r: MineBlockRequest) -> BridgeResult<Value> {
            Ok(Value::Null)
        }
        async fn kill_mob(&self, _mob: &str) -> BridgeResult<Value> {
            if self.kill_mob_fails {
                Err(BridgeError {
                    reason: "no target".to_string(),
                    error_code: None,
                    request_id: None,
                })
            } else {
                Ok(Value::Null)
            }
        }
        async fn chat(&self, message: &str) -> BridgeResult<()> {
            self.chats.lock().unwrap().push(message.to_string());
            Ok(())
        }
        async fn query_raw_recipe(&self, _item: &str, _t: bool) -> BridgeResult<Vec<RawRecipe>> {
            Ok(Vec::new())
        }
        async fn craft_with_recipe(&self, _r: &RawRecipe, _c: u32, _w: bool) -> BridgeResult<Value> {
            Ok(Value::Null)
        }
    }

    struct FakeLlm {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        async fn chat(&self, _prompt: &str) -> Result<String, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Some(s) => Ok(s.clone()),
                None => Ok(String::new()),
            }
        }
        async fn vision(&self, _prompt: &str, _image_base64: &str) -> Result<String, AgentError> {
            Ok(String::new())
        }
    }

    fn handler(bridge: Arc<FakeBridge>, llm: Arc<FakeLlm>, enable: bool) -> Arc<HurtResponseHandler> {
        Arc::new(HurtResponseHandler::new(
            bridge,
            llm,
            Arc::new(agent_world::MovementMonitor::new()),
            Arc::new(AsyncRwLock::new(EnvironmentModel::new())),
            Arc::new(BlockCache::new()),
            Arc::new(AsyncRwLock::new(EventStore::with_capacity(100))),
            Arc::new(AsyncMutex::new(ThinkingLog::new(std::env::temp_dir().join(format!(
                "hurt-test-log-{}.json",
                uuid::Uuid::new_v4()
            )))))
            ,
            Arc::new(AsyncMutex::new(TaskList::new(std::env::temp_dir().join(format!(
                "hurt-test-tasks-{}.json",
                uuid::Uuid::new_v4()
            ))))),
            "Bot",
            "survive",
            enable,
        ))
    }

    fn hurt_event(victim: &str, current_health: f64, source_type: &str, source_name: &str) -> Event {
        Event {
            event_type: "entityHurt".to_string(),
            game_tick: 1,
            timestamp: 1.0,
            data: EventData::EntityHurt(EntityHurtEvent {
                victim_username: Some(victim.to_string()),
                current_health: Some(current_health),
                source_type: Some(source_type.to_string()),
                source_name: Some(source_name.to_string()),
            }),
        }
    }

    #[tokio::test]
    async fn disabled_toggle_is_a_no_op() {
        let bridge = Arc::new(FakeBridge {
            chats: StdMutex::new(Vec::new()),
            kill_mob_fails: false,
        });
        let llm = Arc::new(FakeLlm {
            reply: Some("hi".to_string()),
            calls: AtomicUsize::new(0),
        });
        let h = handler(bridge.clone(), llm, false);
        h.on_entity_hurt(hurt_event("Bot", 1.0, "player", "Alice")).await;
        assert!(bridge.chats.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn events_for_other_victims_are_dropped() {
        let bridge = Arc::new(FakeBridge {
            chats: StdMutex::new(Vec::new()),
            kill_mob_fails: false,
        });
        let llm = Arc::new(FakeLlm {
            reply: Some("hi".to_string()),
            calls: AtomicUsize::new(0),
        });
        let h = handler(bridge.clone(), llm, true);
        h.on_entity_hurt(hurt_event("SomeoneElse", 1.0, "player", "Alice")).await;
        assert!(bridge.chats.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn critical_health_short_circuits_before_source_classification() {
        let bridge = Arc::new(FakeBridge {
            chats: StdMutex::new(Vec::new()),
            kill_mob_fails: false,
        });
        let llm = Arc::new(FakeLlm {
            reply: None,
            calls: AtomicUsize::new(0),
        });
        let h = handler(bridge.clone(), llm, true);
        h.on_entity_hurt(hurt_event("Bot", 2.0, "player", "Alice")).await;
        let chats = bridge.chats.lock().unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0], "Help, I'm about to die!");
        assert_eq!(h.movement.take_interrupt().as_deref(), Some("critical_health_interrupt"));
    }

    #[tokio::test]
    async fn player_source_falls_back_to_templated_message_on_empty_reply() {
        let bridge = Arc::new(FakeBridge {
            chats: StdMutex::new(Vec::new()),
            kill_mob_fails: false,
        });
        let llm = Arc::new(FakeLlm {
            reply: None,
            calls: AtomicUsize::new(0),
        });
        let h = handler(bridge.clone(), llm, true);
        h.on_entity_hurt(hurt_event("Bot", 10.0, "player", "Alice")).await;
        let chats = bridge.chats.lock().unwrap();
        assert_eq!(chats[0], "Alice, why did you hit me?");
    }

    #[tokio::test]
    async fn hostile_source_above_low_threshold_tries_kill_mob_first() {
        let bridge = Arc::new(FakeBridge {
            chats: StdMutex::new(Vec::new()),
            kill_mob_fails: false,
        });
        let llm = Arc::new(FakeLlm {
            reply: Some("strategy".to_string()),
            calls: AtomicUsize::new(0),
        });
        let h = handler(bridge.clone(), llm, true);
        h.on_entity_hurt(hurt_event("Bot", 10.0, "hostile", "zombie")).await;
        assert!(bridge.chats.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hostile_source_falls_back_to_llm_strategy_when_kill_mob_fails() {
        let bridge = Arc::new(FakeBridge {
            chats: StdMutex::new(Vec::new()),
            kill_mob_fails: true,
        });
        let llm = Arc::new(FakeLlm {
            reply: Some("retreat and regroup".to_string()),
            calls: AtomicUsize::new(0),
        });
        let h = handler(bridge.clone(), llm.clone(), true);
        h.on_entity_hurt(hurt_event("Bot", 10.0, "hostile", "zombie")).await;
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }
}
