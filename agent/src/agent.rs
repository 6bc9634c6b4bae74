//! Composition root (A4): owns one instance of every process-wide
//! subsystem and wires them together in the order §6 describes.

use crate::combat::CombatHandler;
use crate::hurt::HurtResponseHandler;
use crate::mode::ModeManager;
use agent_bridge::bridge::BridgeClient;
use agent_bridge::llm::LlmClient;
use agent_config::Config;
use agent_core::events::{EventEmitter, EventStore};
use agent_registry::{built_in_modes, ConversionTable, EventRegistry};
use agent_tasks::{ChatHistory, LocationPoints, TaskList, ThinkingLog};
use agent_world::environment::EnvironmentModel;
use agent_world::{BlockCache, MovementMonitor};
use agent_ws::{ConnectionRegistry, HeartbeatConfig, TasksChannelHandler};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, RwLock as AsyncRwLock};

const EVENT_STORE_CAPACITY: usize = 2000;

/// Owns one instance each of the subsystems named in §4.21. Built once in
/// `main`; tests construct a scoped instance directly instead of touching
/// process-wide state.
pub struct Agent {
    pub config: Config,
    pub bridge: Arc<dyn BridgeClient>,
    pub llm: Arc<dyn LlmClient>,
    pub block_cache: Arc<BlockCache>,
    pub event_registry: EventRegistry,
    pub event_emitter: EventEmitter,
    pub event_store: Arc<AsyncRwLock<EventStore>>,
    pub environment: Arc<AsyncRwLock<EnvironmentModel>>,
    pub movement: Arc<MovementMonitor>,
    pub thinking_log: Arc<AsyncMutex<ThinkingLog>>,
    pub tasks: Arc<AsyncMutex<TaskList>>,
    pub locations: Arc<AsyncMutex<LocationPoints>>,
    pub conversions: ConversionTable,
    pub mode_manager: Arc<ModeManager>,
    pub combat_handler: Arc<CombatHandler>,
    pub hurt_handler: Arc<HurtResponseHandler>,
    pub ws_registry: Arc<ConnectionRegistry>,
    pub tasks_channel: Arc<TasksChannelHandler>,
}

impl Agent {
    /// Builds every subsystem in the order the composition root names:
    /// configuration is already loaded by the caller; from there, clock →
    /// block cache → event registry → emitter → event store → environment
    /// → bridge/LLM clients → mode manager → handlers → WebSocket layer.
    /// The bridge/LLM clients are constructed earlier than that prose
    /// ordering implies, since the combat and hurt handlers need to own an
    /// `Arc` to them at construction time rather than after the fact.
    pub async fn new(
        config: Config,
        bridge: Arc<dyn BridgeClient>,
        llm: Arc<dyn LlmClient>,
        data_dir: PathBuf,
    ) -> Result<Arc<Self>, agent_core::error::PersistenceError> {
        let block_cache = Arc::new(BlockCache::new());
        let event_registry = EventRegistry::new();
        let event_emitter = EventEmitter::default();
        let event_store = Arc::new(AsyncRwLock::new(EventStore::with_capacity(EVENT_STORE_CAPACITY)));
        let environment = Arc::new(AsyncRwLock::new(EnvironmentModel::new()));
        let movement = Arc::new(MovementMonitor::new());

        let thinking_log = Arc::new(AsyncMutex::new(ThinkingLog::load(data_dir.join("thinking_log.json")).await?));
        let tasks = Arc::new(AsyncMutex::new(TaskList::load(data_dir.join("todo_list.json")).await?));
        let locations = Arc::new(AsyncMutex::new(LocationPoints::load(data_dir.join("locations.json")).await?));

        let conversions = ConversionTable::with_defaults();

        let threat_config = config.threat_detection.clone().unwrap_or_default();
        let combat_handler = Arc::new(CombatHandler::new(
            bridge.clone(),
            thinking_log.clone(),
            environment.clone(),
            threat_config,
        ));

        let enable_damage_interrupt = false;
        let hurt_handler = Arc::new(HurtResponseHandler::new(
            bridge.clone(),
            llm.clone(),
            movement.clone(),
            environment.clone(),
            block_cache.clone(),
            event_store.clone(),
            thinking_log.clone(),
            tasks.clone(),
            config.bot.player_name.clone(),
            config.game.goal.clone(),
            enable_damage_interrupt,
        ));

        let mode_manager = Arc::new(ModeManager::new(
            vec![combat_handler.clone() as Arc<dyn crate::mode::ModeHandler>],
            built_in_modes(),
        ));
        combat_handler.bind(&mode_manager);
        mode_manager.register_listener_async(combat_handler.clone() as Arc<dyn crate::mode::EnvironmentListener>).await;

        if let Err(e) = hurt_handler.register(&event_emitter) {
            log::warn!(target: "agent::agent", "failed to register hurt-response listener: {e}");
        }

        let ws_registry = Arc::new(ConnectionRegistry::new());
        let tasks_channel = Arc::new(TasksChannelHandler::new(tasks.clone(), config.game.goal.clone()));

        Ok(Arc::new(Self {
            config,
            bridge,
            llm,
            block_cache,
            event_registry,
            event_emitter,
            event_store,
            environment,
            movement,
            thinking_log,
            tasks,
            locations,
            conversions,
            mode_manager,
            combat_handler,
            hurt_handler,
            ws_registry,
            tasks_channel,
        }))
    }

    /// Starts the movement monitor's 500 ms supervisory tick against the
    /// environment model's last-known `on_ground` flag.
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        let environment = self.environment.clone();
        self.movement.spawn_supervisor(move || {
            environment.try_read().ok().and_then(|e| e.snapshot().on_ground).unwrap_or(false)
        });
    }

    pub fn crafting_planner(&self) -> agent_crafting::CraftingPlanner<'_> {
        agent_crafting::CraftingPlanner::new(self.bridge.as_ref(), &self.conversions)
    }

    pub fn chat_history(&self) -> ChatHistory<'_> {
        ChatHistory::new(&self.config.bot.player_name)
    }

    pub fn ws_heartbeat_config(&self) -> HeartbeatConfig {
        match &self.config.api {
            Some(api) => HeartbeatConfig {
                interval: std::time::Duration::from_secs(api.websocket.heartbeat_interval),
                timeout: std::time::Duration::from_secs(api.websocket.heartbeat_timeout),
            },
            None => HeartbeatConfig::default(),
        }
    }
}
