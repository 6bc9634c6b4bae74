//! Event registry (C4): maps a wire `type` string to a constructor that
//! turns the raw payload into a typed [`Event`](agent_core::events::Event).

use agent_core::events::{
    as_position, BlockBreakEvent, BlockPlaceEvent, BreathEvent, ChatEvent, DeathEvent, Event,
    EntityDeadEvent, EntityHurtEvent, EventData, ForcedMoveEvent, HealthEvent, ItemDropEvent,
    KickedEvent, PlayerCollectEvent, PlayerJoinedEvent, PlayerLeftEvent, PlayerMoveEvent,
    PlayerRespawnEvent, RainEvent, SpawnEvent, SpawnResetEvent,
};
use serde_json::Value;
use std::collections::HashMap;

type Constructor = fn(&Value) -> EventData;

/// Dispatch table from wire type name to a typed constructor. Re-registering
/// an existing type overwrites it and logs a warning, matching the source's
/// registry semantics; unknown types fall back to [`EventData::Raw`].
pub struct EventRegistry {
    constructors: HashMap<String, Constructor>,
}

impl Default for EventRegistry {
    fn default() -> Self {
        let mut registry = Self {
            constructors: HashMap::new(),
        };
        registry.register_defaults();
        registry
    }
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register_defaults(&mut self) {
        self.register(ChatEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::Chat)
        });
        self.register(PlayerJoinedEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::PlayerJoined)
        });
        self.register(PlayerLeftEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::PlayerLeft)
        });
        self.register(PlayerMoveEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::PlayerMove)
        });
        self.register(PlayerRespawnEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::PlayerRespawn)
        });
        self.register(DeathEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::Death)
        });
        self.register(SpawnEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::Spawn)
        });
        self.register(SpawnResetEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::SpawnReset)
        });
        self.register(KickedEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::Kicked)
        });
        self.register(RainEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::Rain)
        });
        self.register(HealthEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::Health)
        });
        self.register(BreathEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::Breath)
        });
        self.register(EntityHurtEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::EntityHurt)
        });
        self.register(EntityDeadEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::EntityDead)
        });
        self.register(PlayerCollectEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::PlayerCollect)
        });
        self.register(ItemDropEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::ItemDrop)
        });
        self.register(BlockBreakEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::BlockBreak)
        });
        self.register(BlockPlaceEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::BlockPlace)
        });
        self.register(ForcedMoveEvent::EVENT_TYPE, |v| {
            from_value_or_raw(v, EventData::ForcedMove)
        });
    }

    pub fn register(&mut self, event_type: &str, ctor: Constructor) {
        if self.constructors.contains_key(event_type) {
            log::warn!("overwriting event constructor for type: {event_type}");
        }
        self.constructors.insert(event_type.to_string(), ctor);
    }

    /// Builds a typed [`Event`] from a raw `{type, gameTick, timestamp, data}`
    /// payload. Unknown types fall back to `EventData::Raw` rather than
    /// erroring, matching the source's tolerant behavior.
    pub fn create_event_from_raw(&self, payload: &Value) -> Event {
        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let game_tick = payload.get("gameTick").and_then(Value::as_i64).unwrap_or(0);
        let timestamp = payload.get("timestamp").and_then(Value::as_f64).unwrap_or(0.0);
        let data_value = payload.get("data").cloned().unwrap_or(Value::Null);

        let data = match self.constructors.get(event_type.as_str()) {
            Some(ctor) => ctor(&data_value),
            None => EventData::Raw(data_value),
        };

        Event {
            event_type,
            game_tick,
            timestamp,
            data,
        }
    }
}

fn from_value_or_raw<T, F>(v: &Value, wrap: F) -> EventData
where
    T: serde::de::DeserializeOwned,
    F: Fn(T) -> EventData,
{
    match serde_json::from_value::<T>(v.clone()) {
        Ok(t) => wrap(t),
        Err(e) => {
            log::warn!("failed to parse event payload, keeping raw: {e}");
            EventData::Raw(v.clone())
        }
    }
}

// Re-export so the generic position helper stays reachable without pulling
// in the whole `agent_core::events` path at call sites that only need it.
pub use as_position as position_of;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dispatches_known_type() {
        let registry = EventRegistry::new();
        let payload = json!({
            "type": "chat",
            "gameTick": 10,
            "timestamp": 1000.0,
            "data": {"sender": "Alice", "message": "hi"}
        });
        let event = registry.create_event_from_raw(&payload);
        assert_eq!(event.event_type, "chat");
        assert!(matches!(event.data, EventData::Chat(_)));
    }

    #[test]
    fn unknown_type_falls_back_to_raw() {
        let registry = EventRegistry::new();
        let payload = json!({"type": "somethingNew", "gameTick": 1, "timestamp": 1.0, "data": {"x": 1}});
        let event = registry.create_event_from_raw(&payload);
        assert!(matches!(event.data, EventData::Raw(_)));
    }

    #[test]
    fn re_registering_overwrites() {
        let mut registry = EventRegistry::new();
        registry.register(ChatEvent::EVENT_TYPE, |v| EventData::Raw(v.clone()));
        let payload = json!({"type": "chat", "gameTick": 1, "timestamp": 1.0, "data": {"sender":"A","message":"m"}});
        let event = registry.create_event_from_raw(&payload);
        assert!(matches!(event.data, EventData::Raw(_)));
    }
}
