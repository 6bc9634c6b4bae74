//! Event model (C3).
//!
//! Every event carries a common header (`type`, `game_tick`, `timestamp`,
//! `data`). Rather than a duck-typed wrapper (§9's design note), `data` is
//! a closed `EventData` enum, one variant per known wire type, with a `Raw`
//! fallback for anything the registry does not recognize. Generic field
//! access ("by name or by key, auto-coerced to Player/Entity/Position when
//! the shape matches") is kept through the `as_player`/`as_entity`/
//! `as_position` helpers on `serde_json::Value`, used by `Raw` events and by
//! variants that embed nested generic payloads.

use crate::entity::{EntityKind, Player};
use crate::position::Position;
use agent_macros::EventKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod emitter;
pub mod store;

pub use emitter::{EventEmitter, ListenerFn, ListenerHandle};
pub use store::EventStore;

/// Implemented by every per-variant payload struct; provides the stable
/// wire type string used as the event registry's dispatch key.
pub trait EventKind {
    fn event_type(&self) -> &'static str;
}

/// The event envelope common to every variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub game_tick: i64,
    /// Raw wire timestamp; use [`Event::timestamp_s`] for the normalized
    /// value, never this field directly for display.
    pub timestamp: f64,
    pub data: EventData,
}

impl Event {
    pub fn timestamp_s(&self) -> f64 {
        crate::clock::normalize_timestamp(self.timestamp)
    }

    /// Resolves Open Question (new, §9): `EventStore.get_events_by_player`
    /// filters on a `player_name` attribute the generic base event never
    /// carried. Here it is a best-effort per-variant projection instead of
    /// a field every event must have.
    pub fn player_name(&self) -> Option<&str> {
        match &self.data {
            EventData::Chat(d) => Some(&d.sender),
            EventData::PlayerJoined(d) => Some(&d.username),
            EventData::PlayerLeft(d) => Some(&d.username),
            EventData::PlayerMove(d) => Some(&d.username),
            EventData::PlayerRespawn(d) => Some(&d.username),
            EventData::Death(d) => Some(&d.username),
            EventData::Kicked(d) => Some(&d.username),
            EventData::EntityHurt(d) => d.victim_username.as_deref(),
            EventData::PlayerCollect(d) => Some(&d.username),
            EventData::Raw(v) => v.get("username").and_then(Value::as_str),
        }
    }

    pub fn description(&self) -> String {
        match &self.data {
            EventData::Chat(d) => format!("{}: {}", d.sender, d.message),
            EventData::PlayerJoined(d) => format!("{} joined", d.username),
            EventData::PlayerLeft(d) => format!("{} left", d.username),
            EventData::PlayerMove(d) => format!("{} moved", d.username),
            EventData::PlayerRespawn(d) => format!("{} respawned", d.username),
            EventData::Death(d) => format!("{} died: {}", d.username, d.message),
            EventData::Spawn(_) => "spawned".to_string(),
            EventData::SpawnReset(_) => "spawn point reset".to_string(),
            EventData::Kicked(d) => format!("{} was kicked: {}", d.username, d.reason),
            EventData::Rain(d) => format!("rain: {}", d.raining),
            EventData::Health(d) => format!("health: {}", d.health),
            EventData::Breath(d) => format!("breath: {}", d.breath),
            EventData::EntityHurt(d) => format!(
                "{} hurt by {}",
                d.victim_username.as_deref().unwrap_or("unknown"),
                d.source_name.as_deref().unwrap_or("unknown")
            ),
            EventData::EntityDead(d) => format!("{} died", d.name),
            EventData::PlayerCollect(d) => format!("{} collected {}", d.username, d.item),
            EventData::ItemDrop(d) => format!("dropped {}", d.item),
            EventData::BlockBreak(d) => format!("broke {}", d.block),
            EventData::BlockPlace(d) => format!("placed {}", d.block),
            EventData::ForcedMove(_) => "forced move".to_string(),
            EventData::Raw(v) => v.to_string(),
        }
    }

    /// Compact `[type] ...` rendering used as AI context.
    pub fn to_context_string(&self) -> String {
        format!("[{}] {}", self.event_type, self.description())
    }
}

/// Known event data variants (§3). `Raw` is the fallback for anything the
/// registry does not recognize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventData {
    Chat(ChatEvent),
    PlayerJoined(PlayerJoinedEvent),
    PlayerLeft(PlayerLeftEvent),
    PlayerMove(PlayerMoveEvent),
    PlayerRespawn(PlayerRespawnEvent),
    Death(DeathEvent),
    Spawn(SpawnEvent),
    SpawnReset(SpawnResetEvent),
    Kicked(KickedEvent),
    Rain(RainEvent),
    Health(HealthEvent),
    Breath(BreathEvent),
    EntityHurt(EntityHurtEvent),
    EntityDead(EntityDeadEvent),
    PlayerCollect(PlayerCollectEvent),
    ItemDrop(ItemDropEvent),
    BlockBreak(BlockBreakEvent),
    BlockPlace(BlockPlaceEvent),
    ForcedMove(ForcedMoveEvent),
    Raw(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "chat"]
pub struct ChatEvent {
    pub sender: String,
    pub message: String,
    #[serde(default)]
    pub chat_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "playerJoined"]
pub struct PlayerJoinedEvent {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "playerLeft"]
pub struct PlayerLeftEvent {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "playerMove"]
pub struct PlayerMoveEvent {
    pub username: String,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "playerRespawn"]
pub struct PlayerRespawnEvent {
    pub username: String,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "death"]
pub struct DeathEvent {
    pub username: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "spawn"]
pub struct SpawnEvent {
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "spawnReset"]
pub struct SpawnResetEvent {
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "kicked"]
pub struct KickedEvent {
    pub username: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "rain"]
pub struct RainEvent {
    pub raining: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "health"]
pub struct HealthEvent {
    pub health: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "breath"]
pub struct BreathEvent {
    pub breath: f64,
}

/// Drives C15's hurt-response pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "entityHurt"]
pub struct EntityHurtEvent {
    pub victim_username: Option<String>,
    pub current_health: Option<f64>,
    pub source_type: Option<String>,
    pub source_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "entityDead"]
pub struct EntityDeadEvent {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "playerCollect"]
pub struct PlayerCollectEvent {
    pub username: String,
    pub item: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "itemDrop"]
pub struct ItemDropEvent {
    pub item: String,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "blockBreak"]
pub struct BlockBreakEvent {
    pub block: String,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "blockPlace"]
pub struct BlockPlaceEvent {
    pub block: String,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize, EventKind)]
#[event_type = "forcedMove"]
pub struct ForcedMoveEvent {
    pub position: Option<Position>,
}

/// Recognition rules for the generic `Raw` payload (§4.3): a value with
/// `username` or `uuid` is player-like; a value with `type` and
/// (`position` or `health`) is entity-like; an exact `{x,y,z}` is
/// position-like. These mirror the source's duck-typed auto-coercion
/// without resurrecting its `__getattr__`-raises-on-miss control flow
/// (§9's design note): every accessor here returns `Option`.
pub fn as_player(v: &Value) -> Option<Player> {
    if v.get("username").is_some() || v.get("uuid").is_some() {
        Some(Player {
            uuid: v.get("uuid").and_then(Value::as_str).unwrap_or("").to_string(),
            username: v.get("username").and_then(Value::as_str).unwrap_or("").to_string(),
            display_name: v
                .get("displayName")
                .and_then(Value::as_str)
                .or_else(|| v.get("username").and_then(Value::as_str))
                .unwrap_or("")
                .to_string(),
            ping: v.get("ping").and_then(Value::as_i64).unwrap_or(0) as i32,
            gamemode: v.get("gamemode").and_then(Value::as_i64).unwrap_or(0) as i32,
        })
    } else {
        None
    }
}

pub fn as_entity(v: &Value) -> Option<EntityKind> {
    let kind = v.get("type").and_then(Value::as_str)?;
    if v.get("position").is_none() && v.get("health").is_none() {
        return None;
    }
    // Entity-like recognition only requires `position` OR `health`
    // (§4.3); a payload recognized solely via `health` may have no
    // `position` field at all, so this falls back to the origin rather
    // than bailing out of recognition entirely.
    let position = v
        .get("position")
        .and_then(as_position)
        .unwrap_or(Position::new(0.0, 0.0, 0.0));
    let name = v.get("name").and_then(Value::as_str).unwrap_or(kind);
    Some(EntityKind::from_kind_and_name(kind, name, position, None))
}

pub fn as_position(v: &Value) -> Option<Position> {
    let obj = v.as_object()?;
    if obj.len() != 3 {
        return None;
    }
    Some(Position::new(
        v.get("x")?.as_f64()?,
        v.get("y")?.as_f64()?,
        v.get("z")?.as_f64()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn position_like_recognition_requires_exactly_xyz() {
        let v = json!({"x": 1.0, "y": 2.0, "z": 3.0});
        assert!(as_position(&v).is_some());
        let v2 = json!({"x": 1.0, "y": 2.0});
        assert!(as_position(&v2).is_none());
    }

    #[test]
    fn entity_like_recognition_accepts_health_without_position() {
        let v = json!({"type": "hostile", "name": "zombie", "health": 12.0});
        let entity = as_entity(&v).expect("health alone should qualify as entity-like");
        assert_eq!(entity.base().position, Position::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn player_like_recognition_on_username_or_uuid() {
        let v = json!({"username": "Alice"});
        assert!(as_player(&v).is_some());
        let v2 = json!({"foo": "bar"});
        assert!(as_player(&v2).is_none());
    }

    #[test]
    fn player_name_falls_back_per_variant() {
        let e = Event {
            event_type: "chat".into(),
            game_tick: 1,
            timestamp: 1.0,
            data: EventData::Chat(ChatEvent {
                sender: "Alice".into(),
                message: "hi".into(),
                chat_type: None,
            }),
        };
        assert_eq!(e.player_name(), Some("Alice"));
    }
}
