//! Environment snapshot, observation ingestion, and inventory coaching
//! (C9).

use agent_core::entity::{EntityKind, Material, ToolType};
use agent_core::events::{Event, EventData};
use agent_core::position::Position;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single inventory/equipment item, plus its derived (never persisted)
/// tool classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub count: u32,
    pub slot: Option<u32>,
    #[serde(default)]
    pub durability: u32,
    #[serde(default)]
    pub max_durability: u32,
}

impl Item {
    pub fn tool_type(&self) -> Option<ToolType> {
        ToolType::from_item_name(&self.name)
    }

    pub fn tool_material(&self) -> Option<(Material, u8)> {
        Material::from_item_name(&self.name).map(|m| (m, m.level()))
    }
}

/// The five tool categories the inventory coach advises on (C9, §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    Pickaxe,
    Axe,
    Shovel,
    Hoe,
    Sword,
}

impl ToolCategory {
    fn from_tool_type(t: ToolType) -> Self {
        match t {
            ToolType::Pickaxe => ToolCategory::Pickaxe,
            ToolType::Axe => ToolCategory::Axe,
            ToolType::Shovel => ToolCategory::Shovel,
            ToolType::Hoe => ToolCategory::Hoe,
            ToolType::Sword => ToolCategory::Sword,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ToolCategory::Pickaxe => "pickaxe",
            ToolCategory::Axe => "axe",
            ToolCategory::Shovel => "shovel",
            ToolCategory::Hoe => "hoe",
            ToolCategory::Sword => "sword",
        }
    }

    const ALL: [ToolCategory; 5] = [
        ToolCategory::Pickaxe,
        ToolCategory::Axe,
        ToolCategory::Shovel,
        ToolCategory::Hoe,
        ToolCategory::Sword,
    ];
}

fn material_name(m: Material) -> &'static str {
    match m {
        Material::Wooden => "wooden",
        Material::Golden => "golden",
        Material::Stone => "stone",
        Material::Iron => "iron",
        Material::Diamond => "diamond",
        Material::Netherite => "netherite",
    }
}

/// Renders the per-category advisory text for an inventory (C9 "Tool
/// summaries"). `hoe` is the one category whose many-owned branch nags
/// about carrying too many rather than repeating the level advisory.
pub fn tool_coach_report(items: &[Item]) -> Vec<(ToolCategory, String)> {
    ToolCategory::ALL
        .iter()
        .map(|&category| (category, tool_coach_line(category, items)))
        .collect()
}

fn tool_coach_line(category: ToolCategory, items: &[Item]) -> String {
    let owned: Vec<&Item> = items
        .iter()
        .filter(|i| i.tool_type().map(ToolCategory::from_tool_type) == Some(category))
        .collect();

    if owned.is_empty() {
        return format!("You have no {}. Consider crafting one.", category.label());
    }

    let best_level = owned
        .iter()
        .filter_map(|i| i.tool_material())
        .map(|(_, level)| level)
        .max()
        .unwrap_or(0);
    let best_material = owned
        .iter()
        .filter_map(|i| i.tool_material())
        .max_by_key(|(_, level)| *level)
        .map(|(m, _)| material_name(m))
        .unwrap_or("unknown");

    let level_advisory = level_advisory_line(category, best_material, best_level);

    if owned.len() == 1 {
        level_advisory
    } else if category == ToolCategory::Hoe {
        format!(
            "You are carrying {} hoes; one is usually enough, consider dropping the rest.",
            owned.len()
        )
    } else {
        format!(
            "You have {} {}s, the best being {}. {}",
            owned.len(),
            category.label(),
            best_material,
            level_advisory
        )
    }
}

fn level_advisory_line(category: ToolCategory, material: &str, level: u8) -> String {
    if level >= Material::Diamond.level() {
        format!("Your {material} {} is already top tier.", category.label())
    } else {
        format!(
            "Your {material} {} works, but upgrading past {material} would help.",
            category.label()
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Health {
    pub current: f64,
    pub max: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Food {
    pub current: f64,
    pub max: f64,
    pub saturation: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Experience {
    pub points: u32,
    pub level: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventorySummary {
    pub slots: Vec<Option<Item>>,
    pub full_slot_count: u32,
    pub empty_slot_count: u32,
    pub slot_count: u32,
}

/// The latest known state (C9's "Holds the latest snapshot"). Every field
/// defaults such that an observation missing it leaves it untouched.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentSnapshot {
    pub username: Option<String>,
    pub gamemode: Option<String>,
    pub position: Option<Position>,
    pub velocity: Option<Position>,
    pub yaw: Option<f32>,
    pub pitch: Option<f32>,
    pub on_ground: Option<bool>,
    pub is_sleeping: Option<bool>,
    pub weather: Option<String>,
    pub time_of_day: Option<i64>,
    pub dimension: Option<String>,
    pub biome: Option<String>,
    pub health: Option<Health>,
    pub food: Option<Food>,
    pub experience: Option<Experience>,
    pub oxygen: Option<f64>,
    pub armor: Option<f64>,
    pub block_at_cursor: Option<Value>,
    pub entity_at_cursor: Option<Value>,
    pub held_item: Option<Item>,
    pub using_held_item: Option<bool>,
    pub equipment: Option<Value>,
    pub inventory: Option<InventorySummary>,
    pub online_players: Vec<Value>,
    pub recent_events: Vec<Event>,
    pub overview_image_base64: Option<String>,
    pub overview_text: Option<String>,
}

const RECENT_EVENTS_CAP: usize = 80;

/// The payload published to the mode system and to the environment
/// listener after every refresh (C9's "publishes an update payload").
/// Deliberately a plain data struct with no reference back to any mode or
/// listener type, so the composition root can wire the cyclic
/// environment/mode relationship explicitly instead of either crate
/// depending on the other.
#[derive(Debug, Clone)]
pub struct EnvironmentUpdate {
    pub update_type: String,
    pub entities: Vec<EntityKind>,
    pub raw: Value,
}

#[derive(Default)]
pub struct EnvironmentModel {
    snapshot: EnvironmentSnapshot,
}

impl EnvironmentModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &EnvironmentSnapshot {
        &self.snapshot
    }

    /// Ingests a bridge observation payload (§4.9). A `payload.ok == false`
    /// is a no-op; otherwise every recognized field in `data` overwrites the
    /// snapshot, and every absent field is left as it was.
    pub fn update_from_observation(&mut self, payload: &Value) -> Option<EnvironmentUpdate> {
        let ok = payload.get("ok").and_then(Value::as_bool).unwrap_or(false);
        if !ok {
            return None;
        }
        let Some(data) = payload.get("data") else {
            return None;
        };

        if let Some(v) = data.get("username").and_then(Value::as_str) {
            self.snapshot.username = Some(v.to_string());
        }
        if let Some(v) = data.get("gamemode").and_then(Value::as_str) {
            self.snapshot.gamemode = Some(v.to_string());
        }
        if let Some(v) = data.get("weather").and_then(Value::as_str) {
            self.snapshot.weather = Some(v.to_string());
        }
        if let Some(v) = data.get("timeOfDay").and_then(Value::as_i64) {
            self.snapshot.time_of_day = Some(v);
        }
        if let Some(v) = data.get("dimension").and_then(Value::as_str) {
            self.snapshot.dimension = Some(v.to_string());
        }
        if let Some(v) = data.get("biome").and_then(Value::as_str) {
            self.snapshot.biome = Some(v.to_string());
        }
        if let Some(v) = data.get("onGround").and_then(Value::as_bool) {
            self.snapshot.on_ground = Some(v);
        }
        if let Some(v) = data.get("isSleeping").and_then(Value::as_bool) {
            self.snapshot.is_sleeping = Some(v);
        }
        if let Some(v) = data.get("yaw").and_then(Value::as_f64) {
            self.snapshot.yaw = Some(v as f32);
        }
        if let Some(v) = data.get("pitch").and_then(Value::as_f64) {
            self.snapshot.pitch = Some(v as f32);
        }
        if let Some(v) = data.get("oxygen").and_then(Value::as_f64) {
            self.snapshot.oxygen = Some(v);
        }
        if let Some(v) = data.get("armor").and_then(Value::as_f64) {
            self.snapshot.armor = Some(v);
        }
        if let Some(v) = data.get("usingHeldItem").and_then(Value::as_bool) {
            self.snapshot.using_held_item = Some(v);
        }
        if let Some(v) = data.get("onlinePlayers").and_then(Value::as_array) {
            self.snapshot.online_players = v.clone();
        }

        // Invalid positions become `null`; the caller is responsible for
        // warning on that case since this model has no logging concern.
        match parse_position(data.get("position")) {
            Some(p) => self.snapshot.position = Some(p),
            None if data.get("position").is_some() => self.snapshot.position = None,
            None => {}
        }
        if let Some(v) = parse_position(data.get("velocity")) {
            self.snapshot.velocity = Some(v);
        }

        if let Some(h) = data.get("health") {
            self.snapshot.health = Some(Health {
                current: h.get("current").and_then(Value::as_f64).unwrap_or_default(),
                max: h.get("max").and_then(Value::as_f64).unwrap_or_default(),
                percentage: h.get("percentage").and_then(Value::as_f64).unwrap_or_default(),
            });
        }
        if let Some(f) = data.get("food") {
            self.snapshot.food = Some(Food {
                current: f.get("current").and_then(Value::as_f64).unwrap_or_default(),
                max: f.get("max").and_then(Value::as_f64).unwrap_or_default(),
                saturation: f.get("saturation").and_then(Value::as_f64).unwrap_or_default(),
                percentage: f.get("percentage").and_then(Value::as_f64).unwrap_or_default(),
            });
        }
        if let Some(e) = data.get("experience") {
            self.snapshot.experience = Some(Experience {
                points: e.get("points").and_then(Value::as_u64).unwrap_or_default() as u32,
                level: e.get("level").and_then(Value::as_u64).unwrap_or_default() as u32,
            });
        }

        let cursor_block = data.get("blockAtCursor").or_else(|| data.get("blockAtEntityCursor"));
        if let Some(v) = cursor_block {
            self.snapshot.block_at_cursor = Some(v.clone());
        }
        if let Some(v) = data.get("entityAtCursor") {
            self.snapshot.entity_at_cursor = Some(v.clone());
        }
        if let Some(v) = data.get("equipment") {
            self.snapshot.equipment = Some(v.clone());
        }
        if let Some(v) = data.get("heldItem") {
            if let Ok(item) = serde_json::from_value::<Item>(v.clone()) {
                self.snapshot.held_item = Some(item);
            }
        }
        if let Some(inv) = data.get("inventory") {
            let slots = inv
                .get("slots")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .map(|v| serde_json::from_value::<Item>(v.clone()).ok())
                        .collect()
                })
                .unwrap_or_default();
            self.snapshot.inventory = Some(InventorySummary {
                slots,
                full_slot_count: inv.get("fullSlotCount").and_then(Value::as_u64).unwrap_or_default() as u32,
                empty_slot_count: inv.get("emptySlotCount").and_then(Value::as_u64).unwrap_or_default() as u32,
                slot_count: inv.get("slotCount").and_then(Value::as_u64).unwrap_or_default() as u32,
            });
        }

        Some(EnvironmentUpdate {
            update_type: "observation".to_string(),
            entities: Vec::new(),
            raw: data.clone(),
        })
    }

    /// Ingests a nearby-entity list (§4.9's `updateNearbyEntities`).
    /// Positions arrive as `[x,y,z]` arrays.
    pub fn update_nearby_entities(&mut self, entities: &[Value]) -> EnvironmentUpdate {
        let parsed: Vec<EntityKind> = entities
            .iter()
            .filter_map(|e| {
                let kind = e.get("type").and_then(Value::as_str).unwrap_or("");
                let name = e.get("name").and_then(Value::as_str).unwrap_or("");
                let pos_arr = e.get("position").and_then(Value::as_array)?;
                if pos_arr.len() != 3 {
                    return None;
                }
                let position = Position::new(
                    pos_arr[0].as_f64()?,
                    pos_arr[1].as_f64()?,
                    pos_arr[2].as_f64()?,
                );
                let item_info = e
                    .get("itemsInfo")
                    .and_then(Value::as_array)
                    .and_then(|arr| arr.first())
                    .map(|first| {
                        let item_name = first.get("name").and_then(Value::as_str).unwrap_or("unknown");
                        let count = first.get("count").and_then(Value::as_u64).unwrap_or(1) as u32;
                        (item_name, count)
                    });
                Some(EntityKind::from_kind_and_name(
                    kind,
                    name,
                    position,
                    item_info,
                ))
            })
            .collect();

        EnvironmentUpdate {
            update_type: "entity_update".to_string(),
            entities: parsed,
            raw: Value::Array(entities.to_vec()),
        }
    }

    /// Appends to the bounded recent-event ring (C9's "keep last 80, drop
    /// the oldest").
    pub fn push_recent_event(&mut self, event: Event) {
        self.snapshot.recent_events.push(event);
        while self.snapshot.recent_events.len() > RECENT_EVENTS_CAP {
            self.snapshot.recent_events.remove(0);
        }
    }

    pub fn set_overview(&mut self, image_base64: Option<String>, text: Option<String>) {
        self.snapshot.overview_image_base64 = image_base64;
        self.snapshot.overview_text = text;
    }
}

fn parse_position(value: Option<&Value>) -> Option<Position> {
    let v = value?;
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
    fn missing_fields_preserve_previous_values() {
        let mut model = EnvironmentModel::new();
        model.update_from_observation(&json!({
            "ok": true,
            "data": {"username": "Mai", "dimension": "overworld"},
        }));
        model.update_from_observation(&json!({
            "ok": true,
            "data": {"dimension": "nether"},
        }));
        assert_eq!(model.snapshot().username.as_deref(), Some("Mai"));
        assert_eq!(model.snapshot().dimension.as_deref(), Some("nether"));
    }

    #[test]
    fn not_ok_payload_is_a_no_op() {
        let mut model = EnvironmentModel::new();
        model.update_from_observation(&json!({"ok": true, "data": {"username": "Mai"}}));
        model.update_from_observation(&json!({"ok": false, "data": {"username": "Eve"}}));
        assert_eq!(model.snapshot().username.as_deref(), Some("Mai"));
    }

    #[test]
    fn invalid_position_becomes_none() {
        let mut model = EnvironmentModel::new();
        model.update_from_observation(&json!({
            "ok": true,
            "data": {"position": {"x": 1.0, "y": 2.0, "z": 3.0}},
        }));
        assert!(model.snapshot().position.is_some());
        model.update_from_observation(&json!({
            "ok": true,
            "data": {"position": {"x": 1.0}},
        }));
        assert!(model.snapshot().position.is_none());
    }

    #[test]
    fn recent_events_ring_drops_oldest_past_eighty() {
        let mut model = EnvironmentModel::new();
        for i in 0..90 {
            let event = Event {
                event_type: "chat".to_string(),
                game_tick: i,
                timestamp: i as f64,
                data: EventData::Raw(json!({"i": i})),
            };
            model.push_recent_event(event);
        }
        assert_eq!(model.snapshot().recent_events.len(), 80);
    }

    #[test]
    fn entity_subtype_dispatch_from_nearby_list() {
        let mut model = EnvironmentModel::new();
        let update = model.update_nearby_entities(&[json!({
            "type": "player",
            "name": "Alice",
            "position": [1.0, 2.0, 3.0],
        })]);
        assert_eq!(update.entities.len(), 1);
        assert!(matches!(update.entities[0], EntityKind::Player(_)));
    }

    #[test]
    fn zero_owned_pickaxe_advises_crafting() {
        let report = tool_coach_report(&[]);
        let (_, line) = report.iter().find(|(c, _)| *c == ToolCategory::Pickaxe).unwrap();
        assert!(line.contains("no pickaxe"));
    }

    #[test]
    fn many_hoes_nags_about_carrying_too_many() {
        let items = vec![
            Item {
                name: "wooden_hoe".to_string(),
                count: 1,
                slot: Some(0),
                durability: 0,
                max_durability: 0,
            },
            Item {
                name: "stone_hoe".to_string(),
                count: 1,
                slot: Some(1),
                durability: 0,
                max_durability: 0,
            },
        ];
        let report = tool_coach_report(&items);
        let (_, line) = report.iter().find(|(c, _)| *c == ToolCategory::Hoe).unwrap();
        assert!(line.contains("carrying"));
    }
}
