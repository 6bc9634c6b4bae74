//! Player / entity model (C2, C9, C14).

use crate::position::Position;
use serde::{Deserialize, Serialize};

/// Bare player identity, as reported in `onlinePlayers` / player-list events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub uuid: String,
    pub username: String,
    pub display_name: String,
    pub ping: i32,
    pub gamemode: i32,
}

/// The generic entity shape, before subtype dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: String,
    pub name: String,
    pub position: Position,
    pub id: Option<String>,
    pub distance: Option<f64>,
    pub health: Option<f64>,
    pub max_health: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntity {
    pub base: Entity,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalEntity {
    pub base: Entity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEntity {
    pub base: Entity,
    pub item_name: String,
    pub count: u32,
}

/// Dispatch result of `EnvironmentModel::update_nearby_entities` (C9),
/// and the unit the combat handler's threat classification (C14) scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    Player(PlayerEntity),
    Animal(AnimalEntity),
    Item(ItemEntity),
    Generic(Entity),
}

impl EntityKind {
    pub fn base(&self) -> &Entity {
        match self {
            EntityKind::Player(e) => &e.base,
            EntityKind::Animal(e) => &e.base,
            EntityKind::Item(e) => &e.base,
            EntityKind::Generic(e) => e,
        }
    }

    /// Mirrors `EnvironmentInfo.update_nearby_entities`'s subtype dispatch:
    /// `type=="player"` wins first, then `type=="animal"`, then
    /// `name=="item"` (reading the first `itemsInfo[]` element), else a
    /// generic entity.
    pub fn from_kind_and_name(
        kind: &str,
        name: &str,
        position: Position,
        item_info: Option<(&str, u32)>,
    ) -> Self {
        let base = Entity {
            kind: kind.to_string(),
            name: name.to_string(),
            position,
            id: None,
            distance: None,
            health: None,
            max_health: None,
        };
        if kind == "player" {
            EntityKind::Player(PlayerEntity {
                username: name.to_string(),
                base,
            })
        } else if kind == "animal" {
            EntityKind::Animal(AnimalEntity { base })
        } else if name == "item" {
            let (item_name, count) = item_info.unwrap_or(("unknown", 1));
            EntityKind::Item(ItemEntity {
                base,
                item_name: item_name.to_string(),
                count,
            })
        } else {
            EntityKind::Generic(base)
        }
    }
}

/// Tool categories the coach strings (C9) advise on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolType {
    Pickaxe,
    Axe,
    Shovel,
    Hoe,
    Sword,
}

impl ToolType {
    /// Substring-matches an item name's tool suffix, mirroring
    /// `agent/common/basic_class.py`'s `Item.tool_type` derivation.
    pub fn from_item_name(name: &str) -> Option<ToolType> {
        if name.ends_with("pickaxe") {
            Some(ToolType::Pickaxe)
        } else if name.ends_with("axe") && !name.ends_with("pickaxe") {
            Some(ToolType::Axe)
        } else if name.ends_with("shovel") {
            Some(ToolType::Shovel)
        } else if name.ends_with("hoe") {
            Some(ToolType::Hoe)
        } else if name.ends_with("sword") {
            Some(ToolType::Sword)
        } else {
            None
        }
    }
}

/// Ordered tool material levels, 1 (wooden) through 6 (netherite).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Material {
    Wooden = 1,
    Golden = 2,
    Stone = 3,
    Iron = 4,
    Diamond = 5,
    Netherite = 6,
}

impl Material {
    pub fn from_item_name(name: &str) -> Option<Material> {
        if name.starts_with("wooden_") {
            Some(Material::Wooden)
        } else if name.starts_with("golden_") {
            Some(Material::Golden)
        } else if name.starts_with("stone_") {
            Some(Material::Stone)
        } else if name.starts_with("iron_") {
            Some(Material::Iron)
        } else if name.starts_with("diamond_") {
            Some(Material::Diamond)
        } else if name.starts_with("netherite_") {
            Some(Material::Netherite)
        } else {
            None
        }
    }

    pub fn level(&self) -> u8 {
        *self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_type_prefers_pickaxe_over_axe_suffix() {
        assert_eq!(
            ToolType::from_item_name("diamond_pickaxe"),
            Some(ToolType::Pickaxe)
        );
        assert_eq!(ToolType::from_item_name("iron_axe"), Some(ToolType::Axe));
    }

    #[test]
    fn material_orders_by_level() {
        assert!(Material::Wooden < Material::Netherite);
        assert_eq!(Material::Diamond.level(), 5);
    }

    #[test]
    fn entity_dispatch_prefers_player_then_animal_then_item() {
        let pos = Position::new(0.0, 0.0, 0.0);
        match EntityKind::from_kind_and_name("player", "Alice", pos, None) {
            EntityKind::Player(p) => assert_eq!(p.username, "Alice"),
            _ => panic!("expected player"),
        }
        match EntityKind::from_kind_and_name("other", "item", pos, Some(("stick", 3))) {
            EntityKind::Item(i) => {
                assert_eq!(i.item_name, "stick");
                assert_eq!(i.count, 3);
            }
            _ => panic!("expected item"),
        }
    }
}
