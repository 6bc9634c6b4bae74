//! Coordinate-indexed block cache (C7).

use agent_core::block::CachedBlock;
use agent_core::position::{BlockPosition, Position};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Instant;

/// The latest known position + view direction of a tracked player, used by
/// the nearby-block query (C8) and by callers that want to center a query
/// on "what the bot can currently see" rather than an arbitrary point.
#[derive(Debug, Clone, Copy)]
pub struct PlayerView {
    pub position: Position,
    pub yaw: f32,
    pub pitch: f32,
}

/// One writer (environment refresh), many readers (nearby-block query,
/// planners) per §5's shared-resource policy; `parking_lot::RwLock` covers
/// that pattern directly.
#[derive(Default)]
pub struct BlockCache {
    blocks: RwLock<HashMap<(i64, i64, i64), CachedBlock>>,
    players: RwLock<HashMap<String, PlayerView>>,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or upgrades an observation at `position` (C7's insertion
    /// semantics): a new position is inserted fresh; an existing one has
    /// `lastSeen`/`seenCount` bumped, `canSee` OR-ed in, and `blockType`
    /// overwritten on a type conflict (the overwrite happens unconditionally,
    /// matching the source's "last observation wins for the type" rule).
    pub fn observe(&self, block_type: String, position: BlockPosition, can_see: bool) {
        let mut blocks = self.blocks.write();
        let key = (position.x, position.y, position.z);
        match blocks.get_mut(&key) {
            Some(existing) => {
                existing.last_seen = Instant::now();
                existing.seen_count += 1;
                existing.can_see = existing.can_see || can_see;
                existing.block_type = block_type;
            }
            None => {
                blocks.insert(key, CachedBlock::new(block_type, position, can_see));
            }
        }
    }

    pub fn get(&self, position: BlockPosition) -> Option<CachedBlock> {
        self.blocks
            .read()
            .get(&(position.x, position.y, position.z))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    /// Every cached block within Euclidean distance `radius` of `center`.
    pub fn blocks_in_range(&self, center: BlockPosition, radius: f64) -> Vec<CachedBlock> {
        self.blocks
            .read()
            .values()
            .filter(|b| b.position.distance(&center) <= radius)
            .cloned()
            .collect()
    }

    /// True iff a `crafting_table` is cached within `radius` of `center`
    /// (C16's `hasCraftingTableNearby` derivation).
    pub fn has_crafting_table_nearby(&self, center: BlockPosition, radius: f64) -> bool {
        self.blocks
            .read()
            .values()
            .any(|b| b.block_type == "crafting_table" && b.position.distance(&center) <= radius)
    }

    pub fn update_player_position(&self, name: &str, position: Position, yaw: f32, pitch: f32) {
        self.players.write().insert(
            name.to_string(),
            PlayerView {
                position,
                yaw,
                pitch,
            },
        );
    }

    pub fn player_view(&self, name: &str) -> Option<PlayerView> {
        self.players.read().get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_position_inserts_with_seen_count_one() {
        let cache = BlockCache::new();
        let pos = BlockPosition::new(1, 2, 3);
        cache.observe("stone".into(), pos, true);
        let cached = cache.get(pos).unwrap();
        assert_eq!(cached.seen_count, 1);
        assert!(cached.can_see);
    }

    #[test]
    fn repeated_observation_ors_can_see_and_overwrites_type() {
        let cache = BlockCache::new();
        let pos = BlockPosition::new(1, 2, 3);
        cache.observe("stone".into(), pos, true);
        cache.observe("dirt".into(), pos, false);
        let cached = cache.get(pos).unwrap();
        assert_eq!(cached.block_type, "dirt");
        assert!(cached.can_see);
        assert_eq!(cached.seen_count, 2);
    }

    #[test]
    fn range_query_is_euclidean() {
        let cache = BlockCache::new();
        cache.observe("stone".into(), BlockPosition::new(0, 0, 0), true);
        cache.observe("stone".into(), BlockPosition::new(10, 0, 0), true);
        let nearby = cache.blocks_in_range(BlockPosition::new(0, 0, 0), 5.0);
        assert_eq!(nearby.len(), 1);
    }

    #[test]
    fn crafting_table_detection_respects_radius() {
        let cache = BlockCache::new();
        cache.observe("crafting_table".into(), BlockPosition::new(20, 0, 0), true);
        assert!(!cache.has_crafting_table_nearby(BlockPosition::new(0, 0, 0), 10.0));
        assert!(cache.has_crafting_table_nearby(BlockPosition::new(0, 0, 0), 25.0));
    }
}
