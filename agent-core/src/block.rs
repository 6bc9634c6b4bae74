//! Block model (C2/C7).

use crate::position::{BlockPosition, Position};
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const EMPTY_BLOCK_NAMES: &[&str] = &["air", "cave_air"];
pub const NONDIGGABLE_BLOCK_NAMES: &[&str] = &["water", "lava", "bedrock"];

/// A single observed block, as reported by a bridge query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_type: i32,
    pub name: String,
    pub position: Position,
}

impl Block {
    pub fn is_empty(&self) -> bool {
        EMPTY_BLOCK_NAMES.contains(&self.name.as_str())
    }

    pub fn is_nondiggable(&self) -> bool {
        NONDIGGABLE_BLOCK_NAMES.contains(&self.name.as_str())
    }
}

/// A block held in the coordinate-indexed cache (C7). Equality and hashing
/// are by position only: two observations of the same cell are the same
/// `CachedBlock` regardless of what else differs between them.
#[derive(Debug, Clone)]
pub struct CachedBlock {
    pub block_type: String,
    pub position: BlockPosition,
    pub can_see: bool,
    pub first_seen: Instant,
    pub last_seen: Instant,
    pub seen_count: u32,
}

impl PartialEq for CachedBlock {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
    }
}
impl Eq for CachedBlock {}

impl std::hash::Hash for CachedBlock {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.position.hash(state);
    }
}

impl CachedBlock {
    pub fn new(block_type: String, position: BlockPosition, can_see: bool) -> Self {
        let now = Instant::now();
        Self {
            block_type,
            position,
            can_see,
            first_seen: now,
            last_seen: now,
            seen_count: 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        EMPTY_BLOCK_NAMES.contains(&self.block_type.as_str())
    }

    pub fn is_nondiggable(&self) -> bool {
        NONDIGGABLE_BLOCK_NAMES.contains(&self.block_type.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_everything_but_position() {
        let pos = BlockPosition::new(1, 2, 3);
        let a = CachedBlock::new("stone".into(), pos, true);
        let b = CachedBlock::new("dirt".into(), pos, false);
        assert_eq!(a, b);
    }

    #[test]
    fn classifies_empty_and_nondiggable_names() {
        assert!(EMPTY_BLOCK_NAMES.contains(&"air"));
        assert!(NONDIGGABLE_BLOCK_NAMES.contains(&"bedrock"));
    }
}
