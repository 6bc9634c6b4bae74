//! World-model state: block cache, nearby-block queries, environment
//! snapshot, and movement supervision (C7–C10).

pub mod block_cache;
pub mod environment;
pub mod movement;
pub mod nearby;

pub use block_cache::{BlockCache, PlayerView};
pub use environment::{EnvironmentModel, EnvironmentSnapshot, EnvironmentUpdate, Item, ToolCategory};
pub use movement::{DerivedVelocity, MovementMonitor};
pub use nearby::{compress_positions, decode_positions, nearby_blocks_text, placement_candidates, stand_candidates};
