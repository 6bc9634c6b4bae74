//! Shared value types for the agent control plane: positions, blocks,
//! entities, the event model, the clock, and the cross-subsystem error
//! taxonomy.

pub mod block;
pub mod clock;
pub mod entity;
pub mod error;
pub mod events;
pub mod position;

pub use block::{Block, CachedBlock};
pub use entity::{AnimalEntity, Entity, EntityKind, ItemEntity, Player, PlayerEntity};
pub use error::AgentError;
pub use position::{BlockPosition, Position};
