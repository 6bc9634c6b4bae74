//! Event registry (C4), mode configuration table (§3), and the crafting
//! alias/conversion-pair tables (§3, §4.16).

pub mod conversion;
pub mod event_registry;
pub mod mode_config;

pub use conversion::{ConversionPair, ConversionTable};
pub use event_registry::EventRegistry;
pub use mode_config::{built_in_modes, ModeConfig};
