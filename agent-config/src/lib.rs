//! Configuration loading and versioned migration (A1, §6, §4.18).

mod migrate;
mod sections;

pub use migrate::{load_or_migrate, ConfigError};
pub use sections::*;

use serde::{Deserialize, Serialize};

/// Bumped whenever a shipped template adds/renames a field that an
/// on-disk file at a lower version needs migrating into.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub llm_fast: LlmConfig,
    #[serde(default)]
    pub vlm: LlmConfig,
    #[serde(default)]
    pub visual: VisualConfig,
    #[serde(default)]
    pub api: Option<ApiConfig>,
    #[serde(default)]
    pub threat_detection: Option<ThreatDetectionConfig>,
}

fn default_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            logging: LoggingConfig::default(),
            bot: BotConfig::default(),
            game: GameConfig::default(),
            llm: LlmConfig::default(),
            llm_fast: LlmConfig::default(),
            vlm: LlmConfig::default(),
            visual: VisualConfig::default(),
            api: Some(ApiConfig::default()),
            threat_detection: Some(ThreatDetectionConfig::default()),
        }
    }
}
