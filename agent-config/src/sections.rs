//! Typed config sections, grounded on `api/config.py` / `config.py`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotConfig {
    #[serde(default)]
    pub player_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GameConfig {
    #[serde(default)]
    pub goal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VisualConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_true")]
    pub access_log: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    20914
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            access_log: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

fn default_heartbeat_interval() -> u64 {
    60
}
fn default_heartbeat_timeout() -> u64 {
    90
}
fn default_max_connections() -> u32 {
    100
}
fn default_cleanup_interval() -> u64 {
    30
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            heartbeat_timeout: default_heartbeat_timeout(),
            max_connections: default_max_connections(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_wildcard")]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_true")]
    pub allow_credentials: bool,
    #[serde(default = "default_wildcard")]
    pub allow_methods: Vec<String>,
    #[serde(default = "default_wildcard")]
    pub allow_headers: Vec<String>,
}

fn default_wildcard() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_origins: default_wildcard(),
            allow_credentials: true,
            allow_methods: default_wildcard(),
            allow_headers: default_wildcard(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    #[serde(default = "default_update_interval")]
    pub default_update_interval: u32,
    #[serde(default = "default_max_update_interval")]
    pub max_update_interval: u32,
    #[serde(default = "default_min_update_interval")]
    pub min_update_interval: u32,
}

fn default_update_interval() -> u32 {
    1000
}
fn default_max_update_interval() -> u32 {
    30000
}
fn default_min_update_interval() -> u32 {
    100
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            default_update_interval: default_update_interval(),
            max_update_interval: default_max_update_interval(),
            min_update_interval: default_min_update_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub subscription: SubscriptionConfig,
}

/// See DESIGN.md's Open Question resolution #1: both of the source's two
/// divergent branches are collapsed into one genuinely configurable
/// section, defaulting to the (simpler) fallback-branch values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatDetectionConfig {
    #[serde(default = "default_threat_range")]
    pub threat_detection_range: f64,
    #[serde(default = "default_threat_timeout")]
    pub threat_timeout: f64,
    #[serde(default = "default_attack_interval")]
    pub attack_interval: f64,
    #[serde(default = "default_max_attack_attempts")]
    pub max_attack_attempts: u32,
    #[serde(default = "default_true")]
    pub enable_threat_detection: bool,
}

fn default_threat_range() -> f64 {
    16.0
}
fn default_threat_timeout() -> f64 {
    180.0
}
fn default_attack_interval() -> f64 {
    1.5
}
fn default_max_attack_attempts() -> u32 {
    3
}

impl ThreatDetectionConfig {
    /// `threat_min_distance` is never itself configured; it is always
    /// derived as half the detection range.
    pub fn min_distance(&self) -> f64 {
        0.5 * self.threat_detection_range
    }
}

impl Default for ThreatDetectionConfig {
    fn default() -> Self {
        Self {
            threat_detection_range: default_threat_range(),
            threat_timeout: default_threat_timeout(),
            attack_interval: default_attack_interval(),
            max_attack_attempts: default_max_attack_attempts(),
            enable_threat_detection: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_distance_is_derived_not_configured() {
        let cfg = ThreatDetectionConfig::default();
        assert_eq!(cfg.min_distance(), 8.0);
    }
}
