//! Built-in mode configuration table (§3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeConfig {
    pub name: String,
    pub description: String,
    pub allow_llm_decision: bool,
    pub priority: i32,
    pub max_duration_s: Option<f64>,
    pub auto_restore: bool,
    pub restore_delay_s: f64,
}

/// The closed set of built-in modes, keyed by mode key. Matches §3's table
/// exactly; additional modes may be registered at runtime by a consumer
/// (e.g. a future furnace/chest handler variant) but these four ship by
/// default.
pub fn built_in_modes() -> HashMap<String, ModeConfig> {
    let mut modes = HashMap::new();
    modes.insert(
        "main_mode".to_string(),
        ModeConfig {
            name: "主模式".to_string(),
            description: "default autonomous behavior".to_string(),
            allow_llm_decision: true,
            priority: 0,
            max_duration_s: None,
            auto_restore: false,
            restore_delay_s: 0.0,
        },
    );
    modes.insert(
        "combat_mode".to_string(),
        ModeConfig {
            name: "战斗模式".to_string(),
            description: "engage nearby hostiles".to_string(),
            allow_llm_decision: false,
            priority: 100,
            max_duration_s: Some(300.0),
            auto_restore: true,
            restore_delay_s: 10.0,
        },
    );
    modes.insert(
        "furnace_gui".to_string(),
        ModeConfig {
            name: "熔炉界面模式".to_string(),
            description: "operating a furnace container".to_string(),
            allow_llm_decision: true,
            priority: 10,
            max_duration_s: None,
            auto_restore: false,
            restore_delay_s: 0.0,
        },
    );
    modes.insert(
        "chest_gui".to_string(),
        ModeConfig {
            name: "箱子界面模式".to_string(),
            description: "operating a chest container".to_string(),
            allow_llm_decision: true,
            priority: 10,
            max_duration_s: None,
            auto_restore: false,
            restore_delay_s: 0.0,
        },
    );
    modes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combat_mode_outranks_gui_modes() {
        let modes = built_in_modes();
        assert!(modes["combat_mode"].priority > modes["furnace_gui"].priority);
        assert!(modes["combat_mode"].priority > modes["chest_gui"].priority);
    }

    #[test]
    fn only_combat_mode_auto_restores() {
        let modes = built_in_modes();
        assert!(modes["combat_mode"].auto_restore);
        assert!(!modes["main_mode"].auto_restore);
        assert!(!modes["furnace_gui"].auto_restore);
    }
}
