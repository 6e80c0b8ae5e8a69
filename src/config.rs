//! Configuration
//!
//! Every tunable in one place. Defaults match a standard match; `from_env`
//! overrides individual values from `CARD_CLASH_*` variables.

use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::game::combat::CombatConfig;
use crate::game::hand::HandConfig;
use crate::network::lobby::LobbyConfig;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Lobby countdown and readiness rules.
    pub lobby: LobbyConfig,
    /// Hand sizing.
    pub hand: HandConfig,
    /// Combat tuning.
    pub combat: CombatConfig,
    /// `tracing` filter directive.
    pub log_filter: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            lobby: LobbyConfig::default(),
            hand: HandConfig::default(),
            combat: CombatConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl CoreConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let num = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            lobby: LobbyConfig {
                countdown: num("CARD_CLASH_COUNTDOWN_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.lobby.countdown),
                abort_countdown_on_unready: lookup("CARD_CLASH_ABORT_ON_UNREADY")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(defaults.lobby.abort_countdown_on_unready),
            },
            hand: HandConfig {
                capacity: num("CARD_CLASH_HAND_CAPACITY")
                    .map(|v| v as usize)
                    .unwrap_or(defaults.hand.capacity),
                target_size: num("CARD_CLASH_HAND_TARGET")
                    .map(|v| v as usize)
                    .unwrap_or(defaults.hand.target_size),
            },
            combat: CombatConfig {
                max_health: num("CARD_CLASH_MAX_HEALTH")
                    .map(|v| v as u32)
                    .unwrap_or(defaults.combat.max_health),
                max_energy: num("CARD_CLASH_MAX_ENERGY")
                    .map(|v| v as u32)
                    .unwrap_or(defaults.combat.max_energy),
                defeat_score: num("CARD_CLASH_DEFEAT_SCORE")
                    .map(|v| v as u32)
                    .unwrap_or(defaults.combat.defeat_score),
                request_timeout_ticks: num("CARD_CLASH_REQUEST_TIMEOUT_TICKS")
                    .map(|v| v as u32)
                    .unwrap_or(defaults.combat.request_timeout_ticks),
            },
            log_filter: lookup("RUST_LOG").unwrap_or(defaults.log_filter),
        }
    }
}
