//! Engine tuning parameters.
//!
//! The coarse cell size is a compile-time constant ([`crate::coord::CELL_SIZE`]);
//! the remaining knobs travel in an [`EngineConfig`] the host passes into
//! tick functions. With the `data-loader` feature the config also loads
//! from JSON, for hosts that keep tuning data next to their assets.

use serde::{Deserialize, Serialize};

/// Runtime tuning knobs for the resource simulations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How often a targetless transport unit re-queries for a destination.
    pub wander_retry_ticks: u32,
    /// Pump cycle length used when a tile does not carry its own.
    pub default_pump_timer: u32,
    /// Per-cycle extraction cap used when a tile does not carry its own.
    pub default_stack_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wander_retry_ticks: 30,
            default_pump_timer: 40,
            default_stack_limit: 4,
        }
    }
}

/// Errors from the JSON config loader.
#[cfg(feature = "data-loader")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parsing failed: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(feature = "data-loader")]
impl EngineConfig {
    /// Parse a config from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}
