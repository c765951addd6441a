//! Core configuration.
//!
//! Injected by the host application; the library never reads files or
//! environment variables itself.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::cart::Cents;

// Default values for core configuration
const DEFAULT_FREE_SHIPPING_THRESHOLD: Cents = 15_000;
const DEFAULT_FLAT_SHIPPING_FEE: Cents = 1_000;
const DEFAULT_TYPING_DELAY_MS: u64 = 1_200;
const DEFAULT_STALE_AFTER_MS: u64 = 30_000;

/// Tunables for the mutation/cache core.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Subtotal (minor units) at or above which shipping is free.
    pub free_shipping_threshold: Cents,
    /// Flat shipping fee (minor units) below the free threshold.
    pub flat_shipping_fee: Cents,
    /// Cosmetic delay before the assistant reply is surfaced.
    pub typing_delay_ms: u64,
    /// Age after which a cached entry is considered passively stale.
    pub stale_after_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            free_shipping_threshold: DEFAULT_FREE_SHIPPING_THRESHOLD,
            flat_shipping_fee: DEFAULT_FLAT_SHIPPING_FEE,
            typing_delay_ms: DEFAULT_TYPING_DELAY_MS,
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
        }
    }
}

impl CoreConfig {
    /// Typing-affordance delay as a `Duration`.
    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms)
    }

    /// Passive staleness horizon as a `Duration`.
    pub fn stale_horizon(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CoreConfig::default();
        assert_eq!(config.free_shipping_threshold, 15_000);
        assert_eq!(config.flat_shipping_fee, 1_000);
        assert_eq!(config.typing_delay_ms, 1_200);
        assert_eq!(config.stale_after_ms, 30_000);
    }

    #[test]
    fn duration_helpers() {
        let config = CoreConfig {
            typing_delay_ms: 500,
            stale_after_ms: 2_000,
            ..Default::default()
        };
        assert_eq!(config.typing_delay(), Duration::from_millis(500));
        assert_eq!(config.stale_horizon(), Duration::from_millis(2_000));
    }

    #[test]
    fn deserializes_partial_toml_shape() {
        let config: CoreConfig =
            serde_json::from_str(r#"{ "typing_delay_ms": 10 }"#).expect("partial config");
        assert_eq!(config.typing_delay_ms, 10);
        assert_eq!(config.free_shipping_threshold, 15_000);
    }
}
