//! ============================================================================
//! Configuration - Session timings and reward policy
//! ============================================================================
//! Defaults match the shipped game. Every field can be overridden with a
//! PACKDROP_* environment variable (load a .env first if you want one).
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::catalog::DEFAULT_FALLBACK_ITEM;
use crate::types::ClaimPolicy;

/// Reference image that spawns packs
pub const DEFAULT_MARKER: &str = "OCK_Logo";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackDropConfig {
    /// Database file (default: ~/.packdrop/packdrop.redb)
    pub db_path: Option<String>,
    /// Marker name that spawns a pack
    pub marker_name: String,
    /// Minimum gap between entering the screen / last spawn and a new spawn
    pub cooldown_ms: u64,
    /// How long to wait for the scan result before showing "network lag"
    pub network_wait_ms: u64,
    /// Collectible grow-in animation; taps are ignored while it runs
    pub spawn_animation_ms: u64,
    /// Collect fly-away animation before the pack is destroyed
    pub fly_away_ms: u64,
    /// Collect automatically this long after opening (None = wait for tap)
    pub auto_collect_ms: Option<u64>,
    /// When the claim flag is set for an unlocked reward
    pub claim_policy: ClaimPolicy,
    /// Item returned when the drop roll finds nothing
    pub fallback_item: String,
}

impl Default for PackDropConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            marker_name: DEFAULT_MARKER.to_string(),
            cooldown_ms: 2000,
            network_wait_ms: 2000,
            spawn_animation_ms: 500,
            fly_away_ms: 500,
            auto_collect_ms: None,
            claim_policy: ClaimPolicy::OnClaim,
            fallback_item: DEFAULT_FALLBACK_ITEM.to_string(),
        }
    }
}

impl PackDropConfig {
    /// Defaults overridden by PACKDROP_* environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("PACKDROP_DB_PATH") {
            config.db_path = Some(path);
        }
        if let Ok(marker) = std::env::var("PACKDROP_MARKER") {
            config.marker_name = marker;
        }
        if let Some(ms) = env_millis("PACKDROP_COOLDOWN_MS") {
            config.cooldown_ms = ms;
        }
        if let Some(ms) = env_millis("PACKDROP_NETWORK_WAIT_MS") {
            config.network_wait_ms = ms;
        }
        if let Some(ms) = env_millis("PACKDROP_SPAWN_ANIMATION_MS") {
            config.spawn_animation_ms = ms;
        }
        if let Some(ms) = env_millis("PACKDROP_FLY_AWAY_MS") {
            config.fly_away_ms = ms;
        }
        if let Some(ms) = env_millis("PACKDROP_AUTO_COLLECT_MS") {
            config.auto_collect_ms = Some(ms);
        }
        if let Ok(policy) = std::env::var("PACKDROP_CLAIM_POLICY") {
            match ClaimPolicy::from_str(&policy) {
                Some(p) => config.claim_policy = p,
                None => warn!("Unknown PACKDROP_CLAIM_POLICY '{}', keeping {:?}", policy, config.claim_policy),
            }
        }
        if let Ok(item) = std::env::var("PACKDROP_FALLBACK_ITEM") {
            config.fallback_item = item;
        }

        config
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn network_wait(&self) -> Duration {
        Duration::from_millis(self.network_wait_ms)
    }

    pub fn spawn_animation(&self) -> Duration {
        Duration::from_millis(self.spawn_animation_ms)
    }

    pub fn fly_away(&self) -> Duration {
        Duration::from_millis(self.fly_away_ms)
    }

    pub fn auto_collect(&self) -> Option<Duration> {
        self.auto_collect_ms.map(Duration::from_millis)
    }
}

fn env_millis(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(_) => {
            warn!("Ignoring {}='{}': not a number of milliseconds", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PackDropConfig::default();
        assert_eq!(config.cooldown(), Duration::from_secs(2));
        assert_eq!(config.network_wait(), Duration::from_secs(2));
        assert_eq!(config.marker_name, "OCK_Logo");
        assert_eq!(config.claim_policy, ClaimPolicy::OnClaim);
        assert!(config.auto_collect().is_none());
    }

    #[test]
    fn test_env_override() {
        // Only this test touches these variables
        std::env::set_var("PACKDROP_AUTO_COLLECT_MS", "3000");
        std::env::set_var("PACKDROP_CLAIM_POLICY", "on_unlock");
        std::env::set_var("PACKDROP_COOLDOWN_MS", "soon");
        let config = PackDropConfig::from_env();
        std::env::remove_var("PACKDROP_AUTO_COLLECT_MS");
        std::env::remove_var("PACKDROP_CLAIM_POLICY");
        std::env::remove_var("PACKDROP_COOLDOWN_MS");

        assert_eq!(config.auto_collect(), Some(Duration::from_secs(3)));
        assert_eq!(config.claim_policy, ClaimPolicy::OnUnlock);
        assert_eq!(config.cooldown_ms, 2000);
    }
}
