//! ============================================================================
//! Drop Resolver - Weighted random item roll
//! ============================================================================
//! Draws a uniform integer in [0, total_weight), walks the catalog in order
//! accumulating weights and returns the first item whose cumulative weight
//! exceeds the draw. The random source is injected so tests can seed it.
//! ============================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::catalog::{Catalog, DEFAULT_FALLBACK_ITEM};

/// Roll an item id from the catalog, or `fallback` if nothing matches
pub fn roll_item<'a, R: Rng + ?Sized>(rng: &mut R, catalog: &'a Catalog, fallback: &'a str) -> &'a str {
    let total = catalog.total_weight();
    if total == 0 {
        warn!("Catalog has no drop weight, using fallback {}", fallback);
        return fallback;
    }

    let roll = rng.gen_range(0..total);
    let mut cumulative = 0u64;
    for item in catalog.items() {
        cumulative += item.drop_rate as u64;
        if roll < cumulative {
            debug!("Rolled {} ({} of {})", item.id, roll, total);
            return &item.id;
        }
    }

    fallback
}

/// Owns the random source and fallback used for pack drops
pub struct DropResolver<R: Rng = StdRng> {
    rng: R,
    fallback: String,
}

impl DropResolver<StdRng> {
    /// Resolver seeded from OS entropy
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic resolver for tests and replays
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for DropResolver<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> DropResolver<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            fallback: DEFAULT_FALLBACK_ITEM.to_string(),
        }
    }

    pub fn with_fallback(mut self, fallback: &str) -> Self {
        self.fallback = fallback.to_string();
        self
    }

    pub fn roll(&mut self, catalog: &Catalog) -> String {
        roll_item(&mut self.rng, catalog, &self.fallback).to_string()
    }
}
