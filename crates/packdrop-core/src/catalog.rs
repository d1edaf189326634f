//! ============================================================================
//! Catalog - The collectible items that can drop from a pack
//! ============================================================================
//! Iteration order is significant: the drop roll walks items in the order
//! they were inserted.
//! ============================================================================

use anyhow::{anyhow, Result};
use tracing::{debug, warn};

use crate::types::{ItemRecord, ItemStats, Rarity};

/// Item returned when the roll finds nothing (e.g. every weight is zero)
pub const DEFAULT_FALLBACK_ITEM: &str = "curry_puff";

/// Ordered collection of catalog items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    items: Vec<ItemRecord>,
}

impl Catalog {
    /// Build a catalog, rejecting invalid records and duplicate ids
    pub fn new(items: Vec<ItemRecord>) -> Result<Self> {
        let mut catalog = Self { items: Vec::with_capacity(items.len()) };
        for item in items {
            item.validate().map_err(|e| anyhow!("{}", e))?;
            if catalog.get(&item.id).is_some() {
                return Err(anyhow!("Duplicate item id in catalog: {}", item.id));
            }
            catalog.items.push(item);
        }
        Ok(catalog)
    }

    /// Parse a catalog from a JSON array of items
    pub fn from_json(json: &str) -> Result<Self> {
        let items: Vec<ItemRecord> = serde_json::from_str(json)
            .map_err(|e| anyhow!("Failed to parse catalog JSON: {}", e))?;
        Self::new(items)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.items)
            .map_err(|e| anyhow!("Failed to serialize catalog: {}", e))
    }

    pub fn get(&self, item_id: &str) -> Option<&ItemRecord> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn items(&self) -> &[ItemRecord] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn by_rarity(&self, rarity: Rarity) -> Vec<&ItemRecord> {
        self.items.iter().filter(|i| i.rarity == rarity).collect()
    }

    pub fn total_weight(&self) -> u64 {
        self.items.iter().map(|i| i.drop_rate as u64).sum()
    }

    /// Apply admin-edited drop rate and threshold. Returns false for
    /// unknown ids or stats that would make the item invalid.
    pub fn apply_stats(&mut self, item_id: &str, stats: ItemStats) -> bool {
        if stats.reward_threshold == 0 {
            warn!("Ignoring zero reward threshold for {}", item_id);
            return false;
        }
        match self.items.iter_mut().find(|i| i.id == item_id) {
            Some(item) => {
                item.drop_rate = stats.drop_rate;
                item.reward_threshold = stats.reward_threshold;
                debug!(
                    "Updated {}: rate {}, threshold {}",
                    item_id, stats.drop_rate, stats.reward_threshold
                );
                true
            }
            None => {
                warn!("Stats for unknown item {} ignored", item_id);
                false
            }
        }
    }

    /// The six Old Chang Kee snacks the game ships with
    pub fn default_catalog() -> Self {
        Self {
            items: vec![
                ItemRecord::new(
                    "curry_puff",
                    "Curry Puff",
                    "The iconic Old Chang Kee snack with a crispy golden crust",
                    Rarity::Common,
                    40,
                    10,
                    "$5 Off Voucher",
                ),
                ItemRecord::new(
                    "fish_ball",
                    "Fish Ball",
                    "Crispy on the outside, tender fish paste inside",
                    Rarity::Common,
                    30,
                    10,
                    "$5 Off Voucher",
                ),
                ItemRecord::new(
                    "spring_roll",
                    "Spring Roll",
                    "Crispy vegetable spring roll",
                    Rarity::Uncommon,
                    20,
                    8,
                    "$10 Off Voucher",
                ),
                ItemRecord::new(
                    "sotong_ball",
                    "Sotong Ball",
                    "Delicious squid ball with a crispy coating",
                    Rarity::Uncommon,
                    15,
                    8,
                    "$10 Off Voucher",
                ),
                ItemRecord::new(
                    "chicken_wing",
                    "Chicken Wing",
                    "Perfectly seasoned and fried chicken wings",
                    Rarity::Rare,
                    10,
                    5,
                    "$15 Off Voucher",
                ),
                ItemRecord::new(
                    "ngor_hiang",
                    "Ngor Hiang",
                    "The ultimate Old Chang Kee treat! Five-spice meat roll",
                    Rarity::Legendary,
                    5,
                    3,
                    "$20 Off Voucher",
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = Catalog::default_catalog();
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog.total_weight(), 120);
        assert_eq!(catalog.items()[0].id, DEFAULT_FALLBACK_ITEM);
        assert_eq!(catalog.by_rarity(Rarity::Uncommon).len(), 2);
        assert_eq!(catalog.get("ngor_hiang").map(|i| i.reward_threshold), Some(3));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let item = Catalog::default_catalog().items()[0].clone();
        assert!(Catalog::new(vec![item.clone(), item]).is_err());
    }

    #[test]
    fn test_json_keeps_order() {
        let catalog = Catalog::default_catalog();
        let json = catalog.to_json().unwrap();
        let parsed = Catalog::from_json(&json).unwrap();
        let ids: Vec<_> = parsed.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            ["curry_puff", "fish_ball", "spring_roll", "sotong_ball", "chicken_wing", "ngor_hiang"]
        );
    }

    #[test]
    fn test_from_json_rejects_invalid_item() {
        let json = r#"[{"id":"x","name":"X","rarity":"rare","drop_rate":1,
            "reward_threshold":0,"reward_description":"none"}]"#;
        assert!(Catalog::from_json(json).is_err());
    }

    #[test]
    fn test_apply_stats() {
        let mut catalog = Catalog::default_catalog();
        let stats = ItemStats { drop_rate: 99, reward_threshold: 2 };
        assert!(catalog.apply_stats("fish_ball", stats));
        assert_eq!(catalog.get("fish_ball").unwrap().drop_rate, 99);
        assert!(!catalog.apply_stats("kaya_toast", stats));
        assert!(!catalog.apply_stats(
            "fish_ball",
            ItemStats { drop_rate: 1, reward_threshold: 0 }
        ));
        assert_eq!(catalog.get("fish_ball").unwrap().reward_threshold, 2);
    }
}
