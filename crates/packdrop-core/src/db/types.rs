//! ============================================================================
//! Database Types - Serializable records for redb storage
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{ItemRecord, UserProfile, VoucherEntry};

/// Catalog item plus its position, so the drop order survives a reload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredItem {
    pub position: u32,
    pub item: ItemRecord,
}

/// Everything stored for one user, as shown by the admin surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub profile: UserProfile,
    /// Counters keyed by item id
    pub collected_items: BTreeMap<String, u32>,
    /// Claim flags keyed by `<item>_reward`
    pub claimed_rewards: BTreeMap<String, bool>,
    pub vouchers: Vec<VoucherEntry>,
}

/// Dashboard totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub total_users: usize,
    pub total_scans: u64,
    pub total_vouchers: usize,
    pub total_items: usize,
}
