//! ============================================================================
//! Collection Backend - Persistence seam for scans, rewards and vouchers
//! ============================================================================
//! The scan service only talks to this trait. `PackDropDb` implements it on
//! top of redb; `MemoryBackend` keeps everything in a mutex-guarded map for
//! tests and dry runs.
//!
//! Required semantics:
//! - `increment_item_count` is an atomic increment that returns the new value
//! - `claim_reward` is an atomic test-and-set of the claim flag plus a voucher
//!   append; it writes nothing when the flag is already set
//! - `mark_unlock_notified` is an atomic test-and-set of the per-item
//!   "unlock announced" marker, kept apart from the claim flag
//! ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::types::{ItemStats, UserProfile, Voucher, VoucherEntry};

#[async_trait]
pub trait CollectionBackend: Send + Sync {
    /// Store a new profile with zeroed counters and unclaimed flags
    async fn create_user(&self, profile: &UserProfile, item_ids: &[String]) -> Result<()>;

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Bump total scans and the last scan time; returns the new total
    async fn record_scan_visit(&self, user_id: &str) -> Result<u64>;

    /// Atomically add one to the (user, item) counter; returns the new count
    async fn increment_item_count(&self, user_id: &str, item_id: &str) -> Result<u32>;

    async fn is_reward_claimed(&self, user_id: &str, item_id: &str) -> Result<bool>;

    /// Set the unlock-announced marker for (user, item).
    /// Returns true if it was already set.
    async fn mark_unlock_notified(&self, user_id: &str, item_id: &str) -> Result<bool>;

    /// Set the claim flag and append the voucher in one step.
    /// Returns the voucher's push key, or None if the flag was already set.
    async fn claim_reward(&self, user_id: &str, voucher: &Voucher) -> Result<Option<String>>;

    async fn vouchers(&self, user_id: &str) -> Result<Vec<VoucherEntry>>;

    /// Claim flags keyed by item id
    async fn claim_flags(&self, user_id: &str) -> Result<BTreeMap<String, bool>>;

    /// Counters keyed by item id
    async fn collection(&self, user_id: &str) -> Result<BTreeMap<String, u32>>;

    /// Admin-edited drop rates and thresholds
    async fn item_stats(&self) -> Result<Vec<(String, ItemStats)>>;
}

/// Push-generated unique key for append-only lists
pub fn push_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<String, UserProfile>,
    counters: HashMap<(String, String), u32>,
    claims: HashMap<(String, String), bool>,
    notified: HashSet<(String, String)>,
    vouchers: HashMap<String, Vec<VoucherEntry>>,
    item_stats: Vec<(String, ItemStats)>,
}

/// In-process backend. `set_offline(true)` makes every call fail the way a
/// dropped connection would.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    offline: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Admin path: overwrite stats for an item
    pub fn set_item_stats(&self, item_id: &str, stats: ItemStats) -> Result<()> {
        let mut state = self.lock()?;
        match state.item_stats.iter_mut().find(|(id, _)| id == item_id) {
            Some(entry) => entry.1 = stats,
            None => state.item_stats.push((item_id.to_string(), stats)),
        }
        Ok(())
    }

    /// Admin path: overwrite a counter, bypassing the scan path
    pub fn set_item_count(&self, user_id: &str, item_id: &str, count: u32) -> Result<()> {
        let mut state = self.lock()?;
        state
            .counters
            .insert((user_id.to_string(), item_id.to_string()), count);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(anyhow!("Backend offline"));
        }
        self.state.lock().map_err(|_| anyhow!("Backend lock poisoned"))
    }
}

#[async_trait]
impl CollectionBackend for MemoryBackend {
    async fn create_user(&self, profile: &UserProfile, item_ids: &[String]) -> Result<()> {
        let mut state = self.lock()?;
        let user = profile.user_id.clone();
        for item in item_ids {
            state.counters.insert((user.clone(), item.clone()), 0);
            state.claims.insert((user.clone(), item.clone()), false);
        }
        state.users.insert(user, profile.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.lock()?.users.get(user_id).cloned())
    }

    async fn record_scan_visit(&self, user_id: &str) -> Result<u64> {
        let mut state = self.lock()?;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| anyhow!("User not found: {}", user_id))?;
        user.total_scans += 1;
        user.last_scan_at = Some(Utc::now());
        Ok(user.total_scans)
    }

    async fn increment_item_count(&self, user_id: &str, item_id: &str) -> Result<u32> {
        let mut state = self.lock()?;
        let count = state
            .counters
            .entry((user_id.to_string(), item_id.to_string()))
            .or_insert(0);
        *count = count.saturating_add(1);
        Ok(*count)
    }

    async fn is_reward_claimed(&self, user_id: &str, item_id: &str) -> Result<bool> {
        let state = self.lock()?;
        Ok(state
            .claims
            .get(&(user_id.to_string(), item_id.to_string()))
            .copied()
            .unwrap_or(false))
    }

    async fn mark_unlock_notified(&self, user_id: &str, item_id: &str) -> Result<bool> {
        let mut state = self.lock()?;
        Ok(!state
            .notified
            .insert((user_id.to_string(), item_id.to_string())))
    }

    async fn claim_reward(&self, user_id: &str, voucher: &Voucher) -> Result<Option<String>> {
        let mut state = self.lock()?;
        let flag = state
            .claims
            .entry((user_id.to_string(), voucher.item_id.clone()))
            .or_insert(false);
        if *flag {
            return Ok(None);
        }
        *flag = true;

        let key = push_key();
        state
            .vouchers
            .entry(user_id.to_string())
            .or_default()
            .push(VoucherEntry {
                key: key.clone(),
                voucher: voucher.clone(),
            });
        Ok(Some(key))
    }

    async fn vouchers(&self, user_id: &str) -> Result<Vec<VoucherEntry>> {
        Ok(self.lock()?.vouchers.get(user_id).cloned().unwrap_or_default())
    }

    async fn claim_flags(&self, user_id: &str) -> Result<BTreeMap<String, bool>> {
        let state = self.lock()?;
        Ok(state
            .claims
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|((_, item), claimed)| (item.clone(), *claimed))
            .collect())
    }

    async fn collection(&self, user_id: &str) -> Result<BTreeMap<String, u32>> {
        let state = self.lock()?;
        Ok(state
            .counters
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|((_, item), count)| (item.clone(), *count))
            .collect())
    }

    async fn item_stats(&self) -> Result<Vec<(String, ItemStats)>> {
        Ok(self.lock()?.item_stats.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn voucher(item_id: &str) -> Voucher {
        let catalog = Catalog::default_catalog();
        Voucher::issue(catalog.get(item_id).unwrap())
    }

    #[tokio::test]
    async fn test_increment_returns_new_value() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.increment_item_count("u1", "fish_ball").await.unwrap(), 1);
        assert_eq!(backend.increment_item_count("u1", "fish_ball").await.unwrap(), 2);
        assert_eq!(backend.increment_item_count("u2", "fish_ball").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_claim_is_test_and_set() {
        let backend = MemoryBackend::new();
        let first = backend.claim_reward("u1", &voucher("curry_puff")).await.unwrap();
        let second = backend.claim_reward("u1", &voucher("curry_puff")).await.unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(backend.vouchers("u1").await.unwrap().len(), 1);
        assert!(backend.is_reward_claimed("u1", "curry_puff").await.unwrap());
    }

    #[tokio::test]
    async fn test_unlock_marker_is_test_and_set() {
        let backend = MemoryBackend::new();
        assert!(!backend.mark_unlock_notified("u1", "fish_ball").await.unwrap());
        assert!(backend.mark_unlock_notified("u1", "fish_ball").await.unwrap());
        assert!(!backend.mark_unlock_notified("u2", "fish_ball").await.unwrap());
        // the marker leaves the claim flag alone
        assert!(!backend.is_reward_claimed("u1", "fish_ball").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_user_zeroes_collection() {
        let backend = MemoryBackend::new();
        let ids: Vec<String> = Catalog::default_catalog().items().iter().map(|i| i.id.clone()).collect();
        backend
            .create_user(&UserProfile::new("u1", "ah boy", "a@b.c"), &ids)
            .await
            .unwrap();
        let collection = backend.collection("u1").await.unwrap();
        assert_eq!(collection.len(), 6);
        assert!(collection.values().all(|c| *c == 0));
        assert!(backend.claim_flags("u1").await.unwrap().values().all(|c| !c));
        assert_eq!(backend.record_scan_visit("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        assert!(backend.increment_item_count("u1", "fish_ball").await.is_err());
        backend.set_offline(false);
        assert_eq!(backend.increment_item_count("u1", "fish_ball").await.unwrap(), 1);
    }
}
