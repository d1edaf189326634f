//! ============================================================================
//! Scan Service - Record scans, check unlocks, claim rewards
//! ============================================================================
//! All collaborators are passed in at construction: the backend, the
//! catalog, the drop resolver and the claim policy. The signed-in user is
//! held here; every user-scoped call fails with `NotAuthenticated` when
//! nobody is signed in.
//!
//! Scan order:
//! 1. roll an item (a roll that misses the catalog voids the scan)
//! 2. bump the user's scan total
//! 3. atomically increment the item counter and read the new value
//! 4. run the unlock check against the stored claim flag and mark the
//!    unlock as announced, so it is reported at most once per item
//! ============================================================================

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::CollectionBackend;
use crate::catalog::Catalog;
use crate::config::PackDropConfig;
use crate::drop_resolver::DropResolver;
use crate::error::ScanError;
use crate::reward;
use crate::types::{
    ClaimPolicy, ItemRecord, ScanResult, UserProfile, UserStats, Voucher, VoucherEntry,
};

pub struct ScanService {
    backend: Arc<dyn CollectionBackend>,
    catalog: RwLock<Catalog>,
    resolver: Mutex<DropResolver>,
    current_user: RwLock<Option<String>>,
    claim_policy: ClaimPolicy,
}

impl ScanService {
    pub fn new(
        backend: Arc<dyn CollectionBackend>,
        catalog: Catalog,
        resolver: DropResolver,
        claim_policy: ClaimPolicy,
    ) -> Self {
        Self {
            backend,
            catalog: RwLock::new(catalog),
            resolver: Mutex::new(resolver),
            current_user: RwLock::new(None),
            claim_policy,
        }
    }

    /// Service with an entropy-seeded resolver and the configured policy
    pub fn from_config(
        backend: Arc<dyn CollectionBackend>,
        catalog: Catalog,
        config: &PackDropConfig,
    ) -> Self {
        let resolver = DropResolver::new().with_fallback(&config.fallback_item);
        Self::new(backend, catalog, resolver, config.claim_policy)
    }

    // ========================================================================
    // Auth context
    // ========================================================================

    /// Create a profile with zeroed counters for every catalog item and sign in
    pub async fn sign_up(&self, username: &str, email: &str) -> Result<String, ScanError> {
        let user_id = uuid::Uuid::new_v4().simple().to_string();
        let profile = UserProfile::new(&user_id, username, email);
        let item_ids: Vec<String> = self
            .catalog
            .read()
            .await
            .items()
            .iter()
            .map(|i| i.id.clone())
            .collect();

        self.backend
            .create_user(&profile, &item_ids)
            .await
            .map_err(ScanError::backend)?;

        *self.current_user.write().await = Some(user_id.clone());
        info!("Signed up {} as {}", username, user_id);
        Ok(user_id)
    }

    /// Sign in an existing user. Credentials are the identity provider's job.
    pub async fn sign_in(&self, user_id: &str) -> Result<(), ScanError> {
        let profile = self
            .backend
            .get_user(user_id)
            .await
            .map_err(ScanError::backend)?;
        if profile.is_none() {
            warn!("Sign-in for unknown user {}", user_id);
            return Err(ScanError::NotAuthenticated);
        }

        *self.current_user.write().await = Some(user_id.to_string());
        info!("Signed in {}", user_id);
        Ok(())
    }

    pub async fn sign_out(&self) {
        if let Some(user) = self.current_user.write().await.take() {
            info!("Signed out {}", user);
        }
    }

    pub async fn current_user(&self) -> Option<String> {
        self.current_user.read().await.clone()
    }

    async fn require_user(&self) -> Result<String, ScanError> {
        self.current_user().await.ok_or(ScanError::NotAuthenticated)
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    pub async fn item(&self, item_id: &str) -> Option<ItemRecord> {
        self.catalog.read().await.get(item_id).cloned()
    }

    /// Pull admin-edited drop rates and thresholds into the local catalog.
    /// Returns how many items were updated.
    pub async fn sync_catalog(&self) -> Result<usize, ScanError> {
        let stats = self.backend.item_stats().await.map_err(ScanError::backend)?;

        let mut catalog = self.catalog.write().await;
        let applied = stats
            .into_iter()
            .filter(|(item_id, stats)| catalog.apply_stats(item_id, *stats))
            .count();

        info!("Synced {} items from the store", applied);
        Ok(applied)
    }

    // ========================================================================
    // Scanning
    // ========================================================================

    pub async fn record_scan(&self) -> Result<ScanResult, ScanError> {
        let user_id = self.require_user().await?;

        let item = {
            let catalog = self.catalog.read().await;
            let item_id = match self.resolver.lock() {
                Ok(mut resolver) => resolver.roll(&catalog),
                Err(_) => return Err(ScanError::Backend("drop resolver lock poisoned".into())),
            };
            match catalog.get(&item_id) {
                Some(item) => item.clone(),
                None => {
                    warn!("Rolled {} but it is not in the catalog; scan void", item_id);
                    return Err(ScanError::UnknownItem(item_id));
                }
            }
        };

        self.backend
            .record_scan_visit(&user_id)
            .await
            .map_err(ScanError::backend)?;

        let new_count = self
            .backend
            .increment_item_count(&user_id, &item.id)
            .await
            .map_err(|e| {
                warn!("Counter update for {} failed: {:#}", item.id, e);
                ScanError::backend(e)
            })?;

        let mut result = ScanResult::new(&item, new_count);
        self.check_unlock(&user_id, &item, &mut result).await;

        info!(
            "{} scanned {} (count {}, unlocked {})",
            user_id, item.id, new_count, result.reward_unlocked
        );
        Ok(result)
    }

    /// Mark `result` as unlocked when the count sits exactly on the threshold,
    /// the reward is unclaimed and the unlock was never announced before.
    /// A failed flag read or marker write leaves it locked.
    async fn check_unlock(&self, user_id: &str, item: &ItemRecord, result: &mut ScanResult) {
        if result.new_count != item.reward_threshold {
            return;
        }

        let claimed = match self.backend.is_reward_claimed(user_id, &item.id).await {
            Ok(claimed) => claimed,
            Err(e) => {
                warn!("Claim flag read for {} failed: {:#}", item.id, e);
                return;
            }
        };
        if claimed {
            debug!("{} already claimed {}", user_id, item.id);
            return;
        }

        let notified = match self.backend.mark_unlock_notified(user_id, &item.id).await {
            Ok(notified) => notified,
            Err(e) => {
                warn!("Unlock marker for {} failed: {:#}", item.id, e);
                return;
            }
        };
        if !reward::is_newly_unlocked(result.new_count, item.reward_threshold, claimed, notified) {
            debug!("{} was already told about {}", user_id, item.id);
            return;
        }

        if self.claim_policy == ClaimPolicy::OnUnlock {
            let voucher = Voucher::issue(item);
            match self.backend.claim_reward(user_id, &voucher).await {
                Ok(Some(_key)) => result.voucher = Some(voucher),
                Ok(None) => {
                    debug!("{} claimed {} concurrently", user_id, item.id);
                    return;
                }
                Err(e) => {
                    warn!("Claim at unlock for {} failed: {:#}", item.id, e);
                    return;
                }
            }
        }

        result.reward_unlocked = true;
        result.reward_earned = Some(item.reward_description.clone());
    }

    // ========================================================================
    // Rewards
    // ========================================================================

    /// Claim the reward for an item whose count reached its threshold.
    /// A second claim is rejected and writes nothing.
    pub async fn claim_reward(&self, item_id: &str) -> Result<VoucherEntry, ScanError> {
        let user_id = self.require_user().await?;
        let item = self
            .item(item_id)
            .await
            .ok_or_else(|| ScanError::UnknownItem(item_id.to_string()))?;

        let count = self
            .backend
            .collection(&user_id)
            .await
            .map_err(ScanError::backend)?
            .get(item_id)
            .copied()
            .unwrap_or(0);
        if reward::remaining(count, item.reward_threshold) > 0 {
            return Err(ScanError::NotEligible {
                count,
                threshold: item.reward_threshold,
            });
        }

        let voucher = Voucher::issue(&item);
        match self
            .backend
            .claim_reward(&user_id, &voucher)
            .await
            .map_err(ScanError::backend)?
        {
            Some(key) => {
                info!("{} claimed {} ({})", user_id, item_id, voucher.code);
                Ok(VoucherEntry { key, voucher })
            }
            None => Err(ScanError::AlreadyClaimed),
        }
    }

    /// Items whose reward can be claimed right now, in catalog order
    pub async fn claimable_rewards(&self) -> Result<Vec<ItemRecord>, ScanError> {
        let collection = self.collection().await?;
        let claims = self.claim_flags().await?;
        let catalog = self.catalog.read().await;

        Ok(catalog
            .items()
            .iter()
            .filter(|item| {
                let count = collection.get(&item.id).copied().unwrap_or(0);
                let claimed = claims.get(&item.id).copied().unwrap_or(false);
                reward::is_claimable(count, item.reward_threshold, claimed)
            })
            .cloned()
            .collect())
    }

    pub async fn vouchers(&self) -> Result<Vec<VoucherEntry>, ScanError> {
        let user_id = self.require_user().await?;
        self.backend.vouchers(&user_id).await.map_err(ScanError::backend)
    }

    pub async fn claim_flags(&self) -> Result<BTreeMap<String, bool>, ScanError> {
        let user_id = self.require_user().await?;
        self.backend.claim_flags(&user_id).await.map_err(ScanError::backend)
    }

    pub async fn collection(&self) -> Result<BTreeMap<String, u32>, ScanError> {
        let user_id = self.require_user().await?;
        self.backend.collection(&user_id).await.map_err(ScanError::backend)
    }

    pub async fn user_stats(&self) -> Result<UserStats, ScanError> {
        let user_id = self.require_user().await?;
        let profile = self
            .backend
            .get_user(&user_id)
            .await
            .map_err(ScanError::backend)?
            .ok_or(ScanError::NotAuthenticated)?;
        let collection = self.collection().await?;
        let claims = self.claim_flags().await?;
        let catalog_size = self.catalog.read().await.len();

        let unique_items = collection.values().filter(|c| **c > 0).count();
        let completion_percent = if catalog_size == 0 {
            0.0
        } else {
            unique_items as f32 / catalog_size as f32 * 100.0
        };

        Ok(UserStats {
            total_scans: profile.total_scans,
            unique_items,
            total_items: collection.values().map(|c| *c as u64).sum(),
            completion_percent,
            claimed_rewards: claims.values().filter(|c| **c).count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::types::{ItemStats, Rarity};

    /// One-item catalog so every roll is predictable
    fn single_item(threshold: u32) -> Catalog {
        Catalog::new(vec![ItemRecord::new(
            "fish_ball",
            "Fish Ball",
            "",
            Rarity::Common,
            30,
            threshold,
            "$5 Off Voucher",
        )])
        .unwrap()
    }

    async fn signed_in(catalog: Catalog, policy: ClaimPolicy) -> (Arc<MemoryBackend>, ScanService) {
        let backend = Arc::new(MemoryBackend::new());
        let service = ScanService::new(backend.clone(), catalog, DropResolver::seeded(3), policy);
        service.sign_up("mei", "mei@example.com").await.unwrap();
        (backend, service)
    }

    #[tokio::test]
    async fn test_scan_requires_sign_in() {
        let backend = Arc::new(MemoryBackend::new());
        let service = ScanService::new(
            backend,
            Catalog::default_catalog(),
            DropResolver::seeded(1),
            ClaimPolicy::OnClaim,
        );
        assert_eq!(service.record_scan().await, Err(ScanError::NotAuthenticated));
        assert_eq!(service.claim_reward("curry_puff").await, Err(ScanError::NotAuthenticated));
        assert_eq!(service.sign_in("nobody").await, Err(ScanError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_scan_counts_and_first_time() {
        let (_backend, service) = signed_in(single_item(3), ClaimPolicy::OnClaim).await;

        let first = service.record_scan().await.unwrap();
        assert_eq!(first.item_id, "fish_ball");
        assert_eq!(first.new_count, 1);
        assert!(first.is_first_time);

        let second = service.record_scan().await.unwrap();
        assert_eq!(second.new_count, 2);
        assert!(!second.is_first_time);

        let stats = service.user_stats().await.unwrap();
        assert_eq!(stats.total_scans, 2);
        assert_eq!(stats.unique_items, 1);
        assert_eq!(stats.completion_percent, 100.0);
    }

    #[tokio::test]
    async fn test_unlock_fires_once_at_threshold() {
        let (_backend, service) = signed_in(single_item(2), ClaimPolicy::OnClaim).await;

        let unlocked: Vec<bool> = {
            let mut out = Vec::new();
            for _ in 0..4 {
                out.push(service.record_scan().await.unwrap().reward_unlocked);
            }
            out
        };
        assert_eq!(unlocked, [false, true, false, false]);
        // deferred policy: nothing claimed yet
        assert_eq!(service.claim_flags().await.unwrap().get("fish_ball"), Some(&false));
    }

    #[tokio::test]
    async fn test_unclaimed_return_to_threshold_stays_silent() {
        let (backend, service) = signed_in(single_item(2), ClaimPolicy::OnClaim).await;
        let user = service.current_user().await.unwrap();

        let mut seen = Vec::new();
        for step in 0..4 {
            if step == 3 {
                backend.set_item_count(&user, "fish_ball", 1).unwrap();
            }
            let result = service.record_scan().await.unwrap();
            seen.push((result.new_count, result.reward_unlocked));
        }
        assert_eq!(seen, [(1, false), (2, true), (3, false), (2, false)]);
        // still claimable once
        assert_eq!(service.claim_flags().await.unwrap().get("fish_ball"), Some(&false));
        assert!(service.claim_reward("fish_ball").await.is_ok());
    }

    #[tokio::test]
    async fn test_admin_reset_to_threshold_after_claim_stays_silent() {
        let (backend, service) = signed_in(single_item(2), ClaimPolicy::OnClaim).await;
        service.record_scan().await.unwrap();
        assert!(service.record_scan().await.unwrap().reward_unlocked);
        service.claim_reward("fish_ball").await.unwrap();

        let user = service.current_user().await.unwrap();
        backend.set_item_count(&user, "fish_ball", 1).unwrap();
        let again = service.record_scan().await.unwrap();
        assert_eq!(again.new_count, 2);
        assert!(!again.reward_unlocked);
    }

    #[tokio::test]
    async fn test_claim_is_idempotent() {
        let (_backend, service) = signed_in(single_item(1), ClaimPolicy::OnClaim).await;
        assert_eq!(
            service.claim_reward("fish_ball").await,
            Err(ScanError::NotEligible { count: 0, threshold: 1 })
        );

        service.record_scan().await.unwrap();
        assert_eq!(service.claimable_rewards().await.unwrap().len(), 1);
        let entry = service.claim_reward("fish_ball").await.unwrap();
        assert!(service.claimable_rewards().await.unwrap().is_empty());
        assert!(entry.voucher.code.starts_with("OCK-"));
        assert_eq!(entry.voucher.description, "$5 Off Voucher");

        assert_eq!(service.claim_reward("fish_ball").await, Err(ScanError::AlreadyClaimed));
        assert_eq!(service.vouchers().await.unwrap().len(), 1);
        assert_eq!(
            service.claim_reward("kaya_toast").await,
            Err(ScanError::UnknownItem("kaya_toast".into()))
        );
    }

    #[tokio::test]
    async fn test_unlock_policy_claims_immediately() {
        let (_backend, service) = signed_in(single_item(1), ClaimPolicy::OnUnlock).await;
        let result = service.record_scan().await.unwrap();
        assert!(result.reward_unlocked);
        assert!(result.voucher.is_some());
        assert_eq!(service.vouchers().await.unwrap().len(), 1);
        assert_eq!(service.claim_reward("fish_ball").await, Err(ScanError::AlreadyClaimed));
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_counts_unchanged() {
        let (backend, service) = signed_in(single_item(5), ClaimPolicy::OnClaim).await;
        backend.set_offline(true);
        let err = service.record_scan().await.unwrap_err();
        assert_eq!(err.to_string(), "Connection error");
        backend.set_offline(false);
        assert_eq!(service.collection().await.unwrap().get("fish_ball"), Some(&0));
    }

    #[tokio::test]
    async fn test_fallback_outside_catalog_voids_scan() {
        let backend = Arc::new(MemoryBackend::new());
        let mut catalog = single_item(5);
        catalog.apply_stats("fish_ball", ItemStats { drop_rate: 0, reward_threshold: 5 });
        let service = ScanService::new(
            backend,
            catalog,
            DropResolver::seeded(1).with_fallback("curry_puff"),
            ClaimPolicy::OnClaim,
        );
        service.sign_up("mei", "m@x").await.unwrap();

        assert_eq!(
            service.record_scan().await,
            Err(ScanError::UnknownItem("curry_puff".into()))
        );
        assert_eq!(service.user_stats().await.unwrap().total_scans, 0);
    }

    #[tokio::test]
    async fn test_sync_catalog_applies_admin_edits() {
        let (backend, service) = signed_in(Catalog::default_catalog(), ClaimPolicy::OnClaim).await;
        backend
            .set_item_stats("ngor_hiang", ItemStats { drop_rate: 80, reward_threshold: 1 })
            .unwrap();
        backend
            .set_item_stats("kaya_toast", ItemStats { drop_rate: 1, reward_threshold: 1 })
            .unwrap();

        assert_eq!(service.sync_catalog().await.unwrap(), 1);
        let item = service.item("ngor_hiang").await.unwrap();
        assert_eq!((item.drop_rate, item.reward_threshold), (80, 1));
    }

    #[tokio::test]
    async fn test_sign_out_blocks_scans() {
        let (_backend, service) = signed_in(single_item(5), ClaimPolicy::OnClaim).await;
        let user = service.current_user().await.unwrap();
        service.sign_out().await;
        assert_eq!(service.record_scan().await, Err(ScanError::NotAuthenticated));
        service.sign_in(&user).await.unwrap();
        assert!(service.record_scan().await.is_ok());
    }
}
