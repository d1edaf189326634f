// ============================================================================
// PackDropDb - Embedded Database (redb)
// ============================================================================
// Persistent storage for the catalog, user profiles, collection counters,
// claim flags, unlock markers and vouchers. Each scan-path mutation is one write
// transaction, which gives atomic increment-and-return and test-and-set.
// Default path: ~/.packdrop/packdrop.redb (override via PACKDROP_DB_PATH)
// ============================================================================

pub mod types;

pub use types::{DbStats, StoredItem, UserSnapshot};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::backend::{push_key, CollectionBackend};
use crate::catalog::Catalog;
use crate::types::{reward_key, ItemRecord, ItemStats, UserProfile, Voucher, VoucherEntry};

// Table definitions
const ITEMS: TableDefinition<&str, &[u8]> = TableDefinition::new("items");
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
const COUNTERS: TableDefinition<&str, u32> = TableDefinition::new("counters");
const CLAIMS: TableDefinition<&str, bool> = TableDefinition::new("claims");
const UNLOCKS: TableDefinition<&str, bool> = TableDefinition::new("unlocks_notified");
const VOUCHERS: TableDefinition<&str, &[u8]> = TableDefinition::new("vouchers");

/// Key for per-user records: `<user>/<suffix>`
fn user_key(user_id: &str, suffix: &str) -> String {
    format!("{}/{}", user_id, suffix)
}

/// All keys belonging to a user start with this
fn user_prefix(user_id: &str) -> String {
    format!("{}/", user_id)
}

fn encode<T: Serialize>(value: &T, what: &str) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| anyhow!("Failed to serialize {}: {}", what, e))
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| anyhow!("Failed to deserialize {}: {}", what, e))
}

/// Reject ids that would break the `<user>/<item>` key layout
fn check_id(id: &str, what: &str) -> Result<()> {
    if id.is_empty() || id.contains('/') {
        return Err(anyhow!("Invalid {} id '{}'", what, id));
    }
    Ok(())
}

/// Embedded database for PackDrop
pub struct PackDropDb {
    db: Database,
    path: PathBuf,
}

impl PackDropDb {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses PACKDROP_DB_PATH env var or ~/.packdrop/packdrop.redb
    pub fn open(path: Option<&str>) -> Result<Self> {
        let db_path = if let Some(p) = path {
            PathBuf::from(p)
        } else if let Ok(env_path) = std::env::var("PACKDROP_DB_PATH") {
            PathBuf::from(env_path)
        } else {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
            let packdrop_dir = home.join(".packdrop");
            std::fs::create_dir_all(&packdrop_dir)
                .map_err(|e| anyhow!("Failed to create .packdrop directory: {}", e))?;
            packdrop_dir.join("packdrop.redb")
        };

        info!("Opening database at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open database: {}", e))?;

        // Ensure tables exist by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn.open_table(ITEMS).map_err(|e| anyhow!("Failed to create items table: {}", e))?;
            let _ = write_txn.open_table(USERS).map_err(|e| anyhow!("Failed to create users table: {}", e))?;
            let _ = write_txn.open_table(COUNTERS).map_err(|e| anyhow!("Failed to create counters table: {}", e))?;
            let _ = write_txn.open_table(CLAIMS).map_err(|e| anyhow!("Failed to create claims table: {}", e))?;
            let _ = write_txn.open_table(UNLOCKS).map_err(|e| anyhow!("Failed to create unlocks table: {}", e))?;
            let _ = write_txn.open_table(VOUCHERS).map_err(|e| anyhow!("Failed to create vouchers table: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        info!("Database ready");

        Ok(Self { db, path: db_path })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Catalog Operations
    // ========================================================================

    /// Insert or replace an item, keeping its position if it already exists
    pub fn upsert_item(&self, item: &ItemRecord) -> Result<()> {
        item.validate().map_err(|e| anyhow!("{}", e))?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(ITEMS)
                .map_err(|e| anyhow!("Failed to open items table: {}", e))?;

            let existing = match table.get(item.id.as_str())
                .map_err(|e| anyhow!("Failed to get item: {}", e))?
            {
                Some(value) => Some(decode::<StoredItem>(value.value(), "item")?.position),
                None => None,
            };
            let position = match existing {
                Some(p) => p,
                None => table.len().map_err(|e| anyhow!("Failed to count items: {}", e))? as u32,
            };

            let value = encode(&StoredItem { position, item: item.clone() }, "item")?;
            table.insert(item.id.as_str(), value.as_slice())
                .map_err(|e| anyhow!("Failed to insert item: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored item: {}", item.id);
        Ok(())
    }

    pub fn get_item(&self, item_id: &str) -> Result<Option<ItemRecord>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(ITEMS)
            .map_err(|e| anyhow!("Failed to open items table: {}", e))?;

        match table.get(item_id).map_err(|e| anyhow!("Failed to get item: {}", e))? {
            Some(value) => Ok(Some(decode::<StoredItem>(value.value(), "item")?.item)),
            None => Ok(None),
        }
    }

    /// Items in catalog order
    pub fn list_items(&self) -> Result<Vec<ItemRecord>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(ITEMS)
            .map_err(|e| anyhow!("Failed to open items table: {}", e))?;

        let mut stored = Vec::new();
        let iter = table.range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate items: {}", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            stored.push(decode::<StoredItem>(value.value(), "item")?);
        }
        stored.sort_by_key(|s| s.position);
        Ok(stored.into_iter().map(|s| s.item).collect())
    }

    /// Admin edit of drop rate and threshold. No validation beyond the item
    /// existing: the dashboard has always been allowed to write any value.
    pub fn set_item_stats(&self, item_id: &str, stats: ItemStats) -> Result<()> {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(ITEMS)
                .map_err(|e| anyhow!("Failed to open items table: {}", e))?;
            let mut stored = match table.get(item_id).map_err(|e| anyhow!("Failed to get item: {}", e))? {
                Some(value) => decode::<StoredItem>(value.value(), "item")?,
                None => return Err(anyhow!("Item not found: {}", item_id)),
            };
            stored.item.drop_rate = stats.drop_rate;
            stored.item.reward_threshold = stats.reward_threshold;

            let value = encode(&stored, "item")?;
            table.insert(item_id, value.as_slice())
                .map_err(|e| anyhow!("Failed to insert item: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        info!(
            "Updated {}: rate {}, threshold {}",
            item_id, stats.drop_rate, stats.reward_threshold
        );
        Ok(())
    }

    /// Write every catalog item; returns how many were stored
    pub fn seed_catalog(&self, catalog: &Catalog) -> Result<usize> {
        for item in catalog.items() {
            self.upsert_item(item)?;
        }
        info!("Seeded {} catalog items", catalog.len());
        Ok(catalog.len())
    }

    /// Catalog as stored, skipping records that no longer validate
    pub fn load_catalog(&self) -> Result<Catalog> {
        let items: Vec<ItemRecord> = self
            .list_items()?
            .into_iter()
            .filter(|item| match item.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Skipping stored item {}: {}", item.id, e);
                    false
                }
            })
            .collect();
        Catalog::new(items)
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    pub fn store_user(&self, profile: &UserProfile) -> Result<()> {
        check_id(&profile.user_id, "user")?;
        let value = encode(profile, "user")?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(USERS)
                .map_err(|e| anyhow!("Failed to open users table: {}", e))?;
            table.insert(profile.user_id.as_str(), value.as_slice())
                .map_err(|e| anyhow!("Failed to insert user: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored user: {}", profile.user_id);
        Ok(())
    }

    pub fn load_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(USERS)
            .map_err(|e| anyhow!("Failed to open users table: {}", e))?;

        match table.get(user_id).map_err(|e| anyhow!("Failed to get user: {}", e))? {
            Some(value) => Ok(Some(decode(value.value(), "user")?)),
            None => Ok(None),
        }
    }

    pub fn list_users(&self) -> Result<Vec<UserProfile>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(USERS)
            .map_err(|e| anyhow!("Failed to open users table: {}", e))?;

        let mut results = Vec::new();
        let iter = table.range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate users: {}", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            results.push(decode(value.value(), "user")?);
        }
        Ok(results)
    }

    /// Admin edit of the scan total
    pub fn set_total_scans(&self, user_id: &str, total_scans: u64) -> Result<()> {
        let mut profile = self
            .load_user(user_id)?
            .ok_or_else(|| anyhow!("User not found: {}", user_id))?;
        profile.total_scans = total_scans;
        self.store_user(&profile)?;
        info!("Set total scans for {} to {}", user_id, total_scans);
        Ok(())
    }

    /// Admin edit of a counter; bypasses the unlock check entirely
    pub fn set_item_count(&self, user_id: &str, item_id: &str, count: u32) -> Result<()> {
        check_id(item_id, "item")?;
        let key = user_key(user_id, item_id);

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(COUNTERS)
                .map_err(|e| anyhow!("Failed to open counters table: {}", e))?;
            table.insert(key.as_str(), count)
                .map_err(|e| anyhow!("Failed to set counter: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        info!("Set {} count for {} to {}", item_id, user_id, count);
        Ok(())
    }

    pub fn user_snapshot(&self, user_id: &str) -> Result<Option<UserSnapshot>> {
        let profile = match self.load_user(user_id)? {
            Some(p) => p,
            None => return Ok(None),
        };

        let claimed_rewards = self
            .read_claims(user_id)?
            .into_iter()
            .map(|(item, claimed)| (reward_key(&item), claimed))
            .collect();

        Ok(Some(UserSnapshot {
            profile,
            collected_items: self.read_counters(user_id)?,
            claimed_rewards,
            vouchers: self.read_vouchers(user_id)?,
        }))
    }

    // ========================================================================
    // Voucher Operations
    // ========================================================================

    pub fn delete_voucher(&self, user_id: &str, voucher_key: &str) -> Result<bool> {
        let key = user_key(user_id, voucher_key);

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let removed;
        {
            let mut table = write_txn.open_table(VOUCHERS)
                .map_err(|e| anyhow!("Failed to open vouchers table: {}", e))?;
            removed = table.remove(key.as_str())
                .map_err(|e| anyhow!("Failed to remove voucher: {}", e))?
                .is_some();
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit delete: {}", e))?;

        if removed {
            info!("Deleted voucher {} for {}", voucher_key, user_id);
        }
        Ok(removed)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn stats(&self) -> Result<DbStats> {
        let users = self.list_users()?;
        let total_items = self.list_items()?.len();

        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(VOUCHERS)
            .map_err(|e| anyhow!("Failed to open vouchers table: {}", e))?;
        let total_vouchers = table.len()
            .map_err(|e| anyhow!("Failed to count vouchers: {}", e))? as usize;

        Ok(DbStats {
            total_users: users.len(),
            total_scans: users.iter().map(|u| u.total_scans).sum(),
            total_vouchers,
            total_items,
        })
    }

    // ========================================================================
    // Per-user reads
    // ========================================================================

    fn read_counters(&self, user_id: &str) -> Result<BTreeMap<String, u32>> {
        let prefix = user_prefix(user_id);
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(COUNTERS)
            .map_err(|e| anyhow!("Failed to open counters table: {}", e))?;

        let mut results = BTreeMap::new();
        let iter = table.range::<&str>(prefix.as_str()..)
            .map_err(|e| anyhow!("Failed to iterate counters: {}", e))?;
        for entry in iter {
            let (key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            let Some(item) = key.value().strip_prefix(prefix.as_str()) else { break };
            results.insert(item.to_string(), value.value());
        }
        Ok(results)
    }

    fn read_claims(&self, user_id: &str) -> Result<BTreeMap<String, bool>> {
        let prefix = user_prefix(user_id);
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(CLAIMS)
            .map_err(|e| anyhow!("Failed to open claims table: {}", e))?;

        let mut results = BTreeMap::new();
        let iter = table.range::<&str>(prefix.as_str()..)
            .map_err(|e| anyhow!("Failed to iterate claims: {}", e))?;
        for entry in iter {
            let (key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            let Some(item) = key.value().strip_prefix(prefix.as_str()) else { break };
            results.insert(item.to_string(), value.value());
        }
        Ok(results)
    }

    fn read_vouchers(&self, user_id: &str) -> Result<Vec<VoucherEntry>> {
        let prefix = user_prefix(user_id);
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(VOUCHERS)
            .map_err(|e| anyhow!("Failed to open vouchers table: {}", e))?;

        let mut results = Vec::new();
        let iter = table.range::<&str>(prefix.as_str()..)
            .map_err(|e| anyhow!("Failed to iterate vouchers: {}", e))?;
        for entry in iter {
            let (key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            let Some(voucher_key) = key.value().strip_prefix(prefix.as_str()) else { break };
            results.push(VoucherEntry {
                key: voucher_key.to_string(),
                voucher: decode(value.value(), "voucher")?,
            });
        }
        results.sort_by_key(|e| e.voucher.issued_at);
        Ok(results)
    }
}

#[async_trait]
impl CollectionBackend for PackDropDb {
    async fn create_user(&self, profile: &UserProfile, item_ids: &[String]) -> Result<()> {
        check_id(&profile.user_id, "user")?;
        let value = encode(profile, "user")?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut users = write_txn.open_table(USERS)
                .map_err(|e| anyhow!("Failed to open users table: {}", e))?;
            if users.get(profile.user_id.as_str())
                .map_err(|e| anyhow!("Failed to get user: {}", e))?
                .is_some()
            {
                return Err(anyhow!("User already exists: {}", profile.user_id));
            }
            users.insert(profile.user_id.as_str(), value.as_slice())
                .map_err(|e| anyhow!("Failed to insert user: {}", e))?;

            let mut counters = write_txn.open_table(COUNTERS)
                .map_err(|e| anyhow!("Failed to open counters table: {}", e))?;
            let mut claims = write_txn.open_table(CLAIMS)
                .map_err(|e| anyhow!("Failed to open claims table: {}", e))?;
            for item_id in item_ids {
                let key = user_key(&profile.user_id, item_id);
                counters.insert(key.as_str(), 0u32)
                    .map_err(|e| anyhow!("Failed to init counter: {}", e))?;
                claims.insert(key.as_str(), false)
                    .map_err(|e| anyhow!("Failed to init claim flag: {}", e))?;
            }
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        info!("Created user {} ({})", profile.user_id, profile.username);
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.load_user(user_id)
    }

    async fn record_scan_visit(&self, user_id: &str) -> Result<u64> {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let total;
        {
            let mut table = write_txn.open_table(USERS)
                .map_err(|e| anyhow!("Failed to open users table: {}", e))?;
            let mut profile: UserProfile = match table.get(user_id)
                .map_err(|e| anyhow!("Failed to get user: {}", e))?
            {
                Some(value) => decode(value.value(), "user")?,
                None => return Err(anyhow!("User not found: {}", user_id)),
            };
            profile.total_scans += 1;
            profile.last_scan_at = Some(Utc::now());
            total = profile.total_scans;

            let value = encode(&profile, "user")?;
            table.insert(user_id, value.as_slice())
                .map_err(|e| anyhow!("Failed to insert user: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("User {} total scans: {}", user_id, total);
        Ok(total)
    }

    async fn increment_item_count(&self, user_id: &str, item_id: &str) -> Result<u32> {
        check_id(item_id, "item")?;
        let key = user_key(user_id, item_id);

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let count;
        {
            let mut table = write_txn.open_table(COUNTERS)
                .map_err(|e| anyhow!("Failed to open counters table: {}", e))?;
            let current = table.get(key.as_str())
                .map_err(|e| anyhow!("Failed to get counter: {}", e))?
                .map(|v| v.value())
                .unwrap_or(0);
            count = current.saturating_add(1);
            table.insert(key.as_str(), count)
                .map_err(|e| anyhow!("Failed to update counter: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("{} count for {} is now {}", item_id, user_id, count);
        Ok(count)
    }

    async fn is_reward_claimed(&self, user_id: &str, item_id: &str) -> Result<bool> {
        let key = user_key(user_id, item_id);

        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(CLAIMS)
            .map_err(|e| anyhow!("Failed to open claims table: {}", e))?;
        let claimed = table.get(key.as_str())
            .map_err(|e| anyhow!("Failed to get claim flag: {}", e))?
            .map(|v| v.value())
            .unwrap_or(false);
        Ok(claimed)
    }

    async fn mark_unlock_notified(&self, user_id: &str, item_id: &str) -> Result<bool> {
        let key = user_key(user_id, item_id);

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(UNLOCKS)
                .map_err(|e| anyhow!("Failed to open unlocks table: {}", e))?;
            let already = table.get(key.as_str())
                .map_err(|e| anyhow!("Failed to get unlock marker: {}", e))?
                .map(|v| v.value())
                .unwrap_or(false);
            if already {
                return Ok(true);
            }
            table.insert(key.as_str(), true)
                .map_err(|e| anyhow!("Failed to set unlock marker: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Unlock of {} announced to {}", item_id, user_id);
        Ok(false)
    }

    async fn claim_reward(&self, user_id: &str, voucher: &Voucher) -> Result<Option<String>> {
        let flag_key = user_key(user_id, &voucher.item_id);
        let voucher_key = push_key();
        let value = encode(voucher, "voucher")?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut claims = write_txn.open_table(CLAIMS)
                .map_err(|e| anyhow!("Failed to open claims table: {}", e))?;
            let already = claims.get(flag_key.as_str())
                .map_err(|e| anyhow!("Failed to get claim flag: {}", e))?
                .map(|v| v.value())
                .unwrap_or(false);
            if already {
                debug!("Reward for {} already claimed by {}", voucher.item_id, user_id);
                return Ok(None);
            }
            claims.insert(flag_key.as_str(), true)
                .map_err(|e| anyhow!("Failed to set claim flag: {}", e))?;

            let mut vouchers = write_txn.open_table(VOUCHERS)
                .map_err(|e| anyhow!("Failed to open vouchers table: {}", e))?;
            vouchers.insert(user_key(user_id, &voucher_key).as_str(), value.as_slice())
                .map_err(|e| anyhow!("Failed to insert voucher: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        info!("Issued voucher {} to {} for {}", voucher.code, user_id, voucher.item_id);
        Ok(Some(voucher_key))
    }

    async fn vouchers(&self, user_id: &str) -> Result<Vec<VoucherEntry>> {
        self.read_vouchers(user_id)
    }

    async fn claim_flags(&self, user_id: &str) -> Result<BTreeMap<String, bool>> {
        self.read_claims(user_id)
    }

    async fn collection(&self, user_id: &str) -> Result<BTreeMap<String, u32>> {
        self.read_counters(user_id)
    }

    async fn item_stats(&self) -> Result<Vec<(String, ItemStats)>> {
        Ok(self
            .list_items()?
            .into_iter()
            .map(|item| {
                let stats = ItemStats {
                    drop_rate: item.drop_rate,
                    reward_threshold: item.reward_threshold,
                };
                (item.id, stats)
            })
            .collect())
    }
}
