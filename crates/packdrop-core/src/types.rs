//! ============================================================================
//! Core Types for PackDrop
//! ============================================================================
//! Defines the catalog, collection, voucher and AR event structures.
//! Everything crossing the storage boundary is a typed serde struct.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::ScanError;
use crate::reward;

/// Prefix for generated voucher codes
pub const VOUCHER_PREFIX: &str = "OCK";

/// Length of the random part of a voucher code
const VOUCHER_CODE_LEN: usize = 6;

// ============================================================================
// Catalog
// ============================================================================

/// Rarity tier of a collectible item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Legendary,
}

impl Rarity {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "common" => Some(Self::Common),
            "uncommon" => Some(Self::Uncommon),
            "rare" => Some(Self::Rare),
            "legendary" => Some(Self::Legendary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Legendary => "legendary",
        }
    }

    /// Upper-case label shown on item cards
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Common => "COMMON",
            Self::Uncommon => "UNCOMMON",
            Self::Rare => "RARE",
            Self::Legendary => "LEGENDARY",
        }
    }

    /// Line shown under the item name after a scan
    pub fn announcement(&self) -> &'static str {
        match self {
            Self::Common => "Common Item",
            Self::Uncommon => "⭐ Uncommon Item!",
            Self::Rare => "⭐⭐ RARE ITEM!",
            Self::Legendary => "⭐⭐⭐ LEGENDARY ITEM!!!",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Common => 0,
            Self::Uncommon => 1,
            Self::Rare => 2,
            Self::Legendary => 3,
        }
    }
}

impl PartialOrd for Rarity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rarity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// A collectible item in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rarity: Rarity,
    /// Weight for the drop roll (not a percentage)
    pub drop_rate: u32,
    /// How many of this item unlock its reward
    pub reward_threshold: u32,
    /// E.g. "$5 Off Voucher"
    pub reward_description: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ItemRecord {
    pub fn new(
        id: &str,
        name: &str,
        description: &str,
        rarity: Rarity,
        drop_rate: u32,
        reward_threshold: u32,
        reward_description: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            rarity,
            drop_rate,
            reward_threshold,
            reward_description: reward_description.to_string(),
            image_url: None,
        }
    }

    /// Reject records that would break the scan path
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.id.trim().is_empty() {
            return Err(ScanError::InvalidItem("item id is empty".into()));
        }
        if self.id.contains('/') {
            return Err(ScanError::InvalidItem(format!(
                "item id '{}' must not contain '/'",
                self.id
            )));
        }
        if self.reward_threshold == 0 {
            return Err(ScanError::InvalidItem(format!(
                "item '{}' has a zero reward threshold",
                self.id
            )));
        }
        Ok(())
    }
}

/// Drop rate and threshold as edited by the admin surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStats {
    pub drop_rate: u32,
    pub reward_threshold: u32,
}

// ============================================================================
// Scan results
// ============================================================================

/// Outcome of a single scan, handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub item_id: String,
    pub item_name: String,
    pub rarity: Rarity,
    /// Counter value after this scan
    pub new_count: u32,
    pub is_first_time: bool,
    /// The counter just reached the threshold with the reward unclaimed
    pub reward_unlocked: bool,
    pub reward_earned: Option<String>,
    /// Issued only when rewards are claimed at unlock time
    pub voucher: Option<Voucher>,
    pub scanned_at: DateTime<Utc>,
}

impl ScanResult {
    pub fn new(item: &ItemRecord, new_count: u32) -> Self {
        Self {
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            rarity: item.rarity,
            new_count,
            is_first_time: new_count == 1,
            reward_unlocked: false,
            reward_earned: None,
            voucher: None,
            scanned_at: Utc::now(),
        }
    }

    /// Multi-line message for the collection notification card
    pub fn congrats_message(&self, item: &ItemRecord) -> String {
        let mut message = format!("You got {}!", self.item_name);

        if self.is_first_time {
            message.push_str("\n✨ NEW! First time getting this item!");
        }
        message.push('\n');
        message.push_str(self.rarity.announcement());

        // A zero count means the counter has not come back yet
        let shown = self.new_count.max(1);
        message.push_str(&format!("\n\nProgress: {}/{}", shown, item.reward_threshold));

        let remaining = reward::remaining(shown, item.reward_threshold);
        if self.reward_unlocked {
            message.push_str("\n\n🎉 REWARD UNLOCKED!");
            if let Some(earned) = &self.reward_earned {
                message.push_str(&format!("\n🎁 {}", earned));
            }
            message.push_str("\n💡 Check your Rewards screen!");
        } else if remaining > 0 {
            message.push_str(&format!(
                "\n({} more for {})",
                remaining, item.reward_description
            ));
        }

        message
    }

    pub fn should_play_special_animation(&self) -> bool {
        self.rarity >= Rarity::Rare || self.is_first_time || self.reward_unlocked
    }
}

// ============================================================================
// Rewards
// ============================================================================

/// Redeemable record created when a reward is claimed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub code: String,
    pub description: String,
    pub item_id: String,
    pub issued_at: DateTime<Utc>,
}

impl Voucher {
    pub fn issue(item: &ItemRecord) -> Self {
        Self {
            code: generate_voucher_code(),
            description: item.reward_description.clone(),
            item_id: item.id.clone(),
            issued_at: Utc::now(),
        }
    }

    /// Issue date in the dd/mm/yyyy form printed on vouchers
    pub fn issue_date(&self) -> String {
        self.issued_at.format("%d/%m/%Y").to_string()
    }
}

/// A voucher together with its push-generated key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherEntry {
    pub key: String,
    pub voucher: Voucher,
}

/// `OCK-` followed by six upper-case hex characters
pub fn generate_voucher_code() -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{}-{}", VOUCHER_PREFIX, &raw[..VOUCHER_CODE_LEN])
}

/// Key under which claim flags are exported, e.g. `curry_puff_reward`
pub fn reward_key(item_id: &str) -> String {
    format!("{}_reward", item_id)
}

/// When the claim flag for an unlocked reward gets set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClaimPolicy {
    /// Only when the user presses "Claim"
    #[default]
    OnClaim,
    /// As soon as the scan path detects the unlock; a voucher is issued with it
    OnUnlock,
}

impl ClaimPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "on_claim" | "claim" => Some(Self::OnClaim),
            "on_unlock" | "unlock" => Some(Self::OnUnlock),
            _ => None,
        }
    }
}

// ============================================================================
// Users
// ============================================================================

/// Profile record for a signed-up user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub total_scans: u64,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: &str, username: &str, email: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            total_scans: 0,
            last_scan_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Aggregated collection numbers for the profile screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_scans: u64,
    pub unique_items: usize,
    pub total_items: u64,
    pub completion_percent: f32,
    pub claimed_rewards: usize,
}

// ============================================================================
// AR events
// ============================================================================

/// Tracking quality reported by the AR engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    None,
    Limited,
    Tracking,
}

/// Position and rotation (quaternion xyzw) of a tracked marker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerEventKind {
    Added,
    Updated,
    Removed,
}

/// Tracked-image change reported by the AR engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerEvent {
    pub kind: MarkerEventKind,
    pub marker: String,
    pub tracking: TrackingState,
    pub pose: Pose,
}

impl MarkerEvent {
    pub fn tracking(marker: &str, pose: Pose) -> Self {
        Self {
            kind: MarkerEventKind::Updated,
            marker: marker.to_string(),
            tracking: TrackingState::Tracking,
            pose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn puff() -> ItemRecord {
        ItemRecord::new(
            "curry_puff",
            "Curry Puff",
            "Crispy golden crust",
            Rarity::Common,
            40,
            10,
            "$5 Off Voucher",
        )
    }

    #[test]
    fn test_rarity_ordering() {
        assert!(Rarity::Common < Rarity::Uncommon);
        assert!(Rarity::Uncommon < Rarity::Rare);
        assert!(Rarity::Rare < Rarity::Legendary);
    }

    #[test]
    fn test_rarity_parse() {
        assert_eq!(Rarity::from_str("LEGENDARY"), Some(Rarity::Legendary));
        assert_eq!(Rarity::from_str("epic"), None);
        assert_eq!(Rarity::Uncommon.as_str(), "uncommon");
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut item = puff();
        item.reward_threshold = 0;
        assert!(matches!(item.validate(), Err(ScanError::InvalidItem(_))));
        assert!(puff().validate().is_ok());
    }

    #[test]
    fn test_voucher_code_format() {
        let code = generate_voucher_code();
        assert!(code.starts_with("OCK-"));
        assert_eq!(code.len(), 10);
        assert!(code[4..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_congrats_message_progress() {
        let item = puff();
        let result = ScanResult::new(&item, 1);
        let msg = result.congrats_message(&item);
        assert!(msg.starts_with("You got Curry Puff!"));
        assert!(msg.contains("NEW!"));
        assert!(msg.contains("Progress: 1/10"));
        assert!(msg.contains("(9 more for $5 Off Voucher)"));
    }

    #[test]
    fn test_congrats_message_unlock() {
        let item = puff();
        let mut result = ScanResult::new(&item, 10);
        result.reward_unlocked = true;
        result.reward_earned = Some(item.reward_description.clone());
        let msg = result.congrats_message(&item);
        assert!(!msg.contains("NEW!"));
        assert!(msg.contains("REWARD UNLOCKED!"));
        assert!(msg.contains("🎁 $5 Off Voucher"));
        assert!(result.should_play_special_animation());
    }

    #[test]
    fn test_special_animation() {
        let item = puff();
        assert!(!ScanResult::new(&item, 3).should_play_special_animation());
        let mut legendary = item.clone();
        legendary.rarity = Rarity::Legendary;
        assert!(ScanResult::new(&legendary, 3).should_play_special_animation());
    }

    #[test]
    fn test_claim_policy_parse() {
        assert_eq!(ClaimPolicy::from_str("on-unlock"), Some(ClaimPolicy::OnUnlock));
        assert_eq!(ClaimPolicy::from_str("on_claim"), Some(ClaimPolicy::OnClaim));
        assert_eq!(ClaimPolicy::from_str("never"), None);
    }
}
