//! ============================================================================
//! Reward Unlock Checker
//! ============================================================================
//! A reward is reported exactly at the boundary: the updated count must
//! equal the threshold, the claim flag must still be unset and the unlock
//! must not have been announced before. Counts that skip past the threshold
//! (admin edits, races) never notify.
//! ============================================================================

/// Whether a scan that produced `count` should announce the reward
pub fn is_newly_unlocked(
    count: u32,
    threshold: u32,
    already_claimed: bool,
    already_notified: bool,
) -> bool {
    count == threshold && !already_claimed && !already_notified
}

/// Whether the user may press "Claim" for this item
pub fn is_claimable(count: u32, threshold: u32, already_claimed: bool) -> bool {
    count >= threshold && !already_claimed
}

/// Items still needed before the reward unlocks
pub fn remaining(count: u32, threshold: u32) -> u32 {
    threshold.saturating_sub(count)
}
