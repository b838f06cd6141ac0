// promobot-common/src/models/epoch.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest reward epoch; epoch ids run 1..=MAX_EPOCH and the last one
/// has no successor.
pub const MAX_EPOCH: i32 = 5;

/// One fixed tier of the reward schedule.
#[derive(Debug, Clone, Copy)]
pub struct EpochTier {
    pub id: i32,
    pub reward: i64,
    pub usage_quota: i64,
}

/// The static reward schedule. Each entry lists the per-redemption reward
/// and the total number of redemptions payable at that rate.
pub const REWARD_TABLE: [EpochTier; MAX_EPOCH as usize] = [
    EpochTier { id: 1, reward: 1000, usage_quota: 500 },
    EpochTier { id: 2, reward: 900, usage_quota: 2000 },
    EpochTier { id: 3, reward: 800, usage_quota: 2500 },
    EpochTier { id: 4, reward: 700, usage_quota: 10000 },
    EpochTier { id: 5, reward: 600, usage_quota: 10000 },
];

/// Looks up a tier of the reward schedule by epoch id.
pub fn reward_tier(id: i32) -> Option<EpochTier> {
    if !(1..=MAX_EPOCH).contains(&id) {
        return None;
    }
    Some(REWARD_TABLE[(id - 1) as usize])
}

/// A reward epoch as stored and as held in memory by the monitor.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Epoch {
    pub epoch_id: i32,
    pub reward: i64,
    pub usage_quota: i64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Epoch {
    /// Activates an epoch from the reward schedule, stamping it as started
    /// now. Returns `None` for ids outside the schedule.
    pub fn activate(id: i32) -> Option<Self> {
        let tier = reward_tier(id)?;
        let now = Utc::now();
        Some(Self {
            epoch_id: tier.id,
            reward: tier.reward,
            usage_quota: tier.usage_quota,
            started_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_table_is_ordered_and_positive() {
        for (i, tier) in REWARD_TABLE.iter().enumerate() {
            assert_eq!(tier.id, i as i32 + 1);
            assert!(tier.reward > 0);
            assert!(tier.usage_quota > 0);
        }
    }

    #[test]
    fn activate_out_of_range_is_none() {
        assert!(Epoch::activate(0).is_none());
        assert!(Epoch::activate(MAX_EPOCH + 1).is_none());
    }

    #[test]
    fn activate_copies_the_tier() {
        let epoch = Epoch::activate(2).unwrap();
        assert_eq!(epoch.epoch_id, 2);
        assert_eq!(epoch.reward, 900);
        assert_eq!(epoch.usage_quota, 2000);
    }
}
