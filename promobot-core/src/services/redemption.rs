// promobot-core/src/services/redemption.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};

use crate::repositories::UserRepository;
use crate::services::EpochMonitor;
use crate::Error;

/// Coordinates a promo-code redemption across the in-memory epoch monitor
/// and the durable user store. The quota reservation is optimistic and
/// reverted if the storage write fails; balances are only ever touched
/// inside the atomic storage step.
pub struct RedemptionService {
    monitor: Arc<EpochMonitor>,
    users: Arc<dyn UserRepository + Send + Sync>,
    storage_timeout: Duration,
}

impl RedemptionService {
    pub fn new(
        monitor: Arc<EpochMonitor>,
        users: Arc<dyn UserRepository + Send + Sync>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            monitor,
            users,
            storage_timeout,
        }
    }

    /// Redeems `code` for `redeemer_id` and returns the reward paid out to
    /// each side. No retry on failure; the caller sees the original error.
    pub async fn redeem(&self, redeemer_id: &str, code: &str) -> Result<i64, Error> {
        // Reserve first: validating eligibility without reserving would let
        // two concurrent redeemers both see the same last unit of quota.
        let reward = self.monitor.reserve().await?;

        let applied = timeout(
            self.storage_timeout,
            self.users.apply_redemption(redeemer_id, code, reward),
        )
        .await;

        let err = match applied {
            Ok(Ok(())) => {
                info!(user = redeemer_id, code, reward, "promo code redeemed");
                return Ok(reward);
            }
            Ok(Err(e)) => e,
            Err(elapsed) => Error::Timeout(elapsed),
        };

        // The storage step failed, so the reservation must be handed back.
        // Compensation is best-effort; its own failure only skews quota
        // accounting, never balances.
        if let Err(release_err) = self.monitor.release().await {
            warn!("failed to release reservation: {release_err}");
        }

        Err(err)
    }
}
