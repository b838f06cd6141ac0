// promobot-core/src/services/epoch_monitor.rs

use std::sync::Arc;

use chrono::Utc;
use promobot_common::models::{Epoch, MAX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::repositories::EpochRepository;
use crate::Error;

/// In-memory state of the current reward epoch. `dirty` is set whenever
/// `current` has mutations the store has not seen yet; `seq` counts those
/// mutations so a flush can tell whether new ones landed while its upsert
/// was in flight.
struct MonitorState {
    current: Option<Epoch>,
    dirty: bool,
    seq: u64,
}

/// Hands out reward reservations one at a time, advancing to the next
/// epoch when a tier is exhausted. The in-memory view is authoritative for
/// reservation decisions; the persisted record may lag it until the next
/// flush.
pub struct EpochMonitor {
    repos: Arc<dyn EpochRepository + Send + Sync>,
    state: Mutex<MonitorState>,
}

impl EpochMonitor {
    pub fn new(repos: Arc<dyn EpochRepository + Send + Sync>) -> Self {
        Self {
            repos,
            state: Mutex::new(MonitorState {
                current: None,
                dirty: false,
                seq: 0,
            }),
        }
    }

    fn not_synced() -> Error {
        Error::Internal("epoch monitor has not been synced".to_string())
    }

    /// Loads the most recent epoch from the store. Must run once before any
    /// `reserve`/`release` call.
    pub async fn sync(&self) -> Result<(), Error> {
        let epoch = self
            .repos
            .find_current()
            .await
            .map_err(|e| Error::Internal(format!("failed to load current epoch: {e}")))?;

        info!(epoch = epoch.epoch_id, quota = epoch.usage_quota, "synced epoch monitor");

        let mut state = self.state.lock().await;
        state.current = Some(epoch);
        state.dirty = false;
        state.seq += 1;
        Ok(())
    }

    /// Claims one unit of quota and returns the reward it pays. Rolls over
    /// to the next epoch when the current one is depleted; at the last
    /// epoch the rewards are simply over.
    pub async fn reserve(&self) -> Result<i64, Error> {
        let mut state = self.state.lock().await;
        let current = state.current.as_mut().ok_or_else(Self::not_synced)?;

        if current.usage_quota == 0 {
            if current.epoch_id == MAX_EPOCH {
                return Err(Error::NotFound("Rewards are over!".to_string()));
            }

            // Persist the depleted epoch off the reservation path; a failure
            // here costs a stale row, never a reservation.
            let mut depleted = current.clone();
            depleted.updated_at = Utc::now();
            let repos = Arc::clone(&self.repos);
            tokio::spawn(async move {
                if let Err(e) = repos.upsert(&depleted).await {
                    error!(epoch = depleted.epoch_id, "error saving depleted epoch: {e}");
                }
            });

            let next = Epoch::activate(current.epoch_id + 1).ok_or_else(|| {
                Error::Internal(format!("no reward tier after epoch {}", current.epoch_id))
            })?;
            info!(from = current.epoch_id, to = next.epoch_id, "epoch rollover");
            *current = next;
        }

        current.usage_quota -= 1;
        let reward = current.reward;
        debug!(epoch = current.epoch_id, quota = current.usage_quota, "reserved reward");
        state.dirty = true;
        state.seq += 1;

        Ok(reward)
    }

    /// Returns one unit of quota to the current epoch, compensating a failed
    /// downstream redemption. If a rollover happened in between, the unit is
    /// credited to whichever epoch is current now.
    pub async fn release(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let current = state.current.as_mut().ok_or_else(Self::not_synced)?;

        current.usage_quota += 1;
        state.dirty = true;
        state.seq += 1;
        Ok(())
    }

    /// Persists the current epoch if it has unsaved mutations, or
    /// unconditionally when `force` is set. The upsert runs outside the
    /// lock so reservations are never blocked on storage.
    pub async fn flush(&self, force: bool) -> Result<(), Error> {
        let (snapshot, seq) = {
            let mut state = self.state.lock().await;
            if !state.dirty && !force {
                return Ok(());
            }
            let seq = state.seq;
            match state.current.as_mut() {
                Some(current) => {
                    current.updated_at = Utc::now();
                    (current.clone(), seq)
                }
                // Nothing has been synced yet, so nothing to persist.
                None => return Ok(()),
            }
        };

        self.repos.upsert(&snapshot).await?;
        debug!(epoch = snapshot.epoch_id, quota = snapshot.usage_quota, "flushed epoch");

        // Only the snapshotted mutations were persisted; a reservation that
        // landed while the upsert was in flight must stay marked unsaved.
        let mut state = self.state.lock().await;
        if state.seq == seq {
            state.dirty = false;
        }
        Ok(())
    }

    /// Read-only query: the in-memory current epoch, or a historical one
    /// fetched from the store.
    pub async fn describe(&self, id: Option<i32>, want_current: bool) -> Result<Epoch, Error> {
        if want_current {
            let state = self.state.lock().await;
            return state.current.clone().ok_or_else(Self::not_synced);
        }

        let id = id.ok_or_else(|| Error::InvalidArgument("Epoch id is required.".to_string()))?;
        if !(1..=MAX_EPOCH).contains(&id) {
            return Err(Error::InvalidArgument(format!(
                "There can be no more than {MAX_EPOCH} epochs."
            )));
        }

        self.repos.find_by_id(id).await
    }
}
