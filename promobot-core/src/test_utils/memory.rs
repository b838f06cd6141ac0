// promobot-core/src/test_utils/memory.rs
//
// In-memory stand-ins for the Postgres repositories. They implement the
// same contracts and additionally record write attempts and inject
// failures, so tests can observe flush behavior without real storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use promobot_common::models::{Epoch, User};

use crate::repositories::{EpochRepository, UserRepository};
use crate::Error;

#[derive(Default)]
pub struct MemoryEpochRepository {
    epochs: Mutex<HashMap<i32, Epoch>>,
    upserts: Mutex<Vec<Epoch>>,
    fail_upserts: AtomicBool,
    upsert_delay: Mutex<Option<Duration>>,
}

impl MemoryEpochRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an epoch directly, bypassing the upsert log.
    pub fn seed(&self, epoch: Epoch) {
        self.epochs.lock().unwrap().insert(epoch.epoch_id, epoch);
    }

    pub fn get(&self, id: i32) -> Option<Epoch> {
        self.epochs.lock().unwrap().get(&id).cloned()
    }

    /// Every upsert ever attempted, in order, including failed ones.
    pub fn upsert_attempts(&self) -> Vec<Epoch> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn set_fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    /// Delays every upsert, for exercising writes that overlap with new
    /// in-memory mutations.
    pub fn set_upsert_delay(&self, delay: Option<Duration>) {
        *self.upsert_delay.lock().unwrap() = delay;
    }
}

#[async_trait::async_trait]
impl EpochRepository for MemoryEpochRepository {
    async fn find_current(&self) -> Result<Epoch, Error> {
        let epochs = self.epochs.lock().unwrap();
        epochs
            .values()
            .max_by_key(|e| e.epoch_id)
            .cloned()
            .ok_or_else(|| Error::NotFound("Epoch not found.".to_string()))
    }

    async fn find_by_id(&self, id: i32) -> Result<Epoch, Error> {
        self.get(id)
            .ok_or_else(|| Error::NotFound("Epoch not found.".to_string()))
    }

    async fn upsert(&self, epoch: &Epoch) -> Result<(), Error> {
        let delay = *self.upsert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.upserts.lock().unwrap().push(epoch.clone());
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(Error::Internal("injected epoch store failure".to_string()));
        }
        self.epochs
            .lock()
            .unwrap()
            .insert(epoch.epoch_id, epoch.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryUserRepository {
    users: Mutex<HashMap<String, User>>,
    fail_redemptions: AtomicBool,
    redemption_delay: Mutex<Option<Duration>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<User> {
        self.users.lock().unwrap().get(user_id).cloned()
    }

    pub fn balance_of(&self, user_id: &str) -> i64 {
        self.get(user_id).map(|u| u.balance).unwrap_or(0)
    }

    /// Makes every `apply_redemption` fail after its checks would pass.
    pub fn set_fail_redemptions(&self, fail: bool) {
        self.fail_redemptions.store(fail, Ordering::SeqCst);
    }

    /// Delays `apply_redemption`, for exercising deadline handling.
    pub fn set_redemption_delay(&self, delay: Option<Duration>) {
        *self.redemption_delay.lock().unwrap() = delay;
    }
}

#[async_trait::async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create_user(&self, user: &User) -> Result<(), Error> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.user_id) {
            return Err(Error::AlreadyExists("User already exists.".to_string()));
        }
        if let Some(code) = &user.promo_code {
            if users.values().any(|u| u.promo_code.as_deref() == Some(code)) {
                return Err(Error::AlreadyExists(
                    "The promo code already exists.".to_string(),
                ));
            }
        }
        users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, Error> {
        Ok(self.get(user_id))
    }

    async fn update_promo_code(&self, user_id: &str, code: &str) -> Result<(), Error> {
        let mut users = self.users.lock().unwrap();
        // Same precedence as the SQL: the conditional write is attempted
        // first, so a missing or already-set user wins over a duplicate.
        match users.get(user_id) {
            Some(user) if user.promo_code.is_none() => {}
            _ => {
                return Err(Error::NotFound(
                    "User does not exist or has already created a promo code.".to_string(),
                ))
            }
        }
        if users
            .values()
            .any(|u| u.promo_code.as_deref() == Some(code))
        {
            return Err(Error::AlreadyExists(
                "The promo code already exists.".to_string(),
            ));
        }
        if let Some(user) = users.get_mut(user_id) {
            user.promo_code = Some(code.to_string());
        }
        Ok(())
    }

    async fn apply_redemption(
        &self,
        redeemer_id: &str,
        code: &str,
        reward: i64,
    ) -> Result<(), Error> {
        let delay = *self.redemption_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        // All-or-nothing under one lock, mirroring the transaction.
        let mut users = self.users.lock().unwrap();

        let owner_id = users
            .values()
            .find(|u| u.promo_code.as_deref() == Some(code))
            .map(|u| u.user_id.clone())
            .ok_or_else(|| Error::NotFound("Promo code not found.".to_string()))?;

        if owner_id == redeemer_id {
            return Err(Error::InvalidArgument(
                "You can't use your own promo code.".to_string(),
            ));
        }

        match users.get(redeemer_id) {
            Some(user) if user.used_code.is_none() => {}
            _ => {
                return Err(Error::NotFound(
                    "User not found or promo code already used.".to_string(),
                ))
            }
        }

        if self.fail_redemptions.load(Ordering::SeqCst) {
            return Err(Error::Internal("injected user store failure".to_string()));
        }

        if let Some(redeemer) = users.get_mut(redeemer_id) {
            redeemer.used_code = Some(code.to_string());
            redeemer.balance += reward;
        }
        if let Some(owner) = users.get_mut(&owner_id) {
            owner.balance += reward;
        }

        Ok(())
    }

    async fn adjust_balance(&self, user_id: &str, delta: i64) -> Result<(), Error> {
        let mut users = self.users.lock().unwrap();
        match users.get_mut(user_id) {
            Some(user) => {
                user.balance += delta;
                Ok(())
            }
            None => Err(Error::NotFound("User not found.".to_string())),
        }
    }
}
