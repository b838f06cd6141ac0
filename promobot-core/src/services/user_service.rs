// promobot-core/src/services/user_service.rs

use std::sync::Arc;

use promobot_common::models::User;
use tracing::info;

use crate::repositories::UserRepository;
use crate::Error;

pub struct UserService {
    users: Arc<dyn UserRepository + Send + Sync>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository + Send + Sync>) -> Self {
        Self { users }
    }

    /// Registers a new user with an empty balance.
    pub async fn register(&self, user_id: &str) -> Result<(), Error> {
        self.users.create_user(&User::new(user_id)).await?;
        info!(user = user_id, "registered user");
        Ok(())
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, Error> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found.".to_string()))
    }

    /// Sets the user's own promo code; first write wins.
    pub async fn create_promo_code(&self, user_id: &str, code: &str) -> Result<(), Error> {
        User::validate_promo_code(code)?;
        self.users.update_promo_code(user_id, code).await?;
        info!(user = user_id, code, "created promo code");
        Ok(())
    }

    /// Administrative balance change, outside the redemption path.
    pub async fn adjust_balance(&self, user_id: &str, delta: i64) -> Result<(), Error> {
        self.users.adjust_balance(user_id, delta).await?;
        info!(user = user_id, delta, "adjusted balance");
        Ok(())
    }
}
