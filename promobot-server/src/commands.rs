// promobot-server/src/commands.rs
//
// Line-oriented command dispatcher, standing in for the chat-platform
// collaborator. Every command is handled in-process against the services.

use std::sync::Arc;

use tracing::error;

use promobot_core::services::{EpochMonitor, RedemptionService, UserService};
use promobot_core::Error;

const USAGE: &str = "commands:\n  \
    register <user>\n  \
    promo <user> <code>\n  \
    use <user> <code>\n  \
    user <id>\n  \
    epoch [id]\n  \
    balance <user> <delta>";

pub struct CommandHandler {
    users: Arc<UserService>,
    redemption: Arc<RedemptionService>,
    monitor: Arc<EpochMonitor>,
}

impl CommandHandler {
    pub fn new(
        users: Arc<UserService>,
        redemption: Arc<RedemptionService>,
        monitor: Arc<EpochMonitor>,
    ) -> Self {
        Self {
            users,
            redemption,
            monitor,
        }
    }

    pub async fn dispatch(&self, line: &str) -> String {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[..] {
            ["register", user] => self.register(user).await,
            ["promo", user, code] => self.create_promo(user, code).await,
            ["use", user, code] => self.redeem(user, code).await,
            ["user", id] => self.user_info(id).await,
            ["epoch"] => self.epoch(None).await,
            ["epoch", id] => self.epoch(Some(id)).await,
            ["balance", user, delta] => self.adjust_balance(user, delta).await,
            _ => USAGE.to_string(),
        }
    }

    async fn register(&self, user: &str) -> String {
        match self.users.register(user).await {
            Ok(()) => "You have successfully registered!".to_string(),
            Err(e) => render_error(e),
        }
    }

    async fn create_promo(&self, user: &str, code: &str) -> String {
        match self.users.create_promo_code(user, code).await {
            Ok(()) => format!("Promo code `{code}` created."),
            Err(e) => render_error(e),
        }
    }

    async fn redeem(&self, user: &str, code: &str) -> String {
        match self.redemption.redeem(user, code).await {
            Ok(reward) => {
                format!("You used promo code `{code}` and received {reward} DUR.")
            }
            Err(e) => render_error(e),
        }
    }

    async fn user_info(&self, id: &str) -> String {
        match self.users.get_user(id).await {
            Ok(user) => format!(
                "User {}: balance {} DUR, promo code {}, used {}",
                user.user_id,
                user.balance,
                user.promo_code.as_deref().unwrap_or("-"),
                user.used_code.as_deref().unwrap_or("-"),
            ),
            Err(e) => render_error(e),
        }
    }

    async fn epoch(&self, id: Option<&str>) -> String {
        let id = match id {
            Some(raw) => match raw.parse::<i32>() {
                Ok(id) => Some(id),
                Err(_) => {
                    return render_error(Error::InvalidArgument(
                        "Epoch id must be a number.".to_string(),
                    ))
                }
            },
            None => None,
        };

        match self.monitor.describe(id, id.is_none()).await {
            Ok(epoch) => format!(
                "Epoch {}: reward {} DUR, {} uses left (started {})",
                epoch.epoch_id,
                epoch.reward,
                epoch.usage_quota,
                epoch.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            ),
            Err(e) => render_error(e),
        }
    }

    async fn adjust_balance(&self, user: &str, delta: &str) -> String {
        let delta = match delta.parse::<i64>() {
            Ok(delta) => delta,
            Err(_) => {
                return render_error(Error::InvalidArgument(
                    "The amount must be a number.".to_string(),
                ))
            }
        };

        match self.users.adjust_balance(user, delta).await {
            Ok(()) => "The user balance has been updated.".to_string(),
            Err(e) => render_error(e),
        }
    }
}

/// Domain failures carry their own user-facing wording; anything else is
/// logged in full and surfaced generically.
fn render_error(err: Error) -> String {
    match &err {
        Error::NotFound(_) | Error::AlreadyExists(_) | Error::InvalidArgument(_) => {}
        other => error!("command failed: {other}"),
    }
    err.user_message()
}
