// promobot-common/src/models/user.rs

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Allowed promo code shape: 3-12 chars, lowercase alphanumeric plus `-_.`.
pub static PROMO_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9._-]{3,12}$").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Opaque chat-platform identity.
    pub user_id: String,
    /// The code this user shares with others; set at most once.
    pub promo_code: Option<String>,
    /// The code this user redeemed; set at most once, never changed.
    pub used_code: Option<String>,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            promo_code: None,
            used_code: None,
            balance: 0,
            created_at: Utc::now(),
        }
    }

    /// Checks a candidate promo code against the allowed pattern.
    pub fn validate_promo_code(code: &str) -> Result<(), Error> {
        if !PROMO_CODE_RE.is_match(code) {
            return Err(Error::InvalidArgument(
                "The promo code is invalid.".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_promo_codes() {
        for code in ["abc", "promo-123", "a.b_c", "123456789012"] {
            assert!(User::validate_promo_code(code).is_ok(), "{code}");
        }
    }

    #[test]
    fn invalid_promo_codes() {
        for code in ["ab", "1234567890123", "UPPER", "has space", "emoji🎉", ""] {
            assert!(User::validate_promo_code(code).is_err(), "{code:?}");
        }
    }
}
