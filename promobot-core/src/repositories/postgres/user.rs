// promobot-core/src/repositories/postgres/user.rs

use promobot_common::models::User;
use sqlx::{Pool, Postgres, Row};

use crate::Error;

/// Durable store for user records and the transactional redemption write.
#[async_trait::async_trait]
pub trait UserRepository {
    async fn create_user(&self, user: &User) -> Result<(), Error>;
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, Error>;
    /// Sets a user's own promo code, only if it is currently unset.
    async fn update_promo_code(&self, user_id: &str, code: &str) -> Result<(), Error>;
    /// Credits both sides of a redemption as a single atomic unit.
    async fn apply_redemption(
        &self,
        redeemer_id: &str,
        code: &str,
        reward: i64,
    ) -> Result<(), Error>;
    /// Administrative balance change; not part of the redemption path.
    async fn adjust_balance(&self, user_id: &str, delta: i64) -> Result<(), Error>;
}

pub struct PostgresUserRepository {
    pool: Pool<Postgres>,
}

impl PostgresUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

// Postgres error code for unique_violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create_user(&self, user: &User) -> Result<(), Error> {
        let res = sqlx::query(
            r#"
            INSERT INTO users (user_id, promo_code, used_code, balance, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.promo_code)
        .bind(&user.used_code)
        .bind(user.balance)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(Error::AlreadyExists("User already exists.".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, Error> {
        let row = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, promo_code, used_code, balance, created_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update_promo_code(&self, user_id: &str, code: &str) -> Result<(), Error> {
        let res = sqlx::query(
            r#"
            UPDATE users
            SET promo_code = $1
            WHERE user_id = $2 AND promo_code IS NULL
            "#,
        )
        .bind(code)
        .bind(user_id)
        .execute(&self.pool)
        .await;

        match res {
            Ok(done) if done.rows_affected() == 0 => Err(Error::NotFound(
                "User does not exist or has already created a promo code.".to_string(),
            )),
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists(
                "The promo code already exists.".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_redemption(
        &self,
        redeemer_id: &str,
        code: &str,
        reward: i64,
    ) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        // Lock the code owner's row for the duration of the transaction.
        let owner = sqlx::query(
            r#"
            SELECT user_id FROM users
            WHERE promo_code = $1
            FOR UPDATE
            "#,
        )
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?;

        let owner_id: String = match owner {
            Some(row) => row.try_get("user_id")?,
            None => return Err(Error::NotFound("Promo code not found.".to_string())),
        };

        if owner_id == redeemer_id {
            return Err(Error::InvalidArgument(
                "You can't use your own promo code.".to_string(),
            ));
        }

        // Mark the redeemer and credit them, only if they never redeemed.
        let updated = sqlx::query(
            r#"
            UPDATE users
            SET used_code = $1, balance = balance + $2
            WHERE user_id = $3 AND used_code IS NULL
            "#,
        )
        .bind(code)
        .bind(reward)
        .bind(redeemer_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Error::NotFound(
                "User not found or promo code already used.".to_string(),
            ));
        }

        // Credit the code owner.
        sqlx::query(
            r#"
            UPDATE users
            SET balance = balance + $1
            WHERE user_id = $2
            "#,
        )
        .bind(reward)
        .bind(&owner_id)
        .execute(&mut *tx)
        .await?;

        // Dropping `tx` before this point rolls everything back.
        tx.commit().await?;

        Ok(())
    }

    async fn adjust_balance(&self, user_id: &str, delta: i64) -> Result<(), Error> {
        let res = sqlx::query(
            r#"
            UPDATE users
            SET balance = balance + $1
            WHERE user_id = $2
            "#,
        )
        .bind(delta)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(Error::NotFound("User not found.".to_string()));
        }

        Ok(())
    }
}
