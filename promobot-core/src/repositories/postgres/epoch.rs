// promobot-core/src/repositories/postgres/epoch.rs

use promobot_common::models::Epoch;
use sqlx::{Pool, Postgres};

use crate::Error;

/// Durable store for reward epochs. The row with the highest id is the
/// current one.
#[async_trait::async_trait]
pub trait EpochRepository {
    async fn find_current(&self) -> Result<Epoch, Error>;
    async fn find_by_id(&self, id: i32) -> Result<Epoch, Error>;
    async fn upsert(&self, epoch: &Epoch) -> Result<(), Error>;
}

pub struct PostgresEpochRepository {
    pool: Pool<Postgres>,
}

impl PostgresEpochRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl EpochRepository for PostgresEpochRepository {
    async fn find_current(&self) -> Result<Epoch, Error> {
        let row = sqlx::query_as::<_, Epoch>(
            r#"
            SELECT epoch_id, reward, usage_quota, started_at, updated_at
            FROM epochs
            ORDER BY epoch_id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::NotFound("Epoch not found.".to_string()))
    }

    async fn find_by_id(&self, id: i32) -> Result<Epoch, Error> {
        let row = sqlx::query_as::<_, Epoch>(
            r#"
            SELECT epoch_id, reward, usage_quota, started_at, updated_at
            FROM epochs
            WHERE epoch_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::NotFound("Epoch not found.".to_string()))
    }

    async fn upsert(&self, epoch: &Epoch) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO epochs (epoch_id, reward, usage_quota, started_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (epoch_id) DO UPDATE
            SET reward = EXCLUDED.reward,
                usage_quota = EXCLUDED.usage_quota,
                started_at = EXCLUDED.started_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(epoch.epoch_id)
        .bind(epoch.reward)
        .bind(epoch.usage_quota)
        .bind(epoch.started_at)
        .bind(epoch.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
