use async_trait::async_trait;
use quiz_core::model::{Plan, Subscription, SubscriptionStatus, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, parse_user, ser};
use crate::repository::{StorageError, SubscriptionRepository};

#[async_trait]
impl SubscriptionRepository for SqliteRepository {
    async fn get_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, plan, status, customer_id, provider_subscription_id,
                   current_period_end, updated_at
            FROM subscriptions
            WHERE user_id = ?1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn find_by_provider_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, plan, status, customer_id, provider_subscription_id,
                   current_period_end, updated_at
            FROM subscriptions
            WHERE provider_subscription_id = ?1
            ",
        )
        .bind(provider_subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO subscriptions
                (user_id, plan, status, customer_id, provider_subscription_id,
                 current_period_end, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id) DO UPDATE SET
                plan = excluded.plan,
                status = excluded.status,
                customer_id = excluded.customer_id,
                provider_subscription_id = excluded.provider_subscription_id,
                current_period_end = excluded.current_period_end,
                updated_at = excluded.updated_at
            ",
        )
        .bind(subscription.user_id.as_str())
        .bind(subscription.plan.as_str())
        .bind(subscription.status.as_str())
        .bind(&subscription.customer_id)
        .bind(&subscription.provider_subscription_id)
        .bind(subscription.current_period_end)
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                StorageError::Conflict
            } else {
                conn(e)
            }
        })?;

        Ok(())
    }
}

fn subscription_from_row(row: &SqliteRow) -> Result<Subscription, StorageError> {
    let plan: String = row.try_get("plan").map_err(ser)?;
    let status: String = row.try_get("status").map_err(ser)?;
    Ok(Subscription {
        user_id: parse_user(row)?,
        plan: Plan::parse(&plan)
            .ok_or_else(|| StorageError::Serialization(format!("invalid plan: {plan}")))?,
        status: SubscriptionStatus::from_provider(&status),
        customer_id: row.try_get("customer_id").map_err(ser)?,
        provider_subscription_id: row.try_get("provider_subscription_id").map_err(ser)?,
        current_period_end: row.try_get("current_period_end").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}
