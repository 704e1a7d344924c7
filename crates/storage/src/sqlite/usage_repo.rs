use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{UsageEvent, UsageKind, UserId};
use sqlx::Row;

use crate::repository::{StorageError, UsageLogRepository};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, ser};

#[async_trait]
impl UsageLogRepository for SqliteRepository {
    async fn append_usage(&self, event: &UsageEvent) -> Result<i64, StorageError> {
        let topic = event
            .topic_id
            .map(|id| id_i64("topic_id", id.value()))
            .transpose()?;

        let result = sqlx::query(
            r"
            INSERT INTO usage_logs (user_id, subject, topic_id, kind, correct, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(event.user_id.as_str())
        .bind(event.subject.as_str())
        .bind(topic)
        .bind(event.kind.as_str())
        .bind(event.correct.map(i64::from))
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(result.last_insert_rowid())
    }

    async fn count_since(
        &self,
        user_id: &UserId,
        kind: UsageKind,
        since: DateTime<Utc>,
    ) -> Result<u32, StorageError> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) as count
            FROM usage_logs
            WHERE user_id = ?1 AND kind = ?2 AND created_at >= ?3
            ",
        )
        .bind(user_id.as_str())
        .bind(kind.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        let count: i64 = row.try_get("count").map_err(ser)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
