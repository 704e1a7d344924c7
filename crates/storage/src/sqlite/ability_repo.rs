use async_trait::async_trait;
use quiz_core::model::{AbilityScore, Subject, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, parse_subject, parse_user, ser, u32_from_i64};
use crate::repository::{AbilityRepository, StorageError};

#[async_trait]
impl AbilityRepository for SqliteRepository {
    async fn get_ability(
        &self,
        user_id: &UserId,
        subject: Subject,
    ) -> Result<Option<AbilityScore>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, subject, score, graded_count, updated_at
            FROM ability_scores
            WHERE user_id = ?1 AND subject = ?2
            ",
        )
        .bind(user_id.as_str())
        .bind(subject.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(ability_from_row).transpose()
    }

    async fn upsert_ability(&self, score: &AbilityScore) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO ability_scores (user_id, subject, score, graded_count, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, subject) DO UPDATE SET
                score = excluded.score,
                graded_count = excluded.graded_count,
                updated_at = excluded.updated_at
            ",
        )
        .bind(score.user_id.as_str())
        .bind(score.subject.as_str())
        .bind(score.score())
        .bind(i64::from(score.graded_count()))
        .bind(score.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn list_abilities(&self, user_id: &UserId) -> Result<Vec<AbilityScore>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, subject, score, graded_count, updated_at
            FROM ability_scores
            WHERE user_id = ?1
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut scores = rows
            .iter()
            .map(ability_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        scores.sort_by_key(|a| a.subject);
        Ok(scores)
    }
}

fn ability_from_row(row: &SqliteRow) -> Result<AbilityScore, StorageError> {
    Ok(AbilityScore::from_persisted(
        parse_user(row)?,
        parse_subject(row)?,
        row.try_get("score").map_err(ser)?,
        u32_from_i64("graded_count", row.try_get("graded_count").map_err(ser)?)?,
        row.try_get("updated_at").map_err(ser)?,
    ))
}
