use async_trait::async_trait;
use chrono::NaiveDate;
use quiz_core::model::{DailyTask, Subject, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, parse_subject, parse_user, ser, u32_from_i64};
use crate::repository::{DailyTaskRepository, StorageError};

#[async_trait]
impl DailyTaskRepository for SqliteRepository {
    async fn get_task(
        &self,
        user_id: &UserId,
        subject: Subject,
    ) -> Result<Option<DailyTask>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, subject, day, used, daily_limit
            FROM daily_tasks
            WHERE user_id = ?1 AND subject = ?2
            ",
        )
        .bind(user_id.as_str())
        .bind(subject.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn save_task(&self, task: &DailyTask) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO daily_tasks (user_id, subject, day, used, daily_limit)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, subject) DO UPDATE SET
                day = excluded.day,
                used = excluded.used,
                daily_limit = excluded.daily_limit
            ",
        )
        .bind(task.user_id.as_str())
        .bind(task.subject.as_str())
        .bind(task.day)
        .bind(i64::from(task.used()))
        .bind(i64::from(task.limit()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn list_tasks(&self, user_id: &UserId) -> Result<Vec<DailyTask>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, subject, day, used, daily_limit
            FROM daily_tasks
            WHERE user_id = ?1
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut tasks = rows
            .iter()
            .map(task_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        tasks.sort_by_key(|t| t.subject);
        Ok(tasks)
    }
}

fn task_from_row(row: &SqliteRow) -> Result<DailyTask, StorageError> {
    let day: NaiveDate = row.try_get("day").map_err(ser)?;
    Ok(DailyTask::from_persisted(
        parse_user(row)?,
        parse_subject(row)?,
        day,
        u32_from_i64("used", row.try_get("used").map_err(ser)?)?,
        u32_from_i64("daily_limit", row.try_get("daily_limit").map_err(ser)?)?,
    ))
}
