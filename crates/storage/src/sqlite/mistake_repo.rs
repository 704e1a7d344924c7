use async_trait::async_trait;
use quiz_core::model::{MistakeId, MistakeRecord, NewMistake, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    conn, id_i64, map_question, mistake_id_from_i64, parse_subject, parse_user, question_columns,
    ser, topic_id_from_i64, u32_from_i64,
};
use crate::repository::{MistakeRepository, StorageError};

#[async_trait]
impl MistakeRepository for SqliteRepository {
    async fn append_mistake(&self, mistake: NewMistake) -> Result<MistakeRecord, StorageError> {
        let cols = question_columns(&mistake.question)?;
        let topic = mistake
            .topic_id
            .map(|id| id_i64("topic_id", id.value()))
            .transpose()?;

        let res = sqlx::query(
            r"
            INSERT INTO mistakes
                (user_id, subject, topic_id, question_text, answer, options_json, shape_json,
                 explanation, source, wrong_answer, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(mistake.user_id.as_str())
        .bind(mistake.subject.as_str())
        .bind(topic)
        .bind(cols.text)
        .bind(cols.answer)
        .bind(cols.options_json)
        .bind(cols.shape_json)
        .bind(cols.explanation)
        .bind(cols.source)
        .bind(&mistake.wrong_answer)
        .bind(mistake.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(mistake.assign_id(mistake_id_from_i64(res.last_insert_rowid())?))
    }

    async fn list_mistakes(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<MistakeRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, subject, topic_id, question_text, answer, options_json,
                   shape_json, explanation, source, wrong_answer, recorded_at
            FROM mistakes
            WHERE user_id = ?1
            ORDER BY id DESC
            LIMIT ?2
            ",
        )
        .bind(user_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(mistake_from_row).collect()
    }

    async fn count_mistakes(&self, user_id: &UserId) -> Result<u32, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM mistakes WHERE user_id = ?1")
            .bind(user_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;

        u32_from_i64("count", row.try_get("count").map_err(ser)?)
    }

    async fn delete_mistake(&self, user_id: &UserId, id: MistakeId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM mistakes WHERE id = ?1 AND user_id = ?2")
            .bind(id_i64("mistake_id", id.value())?)
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

fn mistake_from_row(row: &SqliteRow) -> Result<MistakeRecord, StorageError> {
    Ok(MistakeRecord {
        id: mistake_id_from_i64(row.try_get("id").map_err(ser)?)?,
        user_id: parse_user(row)?,
        subject: parse_subject(row)?,
        topic_id: row
            .try_get::<Option<i64>, _>("topic_id")
            .map_err(ser)?
            .map(topic_id_from_i64)
            .transpose()?,
        question: map_question(row)?,
        wrong_answer: row.try_get("wrong_answer").map_err(ser)?,
        recorded_at: row.try_get("recorded_at").map_err(ser)?,
    })
}
