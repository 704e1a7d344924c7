use async_trait::async_trait;
use quiz_core::model::{Subject, Topic, TopicId, ValidatedTopic};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, id_i64, parse_subject, ser, topic_id_from_i64};
use crate::repository::{StorageError, TopicRepository};

// Keeps SQL ordering aligned with `Subject`'s declaration order.
const SUBJECT_ORDER: &str = "CASE subject WHEN 'math' THEN 0 WHEN 'chinese' THEN 1 \
                             WHEN 'english' THEN 2 ELSE 3 END";

#[async_trait]
impl TopicRepository for SqliteRepository {
    async fn insert_topic(&self, topic: ValidatedTopic) -> Result<Topic, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO topics (subject, grade, unit, name, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(topic.subject.as_str())
        .bind(i64::from(topic.grade))
        .bind(&topic.unit)
        .bind(&topic.name)
        .bind(&topic.description)
        .bind(topic.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(topic.assign_id(topic_id_from_i64(res.last_insert_rowid())?))
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, subject, grade, unit, name, description, created_at
            FROM topics WHERE id = ?1
            ",
        )
        .bind(id_i64("topic_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(topic_from_row).transpose()
    }

    async fn list_topics(&self, subject: Option<Subject>) -> Result<Vec<Topic>, StorageError> {
        let sql = format!(
            "SELECT id, subject, grade, unit, name, description, created_at \
             FROM topics \
             WHERE ?1 IS NULL OR subject = ?1 \
             ORDER BY {SUBJECT_ORDER}, grade ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(subject.map(Subject::as_str))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(topic_from_row).collect()
    }

    async fn update_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE topics
            SET subject = ?1, grade = ?2, unit = ?3, name = ?4, description = ?5
            WHERE id = ?6
            ",
        )
        .bind(topic.subject.as_str())
        .bind(i64::from(topic.grade))
        .bind(&topic.unit)
        .bind(&topic.name)
        .bind(&topic.description)
        .bind(id_i64("topic_id", topic.id.value())?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_topic(&self, id: TopicId) -> Result<(), StorageError> {
        // Seed questions go with the topic via ON DELETE CASCADE.
        let res = sqlx::query("DELETE FROM topics WHERE id = ?1")
            .bind(id_i64("topic_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

fn topic_from_row(row: &SqliteRow) -> Result<Topic, StorageError> {
    let grade: i64 = row.try_get("grade").map_err(ser)?;
    Ok(Topic {
        id: topic_id_from_i64(row.try_get("id").map_err(ser)?)?,
        subject: parse_subject(row)?,
        grade: u8::try_from(grade)
            .map_err(|_| StorageError::Serialization(format!("invalid grade: {grade}")))?,
        unit: row.try_get("unit").map_err(ser)?,
        name: row.try_get("name").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}
