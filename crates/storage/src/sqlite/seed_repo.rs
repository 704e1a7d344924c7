use async_trait::async_trait;
use quiz_core::model::{Question, SeedQuestion, TopicId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    conn, id_i64, map_question, question_columns, seed_id_from_i64, ser, topic_id_from_i64,
};
use crate::repository::{SeedQuestionRepository, StorageError};

#[async_trait]
impl SeedQuestionRepository for SqliteRepository {
    async fn insert_seed(
        &self,
        topic_id: TopicId,
        question: &Question,
    ) -> Result<SeedQuestion, StorageError> {
        let topic = id_i64("topic_id", topic_id.value())?;
        let exists = sqlx::query("SELECT 1 FROM topics WHERE id = ?1")
            .bind(topic)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        let cols = question_columns(question)?;
        let res = sqlx::query(
            r"
            INSERT INTO seed_questions
                (topic_id, question_text, answer, options_json, shape_json, explanation, source)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(topic)
        .bind(cols.text)
        .bind(cols.answer)
        .bind(cols.options_json)
        .bind(cols.shape_json)
        .bind(cols.explanation)
        .bind(cols.source)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(SeedQuestion {
            id: seed_id_from_i64(res.last_insert_rowid())?,
            topic_id,
            question: question.clone(),
        })
    }

    async fn seeds_for_topics(
        &self,
        topic_ids: &[TopicId],
    ) -> Result<Vec<SeedQuestion>, StorageError> {
        if topic_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=topic_ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT id, topic_id, question_text, answer, options_json, shape_json, explanation, source \
             FROM seed_questions \
             WHERE topic_id IN ({placeholders}) \
             ORDER BY id ASC"
        );

        let mut query = sqlx::query(&sql);
        for id in topic_ids {
            query = query.bind(id_i64("topic_id", id.value())?);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        rows.iter().map(seed_from_row).collect()
    }
}

fn seed_from_row(row: &SqliteRow) -> Result<SeedQuestion, StorageError> {
    Ok(SeedQuestion {
        id: seed_id_from_i64(row.try_get("id").map_err(ser)?)?,
        topic_id: topic_id_from_i64(row.try_get("topic_id").map_err(ser)?)?,
        question: map_question(row)?,
    })
}
