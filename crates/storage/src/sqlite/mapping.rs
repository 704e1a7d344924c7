use quiz_core::model::{
    MistakeId, Question, QuestionSource, SeedQuestionId, ShapeParams, Subject, TopicId, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn topic_id_from_i64(v: i64) -> Result<TopicId, StorageError> {
    Ok(TopicId::new(i64_to_u64("topic_id", v)?))
}

pub(crate) fn seed_id_from_i64(v: i64) -> Result<SeedQuestionId, StorageError> {
    Ok(SeedQuestionId::new(i64_to_u64("seed_id", v)?))
}

pub(crate) fn mistake_id_from_i64(v: i64) -> Result<MistakeId, StorageError> {
    Ok(MistakeId::new(i64_to_u64("mistake_id", v)?))
}

pub(crate) fn parse_subject(row: &SqliteRow) -> Result<Subject, StorageError> {
    row.try_get::<String, _>("subject")
        .map_err(ser)?
        .parse::<Subject>()
        .map_err(ser)
}

pub(crate) fn parse_user(row: &SqliteRow) -> Result<UserId, StorageError> {
    UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)
}

fn source_to_str(source: QuestionSource) -> &'static str {
    match source {
        QuestionSource::Seed => "seed",
        QuestionSource::Generated => "generated",
        QuestionSource::Fallback => "fallback",
    }
}

fn parse_source(s: &str) -> Result<QuestionSource, StorageError> {
    match s {
        "seed" => Ok(QuestionSource::Seed),
        "generated" => Ok(QuestionSource::Generated),
        "fallback" => Ok(QuestionSource::Fallback),
        _ => Err(StorageError::Serialization(format!("invalid source: {s}"))),
    }
}

/// Column values for a question, in the order
/// `question_text, answer, options_json, shape_json, explanation, source`.
pub(crate) struct QuestionColumns {
    pub text: String,
    pub answer: Option<String>,
    pub options_json: Option<String>,
    pub shape_json: Option<String>,
    pub explanation: Option<String>,
    pub source: &'static str,
}

pub(crate) fn question_columns(question: &Question) -> Result<QuestionColumns, StorageError> {
    Ok(QuestionColumns {
        text: question.text().to_owned(),
        answer: question.answer().map(str::to_owned),
        options_json: question
            .options()
            .map(serde_json::to_string)
            .transpose()
            .map_err(ser)?,
        shape_json: question
            .shape()
            .map(serde_json::to_string)
            .transpose()
            .map_err(ser)?,
        explanation: question.explanation().map(str::to_owned),
        source: source_to_str(question.source()),
    })
}

pub(crate) fn map_question(row: &SqliteRow) -> Result<Question, StorageError> {
    let options: Option<Vec<String>> = row
        .try_get::<Option<String>, _>("options_json")
        .map_err(ser)?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(ser)?;
    let shape: Option<ShapeParams> = row
        .try_get::<Option<String>, _>("shape_json")
        .map_err(ser)?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(ser)?;
    let source = parse_source(&row.try_get::<String, _>("source").map_err(ser)?)?;

    Ok(Question::new(
        row.try_get::<String, _>("question_text").map_err(ser)?,
        row.try_get("answer").map_err(ser)?,
        options,
        source,
    )
    .map_err(ser)?
    .with_shape(shape)
    .with_explanation(row.try_get("explanation").map_err(ser)?))
}
