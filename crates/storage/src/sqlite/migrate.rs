use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS topics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subject TEXT NOT NULL,
            grade INTEGER NOT NULL CHECK (grade BETWEEN 1 AND 6),
            unit TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS seed_questions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            topic_id INTEGER NOT NULL,
            question_text TEXT NOT NULL,
            answer TEXT,
            options_json TEXT,
            shape_json TEXT,
            explanation TEXT,
            source TEXT NOT NULL,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS mistakes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            topic_id INTEGER,
            question_text TEXT NOT NULL,
            answer TEXT,
            options_json TEXT,
            shape_json TEXT,
            explanation TEXT,
            source TEXT NOT NULL,
            wrong_answer TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE SET NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS usage_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            topic_id INTEGER,
            kind TEXT NOT NULL,
            correct INTEGER,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS ability_scores (
            user_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            score REAL NOT NULL CHECK (score BETWEEN 0 AND 100),
            graded_count INTEGER NOT NULL CHECK (graded_count >= 0),
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, subject)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS daily_tasks (
            user_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            day TEXT NOT NULL,
            used INTEGER NOT NULL CHECK (used >= 0),
            daily_limit INTEGER NOT NULL CHECK (daily_limit >= 0),
            PRIMARY KEY (user_id, subject)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS subscriptions (
            user_id TEXT PRIMARY KEY,
            plan TEXT NOT NULL,
            status TEXT NOT NULL,
            customer_id TEXT,
            provider_subscription_id TEXT UNIQUE,
            current_period_end TEXT,
            updated_at TEXT NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_topics_subject_grade
            ON topics (subject, grade, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_seed_questions_topic
            ON seed_questions (topic_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_mistakes_user_recorded
            ON mistakes (user_id, recorded_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_usage_logs_user_kind_created
            ON usage_logs (user_id, kind, created_at);
    ",
];

/// Runs versioned migrations for the current schema.
///
/// Version 1 creates topics, seed questions, mistakes, usage logs, ability
/// scores, daily tasks, subscriptions and their indexes.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
