//! PostgreSQL store (sqlx)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AnswerStore, ChatStore, InteractionStore, StoreError};
use crate::models::{
    ChatEntry, Color, Dimension, GradedAnswer, Intent, Interaction, NewAnswer, NewChatEntry,
    NewInteraction, ReviewStatus, StudentStatus,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct ChatRow {
    id: Uuid,
    identity: String,
    practice_id: String,
    problem_id: String,
    message: String,
    reply: String,
    created_at: DateTime<Utc>,
}

impl From<ChatRow> for ChatEntry {
    fn from(row: ChatRow) -> Self {
        ChatEntry {
            id: row.id,
            identity: row.identity,
            practice_id: row.practice_id,
            problem_id: row.problem_id,
            message: row.message,
            reply: row.reply,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct InteractionRow {
    id: Uuid,
    identity: String,
    source_chat_id: Uuid,
    intent: String,
    dimension: String,
    color: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<InteractionRow> for Interaction {
    type Error = StoreError;

    fn try_from(row: InteractionRow) -> Result<Self, Self::Error> {
        let color = row.color.parse::<Color>().map_err(|reason| StoreError::Corrupt {
            id: row.id,
            reason,
        })?;

        Ok(Interaction {
            id: row.id,
            identity: row.identity,
            source_chat_id: row.source_chat_id,
            intent: Intent::from_label(&row.intent),
            dimension: Dimension::from_label(&row.dimension),
            color,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AnswerRow {
    id: Uuid,
    identity: String,
    practice_id: String,
    problem_id: String,
    answer: String,
    llm_score: Option<f64>,
    llm_comment: Option<String>,
    teacher_score: Option<f64>,
    teacher_comment: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    graded_at: Option<DateTime<Utc>>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl TryFrom<AnswerRow> for GradedAnswer {
    type Error = StoreError;

    fn try_from(row: AnswerRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ReviewStatus>()
            .map_err(|reason| StoreError::Corrupt { id: row.id, reason })?;

        Ok(GradedAnswer {
            id: row.id,
            identity: row.identity,
            practice_id: row.practice_id,
            problem_id: row.problem_id,
            answer: row.answer,
            llm_score: row.llm_score,
            llm_comment: row.llm_comment,
            teacher_score: row.teacher_score,
            teacher_comment: row.teacher_comment,
            status,
            created_at: row.created_at,
            graded_at: row.graded_at,
            reviewed_at: row.reviewed_at,
        })
    }
}

const INTERACTION_COLUMNS: &str =
    "id, identity, source_chat_id, intent, dimension, color, created_at";

const ANSWER_COLUMNS: &str = "id, identity, practice_id, problem_id, answer, llm_score, \
     llm_comment, teacher_score, teacher_comment, status, created_at, graded_at, reviewed_at";

// ============================================================================
// ChatStore
// ============================================================================

#[async_trait]
impl ChatStore for PgStore {
    async fn insert_chat(&self, entry: NewChatEntry) -> Result<ChatEntry, StoreError> {
        let row: ChatRow = sqlx::query_as(
            r#"
            INSERT INTO chat_entries (identity, practice_id, problem_id, message, reply)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, identity, practice_id, problem_id, message, reply, created_at
            "#,
        )
        .bind(&entry.identity)
        .bind(&entry.practice_id)
        .bind(&entry.problem_id)
        .bind(&entry.message)
        .bind(&entry.reply)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn recent_chats(
        &self,
        identity: &str,
        practice_id: &str,
        problem_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatEntry>, StoreError> {
        let mut rows: Vec<ChatRow> = sqlx::query_as(
            r#"
            SELECT id, identity, practice_id, problem_id, message, reply, created_at
            FROM chat_entries
            WHERE identity = $1 AND practice_id = $2 AND problem_id = $3
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(identity)
        .bind(practice_id)
        .bind(problem_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.reverse();
        Ok(rows.into_iter().map(ChatEntry::from).collect())
    }
}

// ============================================================================
// InteractionStore
// ============================================================================

#[async_trait]
impl InteractionStore for PgStore {
    async fn insert_interaction(&self, new: NewInteraction) -> Result<Interaction, StoreError> {
        let query = format!(
            r#"
            INSERT INTO interactions (identity, source_chat_id, intent, dimension, color)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            INTERACTION_COLUMNS
        );

        let result = sqlx::query_as::<_, InteractionRow>(&query)
            .bind(&new.identity)
            .bind(new.source_chat_id)
            .bind(new.intent.label())
            .bind(new.dimension.as_str())
            .bind(new.color.as_str())
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => row.try_into(),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateChat(new.source_chat_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_interaction_color(&self, id: Uuid, color: Color) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE interactions SET color = $1 WHERE id = $2")
            .bind(color.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn interactions_since(
        &self,
        identity: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Interaction>, StoreError> {
        let query = format!(
            "SELECT {} FROM interactions WHERE identity = $1 AND created_at >= $2",
            INTERACTION_COLUMNS
        );

        let rows = sqlx::query_as::<_, InteractionRow>(&query)
            .bind(identity)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Interaction::try_from).collect()
    }

    async fn latest_interaction(&self, identity: &str) -> Result<Option<Interaction>, StoreError> {
        let query = format!(
            "SELECT {} FROM interactions WHERE identity = $1 ORDER BY created_at DESC LIMIT 1",
            INTERACTION_COLUMNS
        );

        let row = sqlx::query_as::<_, InteractionRow>(&query)
            .bind(identity)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Interaction::try_from).transpose()
    }

    async fn student_statuses(&self) -> Result<Vec<StudentStatus>, StoreError> {
        let rows: Vec<(Uuid, String, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT DISTINCT ON (identity) id, identity, color, created_at
            FROM interactions
            ORDER BY identity, created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, identity, color, created_at)| {
                let color = color
                    .parse::<Color>()
                    .map_err(|reason| StoreError::Corrupt { id, reason })?;
                Ok(StudentStatus {
                    identity,
                    color,
                    updated_at: created_at,
                })
            })
            .collect()
    }
}

// ============================================================================
// AnswerStore
// ============================================================================

#[async_trait]
impl AnswerStore for PgStore {
    async fn insert_answer(&self, new: NewAnswer) -> Result<GradedAnswer, StoreError> {
        let query = format!(
            r#"
            INSERT INTO graded_answers (identity, practice_id, problem_id, answer, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING {}
            "#,
            ANSWER_COLUMNS
        );

        let row = sqlx::query_as::<_, AnswerRow>(&query)
            .bind(&new.identity)
            .bind(&new.practice_id)
            .bind(&new.problem_id)
            .bind(&new.answer)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn get_answer(&self, id: Uuid) -> Result<Option<GradedAnswer>, StoreError> {
        let query = format!("SELECT {} FROM graded_answers WHERE id = $1", ANSWER_COLUMNS);

        let row = sqlx::query_as::<_, AnswerRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(GradedAnswer::try_from).transpose()
    }

    async fn set_llm_grade(
        &self,
        id: Uuid,
        score: f64,
        comment: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE graded_answers
            SET llm_score = $1, llm_comment = $2, graded_at = NOW()
            WHERE id = $3 AND status = 'pending'
            "#,
        )
        .bind(score)
        .bind(comment)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn apply_review(
        &self,
        id: Uuid,
        status: ReviewStatus,
        teacher_score: Option<f64>,
        teacher_comment: Option<String>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE graded_answers
            SET status = $1, teacher_score = $2, teacher_comment = $3, reviewed_at = NOW()
            WHERE id = $4 AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(teacher_score)
        .bind(teacher_comment)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn pending_answers(&self) -> Result<Vec<GradedAnswer>, StoreError> {
        let query = format!(
            "SELECT {} FROM graded_answers WHERE status = 'pending' ORDER BY created_at ASC",
            ANSWER_COLUMNS
        );

        let rows = sqlx::query_as::<_, AnswerRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(GradedAnswer::try_from).collect()
    }
}
