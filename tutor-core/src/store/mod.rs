//! Storage traits for chat entries, interactions and graded answers
//!
//! The pipeline only ever talks to these traits. `PgStore` backs the running
//! service; `MemoryStore` backs tests and local experiments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ChatEntry, Color, GradedAnswer, Interaction, NewAnswer, NewChatEntry, NewInteraction,
    ReviewStatus, StudentStatus,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Chat entry {0} is already linked to an interaction")]
    DuplicateChat(Uuid),

    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },
}

/// Tutor conversation log.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn insert_chat(&self, entry: NewChatEntry) -> Result<ChatEntry, StoreError>;

    /// Most recent exchanges for one exercise, oldest first.
    async fn recent_chats(
        &self,
        identity: &str,
        practice_id: &str,
        problem_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatEntry>, StoreError>;
}

/// Classified interactions feeding the semaphore.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Insert a row; the store assigns id and `created_at`.
    async fn insert_interaction(&self, new: NewInteraction) -> Result<Interaction, StoreError>;

    /// Overwrite one row's color. Returns `false` when the id does not exist.
    async fn set_interaction_color(&self, id: Uuid, color: Color) -> Result<bool, StoreError>;

    /// Rows for `identity` with `created_at >= since`, in no particular order.
    async fn interactions_since(
        &self,
        identity: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Interaction>, StoreError>;

    async fn latest_interaction(&self, identity: &str) -> Result<Option<Interaction>, StoreError>;

    /// Newest color per identity.
    async fn student_statuses(&self) -> Result<Vec<StudentStatus>, StoreError>;
}

/// Submissions under evaluation.
#[async_trait]
pub trait AnswerStore: Send + Sync {
    async fn insert_answer(&self, new: NewAnswer) -> Result<GradedAnswer, StoreError>;

    async fn get_answer(&self, id: Uuid) -> Result<Option<GradedAnswer>, StoreError>;

    /// Fill the model grade on a pending answer. Returns `false` when the id
    /// does not exist or the answer is no longer pending.
    async fn set_llm_grade(&self, id: Uuid, score: f64, comment: &str)
        -> Result<bool, StoreError>;

    /// Move a pending answer to a terminal status. Returns `false` when the id
    /// does not exist or the answer is no longer pending.
    async fn apply_review(
        &self,
        id: Uuid,
        status: ReviewStatus,
        teacher_score: Option<f64>,
        teacher_comment: Option<String>,
    ) -> Result<bool, StoreError>;

    /// Pending answers, oldest first.
    async fn pending_answers(&self) -> Result<Vec<GradedAnswer>, StoreError>;
}

/// Everything the service persists.
pub trait TutorStore: ChatStore + InteractionStore + AnswerStore {}

impl<T: ChatStore + InteractionStore + AnswerStore> TutorStore for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_traits_are_object_safe() {
        fn _takes_chat(_: Box<dyn ChatStore>) {}
        fn _takes_interactions(_: Box<dyn InteractionStore>) {}
        fn _takes_answers(_: Box<dyn AnswerStore>) {}
        fn _takes_all(_: Box<dyn TutorStore>) {}
    }
}
