//! In-memory store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AnswerStore, ChatStore, InteractionStore, StoreError};
use crate::models::{
    ChatEntry, Color, GradedAnswer, Interaction, NewAnswer, NewChatEntry, NewInteraction,
    ReviewStatus, StudentStatus,
};

#[derive(Default)]
struct MemoryState {
    chats: Vec<ChatEntry>,
    interactions: Vec<Interaction>,
    answers: HashMap<Uuid, GradedAnswer>,
}

/// Process-local store with the same semantics as `PgStore`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an interaction with an explicit timestamp.
    pub async fn insert_interaction_at(
        &self,
        new: NewInteraction,
        created_at: DateTime<Utc>,
    ) -> Result<Interaction, StoreError> {
        let mut state = self.state.write().await;

        if state
            .interactions
            .iter()
            .any(|i| i.source_chat_id == new.source_chat_id)
        {
            return Err(StoreError::DuplicateChat(new.source_chat_id));
        }

        let interaction = Interaction {
            id: Uuid::new_v4(),
            identity: new.identity,
            source_chat_id: new.source_chat_id,
            intent: new.intent,
            dimension: new.dimension,
            color: new.color,
            created_at,
        };
        state.interactions.push(interaction.clone());
        Ok(interaction)
    }

    pub async fn get_interaction(&self, id: Uuid) -> Option<Interaction> {
        let state = self.state.read().await;
        state.interactions.iter().find(|i| i.id == id).cloned()
    }

    pub async fn interaction_count(&self) -> usize {
        self.state.read().await.interactions.len()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn insert_chat(&self, entry: NewChatEntry) -> Result<ChatEntry, StoreError> {
        let chat = ChatEntry {
            id: Uuid::new_v4(),
            identity: entry.identity,
            practice_id: entry.practice_id,
            problem_id: entry.problem_id,
            message: entry.message,
            reply: entry.reply,
            created_at: Utc::now(),
        };
        self.state.write().await.chats.push(chat.clone());
        Ok(chat)
    }

    async fn recent_chats(
        &self,
        identity: &str,
        practice_id: &str,
        problem_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatEntry>, StoreError> {
        let state = self.state.read().await;
        let matching: Vec<ChatEntry> = state
            .chats
            .iter()
            .filter(|c| {
                c.identity == identity && c.practice_id == practice_id && c.problem_id == problem_id
            })
            .cloned()
            .collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).collect())
    }
}

#[async_trait]
impl InteractionStore for MemoryStore {
    async fn insert_interaction(&self, new: NewInteraction) -> Result<Interaction, StoreError> {
        self.insert_interaction_at(new, Utc::now()).await
    }

    async fn set_interaction_color(&self, id: Uuid, color: Color) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.interactions.iter_mut().find(|i| i.id == id) {
            Some(row) => {
                row.color = color;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn interactions_since(
        &self,
        identity: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Interaction>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .interactions
            .iter()
            .filter(|i| i.identity == identity && i.created_at >= since)
            .cloned()
            .collect())
    }

    async fn latest_interaction(&self, identity: &str) -> Result<Option<Interaction>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .interactions
            .iter()
            .filter(|i| i.identity == identity)
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn student_statuses(&self) -> Result<Vec<StudentStatus>, StoreError> {
        let state = self.state.read().await;
        let mut latest: HashMap<&str, &Interaction> = HashMap::new();
        for row in &state.interactions {
            let entry = latest.entry(row.identity.as_str()).or_insert(row);
            if row.created_at > entry.created_at {
                *entry = row;
            }
        }

        let mut statuses: Vec<StudentStatus> = latest
            .into_values()
            .map(|row| StudentStatus {
                identity: row.identity.clone(),
                color: row.color,
                updated_at: row.created_at,
            })
            .collect();
        statuses.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(statuses)
    }
}

#[async_trait]
impl AnswerStore for MemoryStore {
    async fn insert_answer(&self, new: NewAnswer) -> Result<GradedAnswer, StoreError> {
        let answer = GradedAnswer {
            id: Uuid::new_v4(),
            identity: new.identity,
            practice_id: new.practice_id,
            problem_id: new.problem_id,
            answer: new.answer,
            llm_score: None,
            llm_comment: None,
            teacher_score: None,
            teacher_comment: None,
            status: ReviewStatus::Pending,
            created_at: Utc::now(),
            graded_at: None,
            reviewed_at: None,
        };
        self.state
            .write()
            .await
            .answers
            .insert(answer.id, answer.clone());
        Ok(answer)
    }

    async fn get_answer(&self, id: Uuid) -> Result<Option<GradedAnswer>, StoreError> {
        Ok(self.state.read().await.answers.get(&id).cloned())
    }

    async fn set_llm_grade(
        &self,
        id: Uuid,
        score: f64,
        comment: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.answers.get_mut(&id) {
            Some(answer) if answer.status == ReviewStatus::Pending => {
                answer.llm_score = Some(score);
                answer.llm_comment = Some(comment.to_string());
                answer.graded_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_review(
        &self,
        id: Uuid,
        status: ReviewStatus,
        teacher_score: Option<f64>,
        teacher_comment: Option<String>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.answers.get_mut(&id) {
            Some(answer) if answer.status == ReviewStatus::Pending => {
                answer.status = status;
                answer.teacher_score = teacher_score;
                answer.teacher_comment = teacher_comment;
                answer.reviewed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn pending_answers(&self) -> Result<Vec<GradedAnswer>, StoreError> {
        let state = self.state.read().await;
        let mut pending: Vec<GradedAnswer> = state
            .answers
            .values()
            .filter(|a| a.status == ReviewStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|a| a.created_at);
        Ok(pending)
    }
}
