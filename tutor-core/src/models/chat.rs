use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One student message and the tutor reply it received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: Uuid,
    pub identity: String,
    pub practice_id: String,
    pub problem_id: String,
    pub message: String,
    pub reply: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChatEntry {
    pub identity: String,
    pub practice_id: String,
    pub problem_id: String,
    pub message: String,
    pub reply: String,
}
