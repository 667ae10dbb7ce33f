use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Review state of a submission. `Approved` and `Edited` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Edited,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Edited => "edited",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "edited" => Ok(ReviewStatus::Edited),
            other => Err(format!("unknown review status '{}'", other)),
        }
    }
}

/// A student submission and its grading state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub id: Uuid,
    pub identity: String,
    pub practice_id: String,
    pub problem_id: String,
    pub answer: String,
    pub llm_score: Option<f64>,
    pub llm_comment: Option<String>,
    pub teacher_score: Option<f64>,
    pub teacher_comment: Option<String>,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl GradedAnswer {
    /// Teacher score when present, otherwise the model's.
    pub fn final_score(&self) -> Option<f64> {
        self.teacher_score.or(self.llm_score)
    }

    pub fn is_graded(&self) -> bool {
        self.llm_score.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAnswer {
    pub identity: String,
    pub practice_id: String,
    pub problem_id: String,
    pub answer: String,
}

/// Teacher decision on a pending submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TeacherAction {
    /// Accept the model's grade as-is.
    Approve,
    /// Replace the grade.
    Edit {
        score: f64,
        comment: Option<String>,
    },
}
