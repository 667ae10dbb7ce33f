//! Teacher review of graded answers
//!
//! An answer can be reviewed exactly once, and only while pending.

use thiserror::Error;
use tutor_core::store::{AnswerStore, StoreError};
use tutor_core::{GradedAnswer, ReviewStatus, TeacherAction};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Answer {0} not found")]
    NotFound(Uuid),

    #[error("Answer {id} was already reviewed ({status})")]
    AlreadyReviewed { id: Uuid, status: ReviewStatus },

    #[error("Answer {0} has no model grade to approve")]
    NotGraded(Uuid),

    #[error("Invalid score: {0}")]
    InvalidScore(f64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub async fn review_answer<S>(
    store: &S,
    id: Uuid,
    action: TeacherAction,
) -> Result<GradedAnswer, ReviewError>
where
    S: AnswerStore + ?Sized,
{
    let answer = store.get_answer(id).await?.ok_or(ReviewError::NotFound(id))?;
    if answer.status.is_terminal() {
        return Err(ReviewError::AlreadyReviewed {
            id,
            status: answer.status,
        });
    }

    let (status, score, comment) = match action {
        TeacherAction::Approve => {
            let score = answer.llm_score.ok_or(ReviewError::NotGraded(id))?;
            (ReviewStatus::Approved, score, answer.llm_comment.clone())
        }
        TeacherAction::Edit { score, comment } => {
            if !score.is_finite() {
                return Err(ReviewError::InvalidScore(score));
            }
            (ReviewStatus::Edited, score.clamp(0.0, 10.0), comment)
        }
    };

    if !store.apply_review(id, status, Some(score), comment).await? {
        // Lost a race with another reviewer, or the row vanished.
        return match store.get_answer(id).await? {
            Some(current) => Err(ReviewError::AlreadyReviewed {
                id,
                status: current.status,
            }),
            None => Err(ReviewError::NotFound(id)),
        };
    }

    tracing::info!(answer_id = %id, status = %status, score, "Answer reviewed");

    store.get_answer(id).await?.ok_or(ReviewError::NotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::{MemoryStore, NewAnswer};

    async fn graded_answer(store: &MemoryStore, score: Option<f64>) -> Uuid {
        let answer = store
            .insert_answer(NewAnswer {
                identity: "s1".to_string(),
                practice_id: "p1".to_string(),
                problem_id: "q1".to_string(),
                answer: "def f(n): return n+1".to_string(),
            })
            .await
            .unwrap();
        if let Some(score) = score {
            store.set_llm_grade(answer.id, score, "model says ok").await.unwrap();
        }
        answer.id
    }

    #[tokio::test]
    async fn test_approve_copies_model_grade() {
        let store = MemoryStore::new();
        let id = graded_answer(&store, Some(7.0)).await;

        let reviewed = review_answer(&store, id, TeacherAction::Approve).await.unwrap();
        assert_eq!(reviewed.status, ReviewStatus::Approved);
        assert_eq!(reviewed.teacher_score, Some(7.0));
        assert_eq!(reviewed.teacher_comment.as_deref(), Some("model says ok"));
        assert!(reviewed.reviewed_at.is_some());
    }

    #[tokio::test]
    async fn test_edit_clamps_score() {
        let store = MemoryStore::new();
        let id = graded_answer(&store, Some(3.0)).await;

        let reviewed = review_answer(
            &store,
            id,
            TeacherAction::Edit {
                score: 12.0,
                comment: Some("better than the model thought".to_string()),
            },
        )
        .await
        .unwrap();

        assert_eq!(reviewed.status, ReviewStatus::Edited);
        assert_eq!(reviewed.teacher_score, Some(10.0));
        assert_eq!(reviewed.final_score(), Some(10.0));
        assert_eq!(reviewed.llm_score, Some(3.0));
    }

    #[tokio::test]
    async fn test_terminal_answers_reject_further_reviews() {
        let store = MemoryStore::new();
        let id = graded_answer(&store, Some(5.0)).await;
        review_answer(&store, id, TeacherAction::Approve).await.unwrap();

        let second = review_answer(
            &store,
            id,
            TeacherAction::Edit {
                score: 1.0,
                comment: None,
            },
        )
        .await;
        assert!(matches!(
            second,
            Err(ReviewError::AlreadyReviewed {
                status: ReviewStatus::Approved,
                ..
            })
        ));
        assert_eq!(store.get_answer(id).await.unwrap().unwrap().teacher_score, Some(5.0));
    }

    #[tokio::test]
    async fn test_missing_answer() {
        let store = MemoryStore::new();
        let result = review_answer(&store, Uuid::new_v4(), TeacherAction::Approve).await;
        assert!(matches!(result, Err(ReviewError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_approve_requires_model_grade_but_edit_does_not() {
        let store = MemoryStore::new();
        let id = graded_answer(&store, None).await;

        let approve = review_answer(&store, id, TeacherAction::Approve).await;
        assert!(matches!(approve, Err(ReviewError::NotGraded(_))));

        let edited = review_answer(
            &store,
            id,
            TeacherAction::Edit {
                score: 6.0,
                comment: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(edited.status, ReviewStatus::Edited);
    }

    #[tokio::test]
    async fn test_nan_score_is_rejected() {
        let store = MemoryStore::new();
        let id = graded_answer(&store, Some(5.0)).await;
        let result = review_answer(
            &store,
            id,
            TeacherAction::Edit {
                score: f64::NAN,
                comment: None,
            },
        )
        .await;
        assert!(matches!(result, Err(ReviewError::InvalidScore(_))));
    }
}
