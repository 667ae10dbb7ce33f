//! Chat and answer pipelines
//!
//! Request-facing entry points do the synchronous part (tutor reply, row
//! inserts) and hand the rest to spawned tasks. Spawned tasks never panic on
//! collaborator failures: they log, degrade and return `None`.

use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tutor_core::store::StoreError;
use tutor_core::{
    ChatEntry, Color, GradedAnswer, Interaction, NewAnswer, NewChatEntry, StatusEvent,
    TeacherAction,
};
use uuid::Uuid;

use super::grading::{self, Grade};
use super::review::{self, ReviewError};
use super::{classifier, recorder, semaphore, tutor};
use crate::context::ContextError;
use crate::services::TutorServices;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub identity: String,
    pub practice_id: String,
    pub problem_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnswerRequest {
    pub identity: String,
    pub practice_id: String,
    pub problem_id: String,
    pub answer: String,
}

/// A stored exchange whose classification runs in the background.
pub struct ChatAccepted {
    pub entry: ChatEntry,
    /// True when the student got the apology instead of a model reply.
    pub degraded: bool,
    pub classification: JoinHandle<Option<Interaction>>,
}

/// A stored submission whose grading runs in the background.
pub struct AnswerAccepted {
    pub answer: GradedAnswer,
    pub grading: JoinHandle<Option<Grade>>,
}

fn require(field: &str, value: &str) -> Result<(), PipelineError> {
    if value.trim().is_empty() {
        return Err(PipelineError::Invalid(format!("{} is required", field)));
    }
    Ok(())
}

// ============================================================================
// Chat flow
// ============================================================================

pub async fn handle_chat(
    services: &TutorServices,
    req: ChatRequest,
) -> Result<ChatAccepted, PipelineError> {
    require("identity", &req.identity)?;
    require("practice_id", &req.practice_id)?;
    require("problem_id", &req.problem_id)?;
    require("message", &req.message)?;

    let config = &services.config;
    let statement = services
        .statements
        .get_statement(&req.practice_id, &req.problem_id)
        .await;
    let context = lookup_context(services, &req.message).await;
    let history = services
        .store
        .recent_chats(
            &req.identity,
            &req.practice_id,
            &req.problem_id,
            config.tutor.history_turns,
        )
        .await?;

    let (reply, degraded) = match tutor::reply(
        services.llm.as_ref(),
        &statement,
        &context,
        &history,
        &req.message,
        &config.llm,
        &config.tutor,
    )
    .await
    {
        Ok(text) if !text.is_empty() => (text, false),
        Ok(_) => {
            tracing::warn!(identity = %req.identity, "Empty tutor reply, sending apology");
            (tutor::APOLOGY.to_string(), true)
        }
        Err(e) => {
            tracing::warn!(
                identity = %req.identity,
                error = %e,
                "Tutor reply failed, sending apology"
            );
            (tutor::APOLOGY.to_string(), true)
        }
    };

    let entry = services
        .store
        .insert_chat(NewChatEntry {
            identity: req.identity,
            practice_id: req.practice_id,
            problem_id: req.problem_id,
            message: req.message,
            reply,
        })
        .await?;

    let classification = spawn_classification(services.clone(), entry.clone());

    Ok(ChatAccepted {
        entry,
        degraded,
        classification,
    })
}

/// Context lookup bounded by the LLM timeout. Failures yield no context.
async fn lookup_context(services: &TutorServices, query: &str) -> String {
    let seconds = services.config.llm.timeout_seconds;
    let result = match tokio::time::timeout(
        Duration::from_secs(seconds),
        services.context.lookup(query),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(ContextError::Timeout { seconds }),
    };

    result.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Context lookup failed, continuing without context");
        String::new()
    })
}

pub fn spawn_classification(
    services: TutorServices,
    entry: ChatEntry,
) -> JoinHandle<Option<Interaction>> {
    tokio::spawn(async move { run_classification(&services, &entry).await })
}

/// Classify → record → recompute window → finalize → publish.
pub async fn run_classification(
    services: &TutorServices,
    entry: &ChatEntry,
) -> Option<Interaction> {
    match classify_and_record(services, entry).await {
        Ok(interaction) => interaction,
        Err(e) => {
            let error = format!("{:#}", e);
            tracing::error!(
                chat_id = %entry.id,
                identity = %entry.identity,
                error = %error,
                "Classification pipeline failed"
            );
            None
        }
    }
}

async fn classify_and_record(
    services: &TutorServices,
    entry: &ChatEntry,
) -> anyhow::Result<Option<Interaction>> {
    let config = &services.config;

    let classification =
        match classifier::classify(services.llm.as_ref(), &entry.message, &config.llm).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(
                    chat_id = %entry.id,
                    error = %e,
                    "Classifier unreachable, interaction not recorded"
                );
                return Ok(None);
            }
        };

    let store = services.store.as_ref();
    let interaction = recorder::record(
        store,
        entry.id,
        &entry.identity,
        classification.intent(),
        classification.dimension(),
    )
    .await
    .context("recording interaction")?;

    let color = semaphore::compute_color(store, &entry.identity, Utc::now(), &config.semaphore)
        .await
        .context("computing semaphore color")?;

    if !recorder::finalize_color(store, interaction.id, color)
        .await
        .context("finalizing interaction color")?
    {
        return Ok(None);
    }

    let interaction = Interaction {
        color,
        ..interaction
    };

    tracing::info!(
        identity = %interaction.identity,
        intent = %interaction.intent,
        color = %color,
        "Interaction classified"
    );
    services.notifier.publish(StatusEvent::chat(&interaction));

    Ok(Some(interaction))
}

/// Color of the newest interaction, green when there is none.
pub async fn current_color(services: &TutorServices, identity: &str) -> Result<Color, StoreError> {
    Ok(services
        .store
        .latest_interaction(identity)
        .await?
        .map(|i| i.color)
        .unwrap_or_default())
}

// ============================================================================
// Answer flow
// ============================================================================

pub async fn submit_answer(
    services: &TutorServices,
    req: AnswerRequest,
) -> Result<AnswerAccepted, PipelineError> {
    require("identity", &req.identity)?;
    require("practice_id", &req.practice_id)?;
    require("problem_id", &req.problem_id)?;
    require("answer", &req.answer)?;

    let answer = services
        .store
        .insert_answer(NewAnswer {
            identity: req.identity,
            practice_id: req.practice_id,
            problem_id: req.problem_id,
            answer: req.answer,
        })
        .await?;

    tracing::info!(answer_id = %answer.id, identity = %answer.identity, "Answer submitted");

    let grading = spawn_grading(services.clone(), answer.clone());
    Ok(AnswerAccepted { answer, grading })
}

pub fn spawn_grading(services: TutorServices, answer: GradedAnswer) -> JoinHandle<Option<Grade>> {
    tokio::spawn(async move { run_grading(&services, &answer).await })
}

/// Grade one answer. On any failure the answer stays pending and unscored.
pub async fn run_grading(services: &TutorServices, answer: &GradedAnswer) -> Option<Grade> {
    let config = &services.config;
    let statement = services
        .statements
        .get_statement(&answer.practice_id, &answer.problem_id)
        .await;

    let grade = match grading::grade(
        services.llm.as_ref(),
        &statement,
        &answer.answer,
        &config.llm,
        &config.grading,
    )
    .await
    {
        Ok(grade) => grade,
        Err(e) => {
            tracing::warn!(
                answer_id = %answer.id,
                error = %e,
                "Grading failed, answer left unscored"
            );
            return None;
        }
    };

    match services
        .store
        .set_llm_grade(answer.id, grade.score, &grade.comment)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(
                answer_id = %answer.id,
                "Answer missing or already reviewed, grade discarded"
            );
            return None;
        }
        Err(e) => {
            tracing::error!(answer_id = %answer.id, error = %e, "Failed to store grade");
            return None;
        }
    }

    tracing::info!(
        answer_id = %answer.id,
        identity = %answer.identity,
        score = grade.score,
        fallback = grade.fallback,
        "Answer graded"
    );
    services
        .notifier
        .publish(StatusEvent::answer(&answer.identity, answer.id, grade.score));

    Some(grade)
}

/// Apply a teacher decision and broadcast the resulting grade.
pub async fn review(
    services: &TutorServices,
    id: Uuid,
    action: TeacherAction,
) -> Result<GradedAnswer, ReviewError> {
    let reviewed = review::review_answer(services.store.as_ref(), id, action).await?;

    if let Some(score) = reviewed.final_score() {
        services
            .notifier
            .publish(StatusEvent::answer(&reviewed.identity, reviewed.id, score));
    }

    Ok(reviewed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_services, FailingLlm, ScriptedLlm};
    use std::sync::Arc;
    use tutor_core::{AnswerStore, EventKind, Intent, MemoryStore, ReviewStatus};

    fn chat(identity: &str, message: &str) -> ChatRequest {
        ChatRequest {
            identity: identity.to_string(),
            practice_id: "loops".to_string(),
            problem_id: "sum".to_string(),
            message: message.to_string(),
        }
    }

    fn answer(identity: &str, text: &str) -> AnswerRequest {
        AnswerRequest {
            identity: identity.to_string(),
            practice_id: "loops".to_string(),
            problem_id: "sum".to_string(),
            answer: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_chat_stores_reply_and_classifies_in_background() {
        let store = MemoryStore::new();
        let services = test_services(store.clone(), Arc::new(ScriptedLlm::default()));
        let mut events = services.notifier.subscribe();

        let accepted = handle_chat(&services, chat("s1", "Off-Topic")).await.unwrap();
        assert!(!accepted.degraded);
        assert_eq!(accepted.entry.reply, ScriptedLlm::TUTOR_REPLY);

        let interaction = accepted.classification.await.unwrap().unwrap();
        assert_eq!(interaction.source_chat_id, accepted.entry.id);
        assert_eq!(interaction.intent, Intent::OffTopic);
        assert_eq!(interaction.color, Color::Green);

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Chat);
        assert_eq!(event.chat_id, Some(accepted.entry.id));
    }

    #[tokio::test]
    async fn test_chat_scenario_escalates_to_yellow_then_red() {
        let store = MemoryStore::new();
        let services = test_services(store.clone(), Arc::new(ScriptedLlm::default()));

        let mut colors = Vec::new();
        for message in [
            "Off-Topic",
            "Off-Topic",
            "Off-Topic",
            "Demand for Direct Answer",
            "Demand for Direct Answer",
        ] {
            let accepted = handle_chat(&services, chat("s1", message)).await.unwrap();
            let interaction = accepted.classification.await.unwrap().unwrap();
            colors.push(interaction.color);
            assert_eq!(
                store.get_interaction(interaction.id).await.unwrap().color,
                interaction.color
            );
        }

        assert_eq!(
            colors,
            vec![
                Color::Green,
                Color::Yellow,
                Color::Yellow,
                Color::Yellow,
                Color::Red
            ]
        );
        assert_eq!(current_color(&services, "s1").await.unwrap(), Color::Red);
        assert_eq!(current_color(&services, "nobody").await.unwrap(), Color::Green);
    }

    #[tokio::test]
    async fn test_llm_outage_sends_apology_and_skips_recording() {
        let store = MemoryStore::new();
        let services = test_services(store.clone(), Arc::new(FailingLlm));

        let accepted = handle_chat(&services, chat("s1", "help")).await.unwrap();
        assert!(accepted.degraded);
        assert_eq!(accepted.entry.reply, tutor::APOLOGY);

        assert!(accepted.classification.await.unwrap().is_none());
        assert_eq!(store.interaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_chat_requires_fields() {
        let services = test_services(MemoryStore::new(), Arc::new(ScriptedLlm::default()));
        let result = handle_chat(&services, chat(" ", "hello")).await;
        assert!(matches!(result, Err(PipelineError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_history_is_sent_to_tutor() {
        let store = MemoryStore::new();
        let llm = Arc::new(ScriptedLlm::default());
        let services = test_services(store.clone(), llm.clone());

        let first = handle_chat(&services, chat("s1", "first question")).await.unwrap();
        first.classification.await.unwrap();
        let second = handle_chat(&services, chat("s1", "second question")).await.unwrap();
        second.classification.await.unwrap();

        let tutor_calls = llm.tutor_calls();
        assert_eq!(tutor_calls.len(), 2);
        let replayed: Vec<&str> = tutor_calls[1]
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert!(replayed.contains(&"first question"));
        assert_eq!(replayed.last(), Some(&"second question"));
    }

    #[tokio::test]
    async fn test_answer_is_graded_and_published() {
        let store = MemoryStore::new();
        let services = test_services(store.clone(), Arc::new(ScriptedLlm::default()));
        let mut events = services.notifier.subscribe();

        let accepted = submit_answer(&services, answer("s1", "def f(n): return n+1"))
            .await
            .unwrap();
        assert_eq!(accepted.answer.status, ReviewStatus::Pending);

        let grade = accepted.grading.await.unwrap().unwrap();
        assert_eq!(grade.score, 9.5);

        let stored = store.get_answer(accepted.answer.id).await.unwrap().unwrap();
        assert_eq!(stored.llm_score, Some(9.5));
        assert_eq!(stored.status, ReviewStatus::Pending);
        assert!(stored.graded_at.is_some());

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Answer);
        assert_eq!(event.color, Color::Green);
    }

    #[tokio::test]
    async fn test_grading_outage_leaves_answer_unscored_and_pending() {
        let store = MemoryStore::new();
        let services = test_services(store.clone(), Arc::new(FailingLlm));

        let accepted = submit_answer(&services, answer("s1", "42")).await.unwrap();
        assert!(accepted.grading.await.unwrap().is_none());

        let stored = store.get_answer(accepted.answer.id).await.unwrap().unwrap();
        assert_eq!(stored.llm_score, None);
        assert_eq!(stored.status, ReviewStatus::Pending);
        assert_eq!(store.pending_answers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_review_publishes_final_score() {
        let store = MemoryStore::new();
        let services = test_services(store.clone(), Arc::new(ScriptedLlm::default()));

        let accepted = submit_answer(&services, answer("s1", "x")).await.unwrap();
        accepted.grading.await.unwrap();

        let mut events = services.notifier.subscribe();
        let reviewed = review(
            &services,
            accepted.answer.id,
            TeacherAction::Edit {
                score: 2.0,
                comment: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(reviewed.status, ReviewStatus::Edited);

        let event = events.recv().await.unwrap();
        assert_eq!(event.score, Some(2.0));
        assert_eq!(event.color, Color::Red);
    }
}
