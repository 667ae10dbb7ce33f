//! Intent classifier — labels a student message with (intent, dimension)
//!
//! The model is asked for `{"intent": ..., "dimension": ...}`. Malformed
//! replies never surface as errors: they become `Classification::Fallback`,
//! which reads as (Other, Neutral). Only transport failures propagate.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tutor_core::config::LlmConfig;
use tutor_core::{complete_bounded, ChatCompletion, ChatMessage, Dimension, Intent, LlmError};

use super::model_output::parse_model_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Parsed { intent: Intent, dimension: Dimension },
    Fallback,
}

impl Classification {
    pub fn intent(&self) -> Intent {
        match self {
            Classification::Parsed { intent, .. } => *intent,
            Classification::Fallback => Intent::Other,
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            Classification::Parsed { dimension, .. } => *dimension,
            Classification::Fallback => Dimension::Neutral,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Classification::Fallback)
    }
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    dimension: Option<Value>,
}

/// Fixed instruction prompt listing every category.
pub fn classifier_prompt() -> String {
    let intents = Intent::CATEGORIES
        .iter()
        .map(|i| format!("- {}", i.label()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You classify messages that a student sends to a programming tutor.\n\
         Pick exactly one intent from this list:\n{}\n\
         If none applies, use \"Other\".\n\
         Pick exactly one dimension: Productive, Unproductive or Neutral.\n\
         Answer with a single JSON object and nothing else, for example:\n\
         {{\"intent\": \"Request for Hint\", \"dimension\": \"Productive\"}}",
        intents
    )
}

/// Interpret a raw model reply.
pub fn parse_classification(raw: &str) -> Classification {
    match parse_model_json::<RawClassification>(raw).into_option() {
        Some(RawClassification {
            intent: Some(intent),
            dimension,
        }) => Classification::Parsed {
            intent: Intent::from_label(&intent),
            dimension: match dimension {
                Some(Value::String(label)) => Dimension::from_label(&label),
                _ => Dimension::default(),
            },
        },
        _ => Classification::Fallback,
    }
}

pub async fn classify(
    llm: &dyn ChatCompletion,
    message: &str,
    config: &LlmConfig,
) -> Result<Classification, LlmError> {
    let messages = vec![
        ChatMessage::system(classifier_prompt()),
        ChatMessage::user(message),
    ];

    let raw = complete_bounded(
        llm,
        &messages,
        config.classify_temperature,
        config.classify_max_tokens,
        Duration::from_secs(config.timeout_seconds),
    )
    .await?;

    let classification = parse_classification(&raw);
    if classification.is_fallback() {
        tracing::warn!(raw = %raw, "Unreadable classifier reply, using Other/Neutral");
    }

    Ok(classification)
}
