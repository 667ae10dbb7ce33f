use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Color, Intent, Interaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Chat,
    Answer,
}

/// Status change pushed to live observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub identity: String,
    pub color: Color,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    /// Event for a classified chat message, carrying its finalized color.
    pub fn chat(interaction: &Interaction) -> Self {
        Self {
            identity: interaction.identity.clone(),
            color: interaction.color,
            kind: EventKind::Chat,
            interaction_id: Some(interaction.id),
            chat_id: Some(interaction.source_chat_id),
            answer_id: None,
            intent: Some(interaction.intent),
            score: None,
            timestamp: Utc::now(),
        }
    }

    /// Event for a graded answer; the color is derived from the score.
    pub fn answer(identity: impl Into<String>, answer_id: Uuid, score: f64) -> Self {
        Self {
            identity: identity.into(),
            color: Color::from_score(score),
            kind: EventKind::Answer,
            interaction_id: None,
            chat_id: None,
            answer_id: Some(answer_id),
            intent: None,
            score: Some(score),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dimension;

    #[test]
    fn test_chat_event_copies_interaction_fields() {
        let interaction = Interaction {
            id: Uuid::new_v4(),
            identity: "s1".to_string(),
            source_chat_id: Uuid::new_v4(),
            intent: Intent::OffTopic,
            dimension: Dimension::Unproductive,
            color: Color::Yellow,
            created_at: Utc::now(),
        };

        let event = StatusEvent::chat(&interaction);
        assert_eq!(event.kind, EventKind::Chat);
        assert_eq!(event.color, Color::Yellow);
        assert_eq!(event.interaction_id, Some(interaction.id));
        assert_eq!(event.chat_id, Some(interaction.source_chat_id));
        assert!(event.answer_id.is_none());
    }

    #[test]
    fn test_answer_event_serializes_without_chat_fields() {
        let id = Uuid::new_v4();
        let event = StatusEvent::answer("s2", id, 5.5);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["kind"], "answer");
        assert_eq!(json["color"], "yellow");
        assert_eq!(json["score"], 5.5);
        assert_eq!(json["answer_id"], id.to_string());
        assert!(json.get("interaction_id").is_none());
        assert!(json.get("intent").is_none());
    }
}
