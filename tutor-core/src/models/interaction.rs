use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Intent category assigned to a student message by the classifier.
///
/// Stored and matched by its label; anything the model returns that does not
/// map onto a known category becomes `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Intent {
    RequestForHint,
    RequestForClarification,
    ConceptualQuestion,
    ProceduralQuestion,
    AnswerVerification,
    ProposedSolution,
    DemandForDirectAnswer,
    NegativeExpression,
    OffTopic,
    ExpressionOfIncomprehension,
    Other,
}

impl Intent {
    /// The fixed categories, excluding `Other`.
    pub const CATEGORIES: [Intent; 10] = [
        Intent::RequestForHint,
        Intent::RequestForClarification,
        Intent::ConceptualQuestion,
        Intent::ProceduralQuestion,
        Intent::AnswerVerification,
        Intent::ProposedSolution,
        Intent::DemandForDirectAnswer,
        Intent::NegativeExpression,
        Intent::OffTopic,
        Intent::ExpressionOfIncomprehension,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Intent::RequestForHint => "Request for Hint",
            Intent::RequestForClarification => "Request for Clarification",
            Intent::ConceptualQuestion => "Conceptual Question",
            Intent::ProceduralQuestion => "Procedural Question",
            Intent::AnswerVerification => "Answer Verification",
            Intent::ProposedSolution => "Proposed Solution",
            Intent::DemandForDirectAnswer => "Demand for Direct Answer",
            Intent::NegativeExpression => "Negative Expression",
            Intent::OffTopic => "Off-Topic",
            Intent::ExpressionOfIncomprehension => "Expression of Incomprehension",
            Intent::Other => "Other",
        }
    }

    /// Map free text onto a category: exact match first, then containment,
    /// ignoring case, hyphens and repeated whitespace.
    pub fn from_label(label: &str) -> Self {
        let wanted = normalize_label(label);
        if wanted.is_empty() {
            return Intent::Other;
        }

        if let Some(intent) = Self::CATEGORIES
            .iter()
            .find(|i| normalize_label(i.label()) == wanted)
        {
            return *intent;
        }

        Self::CATEGORIES
            .iter()
            .find(|i| wanted.contains(&normalize_label(i.label())))
            .copied()
            .unwrap_or(Intent::Other)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Intent {
    fn from(value: String) -> Self {
        Intent::from_label(&value)
    }
}

impl From<Intent> for String {
    fn from(value: Intent) -> Self {
        value.label().to_string()
    }
}

fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a message moves the student towards the solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dimension {
    Productive,
    Unproductive,
    #[default]
    Neutral,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Productive => "Productive",
            Dimension::Unproductive => "Unproductive",
            Dimension::Neutral => "Neutral",
        }
    }

    /// Unknown labels collapse to `Neutral`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "productive" => Dimension::Productive,
            "unproductive" | "non productive" | "non-productive" => Dimension::Unproductive,
            _ => Dimension::Neutral,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic-light status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    Green,
    Yellow,
    Red,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Red => "red",
        }
    }

    /// Color shown for a 0–10 grade: green from 7, yellow from 4, red below.
    pub fn from_score(score: f64) -> Self {
        if score >= 7.0 {
            Color::Green
        } else if score >= 4.0 {
            Color::Yellow
        } else {
            Color::Red
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "green" => Ok(Color::Green),
            "yellow" => Ok(Color::Yellow),
            "red" => Ok(Color::Red),
            other => Err(format!("unknown color '{}'", other)),
        }
    }
}

/// One classified student message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub identity: String,
    pub source_chat_id: Uuid,
    pub intent: Intent,
    pub dimension: Dimension,
    pub color: Color,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the recorder; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInteraction {
    pub identity: String,
    pub source_chat_id: Uuid,
    pub intent: Intent,
    pub dimension: Dimension,
    pub color: Color,
}

/// Newest color for one student, as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentStatus {
    pub identity: String,
    pub color: Color,
    pub updated_at: DateTime<Utc>,
}
