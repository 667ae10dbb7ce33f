//! Grading engine — rubric scoring of submitted answers
//!
//! The model receives the statement, the answer and an eight-row rubric, and
//! replies with `{"score": ..., "comment": ...}`. Unreadable replies grade as
//! zero with an explanatory comment; transport failures propagate so the
//! caller can leave the submission unscored.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tutor_core::config::{GradingConfig, LlmConfig};
use tutor_core::{complete_bounded, ChatCompletion, ChatMessage, Color, LlmError};

use super::model_output::parse_model_json;

pub const FALLBACK_COMMENT: &str = "Automatic grading failed: the model reply could not be read. \
A teacher needs to grade this answer manually.";

/// One rubric row. Different criteria may share a score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RubricTier {
    pub score: f64,
    pub correct: bool,
    pub complete_procedure: bool,
    pub exhaustive_explanation: bool,
}

impl RubricTier {
    fn describe(&self) -> String {
        format!(
            "{} points: {} result, {} procedure, {} explanation",
            self.score,
            if self.correct { "correct" } else { "incorrect" },
            if self.complete_procedure {
                "complete"
            } else {
                "incomplete"
            },
            if self.exhaustive_explanation {
                "exhaustive"
            } else {
                "missing or partial"
            },
        )
    }
}

const fn tier(score: f64, correct: bool, complete: bool, exhaustive: bool) -> RubricTier {
    RubricTier {
        score,
        correct,
        complete_procedure: complete,
        exhaustive_explanation: exhaustive,
    }
}

pub const RUBRIC: [RubricTier; 8] = [
    tier(10.0, true, true, true),
    tier(8.0, true, true, false),
    tier(8.0, true, false, true),
    tier(6.0, true, false, false),
    tier(4.0, false, true, true),
    tier(4.0, false, true, false),
    tier(2.0, false, false, true),
    tier(0.0, false, false, false),
];

pub fn grading_prompt(statement: &str, answer: &str) -> String {
    let rubric = RUBRIC
        .iter()
        .map(|t| format!("- {}", t.describe()))
        .collect::<Vec<_>>()
        .join("\n");

    let statement = if statement.trim().is_empty() {
        "(statement not available)"
    } else {
        statement
    };

    format!(
        "You grade a student's answer to a programming exercise.\n\n\
         Exercise statement:\n{}\n\n\
         Student answer:\n{}\n\n\
         Score the answer from 0 to 10 using this rubric, judging whether the result is \
         correct, whether the procedure is complete and whether the explanation is exhaustive:\n{}\n\n\
         Reply with a single JSON object and nothing else: \
         {{\"score\": <number>, \"comment\": \"<short feedback for the student>\"}}",
        statement, answer, rubric
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub score: f64,
    pub comment: String,
    /// True when the reply was unreadable and the default grade was used.
    pub fallback: bool,
}

impl Grade {
    fn fallback() -> Self {
        Self {
            score: 0.0,
            comment: FALLBACK_COMMENT.to_string(),
            fallback: true,
        }
    }

    /// Color shown on the dashboard for this grade.
    pub fn color(&self) -> Color {
        Color::from_score(self.score)
    }
}

#[derive(Debug, Deserialize)]
struct RawGrade {
    score: Value,
    #[serde(default)]
    comment: Option<Value>,
}

/// Feedback text from whatever shape the model used for `comment`.
fn comment_from_value(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        Some(other) => other.to_string(),
    }
}

fn score_from_value(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if score.is_finite() {
        Some(score.clamp(0.0, 10.0))
    } else {
        None
    }
}

pub fn parse_grade(raw: &str) -> Grade {
    let Some(parsed) = parse_model_json::<RawGrade>(raw).into_option() else {
        return Grade::fallback();
    };

    match score_from_value(&parsed.score) {
        Some(score) => Grade {
            score,
            comment: comment_from_value(parsed.comment),
            fallback: false,
        },
        None => Grade::fallback(),
    }
}

pub async fn grade(
    llm: &dyn ChatCompletion,
    statement: &str,
    answer: &str,
    llm_config: &LlmConfig,
    config: &GradingConfig,
) -> Result<Grade, LlmError> {
    let messages = vec![
        ChatMessage::system("You are a strict but fair programming teacher."),
        ChatMessage::user(grading_prompt(statement, answer)),
    ];

    let raw = complete_bounded(
        llm,
        &messages,
        config.temperature,
        config.max_tokens,
        Duration::from_secs(llm_config.timeout_seconds),
    )
    .await?;

    let grade = parse_grade(&raw);
    if grade.fallback {
        tracing::warn!(raw = %raw, "Unreadable grading reply, using fallback grade");
    }

    Ok(grade)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_config, FailingLlm, FixedLlm};

    #[test]
    fn test_rubric_keeps_duplicate_scores() {
        let scores: Vec<f64> = RUBRIC.iter().map(|t| t.score).collect();
        assert_eq!(scores, vec![10.0, 8.0, 8.0, 6.0, 4.0, 4.0, 2.0, 0.0]);
        assert_ne!(RUBRIC[1], RUBRIC[2]);
        assert_ne!(RUBRIC[4], RUBRIC[5]);
    }

    #[test]
    fn test_prompt_embeds_statement_answer_and_rubric() {
        let prompt = grading_prompt("Write a function that returns n+1", "def f(n): return n+1");
        assert!(prompt.contains("Write a function that returns n+1"));
        assert!(prompt.contains("def f(n): return n+1"));
        assert!(prompt
            .contains("10 points: correct result, complete procedure, exhaustive explanation"));
        assert!(prompt.contains("0 points"));
    }

    #[test]
    fn test_prompt_marks_missing_statement() {
        assert!(grading_prompt("  ", "x").contains("(statement not available)"));
    }

    #[test]
    fn test_parse_numeric_string_and_clamp() {
        let g = parse_grade(r#"{"score": "7.5", "comment": "ok"}"#);
        assert_eq!(g.score, 7.5);
        assert!(!g.fallback);

        assert_eq!(parse_grade(r#"{"score": 14, "comment": ""}"#).score, 10.0);
        assert_eq!(parse_grade(r#"{"score": -3, "comment": ""}"#).score, 0.0);
    }

    #[test]
    fn test_parse_prose_falls_back_to_zero() {
        let g = parse_grade("This answer looks quite good to me.");
        assert!(g.fallback);
        assert_eq!(g.score, 0.0);
        assert_eq!(g.comment, FALLBACK_COMMENT);
        assert_eq!(g.color(), Color::Red);
    }

    #[test]
    fn test_odd_comment_shape_keeps_the_score() {
        let g = parse_grade(r#"{"score": 8, "comment": ["good", "clear"]}"#);
        assert!(!g.fallback);
        assert_eq!(g.score, 8.0);
        assert_eq!(g.comment, "good clear");

        let g = parse_grade(r#"{"score": 6, "comment": {"note": "partial"}}"#);
        assert_eq!(g.score, 6.0);
        assert!(g.comment.contains("partial"));

        let g = parse_grade(r#"{"score": 4, "comment": null}"#);
        assert_eq!(g.score, 4.0);
        assert_eq!(g.comment, "");
    }

    #[test]
    fn test_parse_non_numeric_score_falls_back() {
        assert!(parse_grade(r#"{"score": "excellent", "comment": "great"}"#).fallback);
    }

    #[tokio::test]
    async fn test_n_plus_one_reaches_top_tier() {
        let config = test_config();
        let llm = FixedLlm::new(
            "```json\n{\"score\": 10, \"comment\": \"Correct, complete and well explained.\"}\n```",
        );

        let g = grade(
            &llm,
            "Write a function that returns n+1",
            "def f(n): return n+1 — this is correct because it adds one",
            &config.llm,
            &config.grading,
        )
        .await
        .unwrap();

        assert!((9.0..=10.0).contains(&g.score));
        assert_eq!(g.color(), Color::Green);

        let calls = llm.calls();
        assert_eq!(calls[0].temperature, config.grading.temperature);
        assert!(calls[0].messages[1].content.contains("return n+1"));
    }

    #[tokio::test]
    async fn test_grade_propagates_transport_errors() {
        let config = test_config();
        let result = grade(&FailingLlm, "s", "a", &config.llm, &config.grading).await;
        assert!(result.is_err());
    }
}
