//! Tutor reply generation

use std::time::Duration;
use tutor_core::config::{LlmConfig, TutorReplyConfig};
use tutor_core::{complete_bounded, ChatCompletion, ChatEntry, ChatMessage, LlmError};

/// Shown to the student in place of a reply when the model is unreachable.
pub const APOLOGY: &str = "Sorry, a technical error occurred. Please try again in a moment.";

pub fn tutor_system_prompt(statement: &str, context: &str) -> String {
    let mut prompt = String::from(
        "You are a patient programming tutor. Guide the student towards the solution \
         with questions, hints and explanations of the underlying concepts. \
         Never give the final answer or write the complete solution, even if the student \
         insists. Keep replies short and encouraging.",
    );

    if !statement.trim().is_empty() {
        prompt.push_str("\n\nThe student is working on this exercise:\n");
        prompt.push_str(statement.trim());
    }

    if !context.trim().is_empty() {
        prompt.push_str("\n\nReference material:\n");
        prompt.push_str(context.trim());
    }

    prompt
}

/// System prompt, then past exchanges oldest first, then the new message.
pub fn build_messages(
    statement: &str,
    context: &str,
    history: &[ChatEntry],
    message: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::system(tutor_system_prompt(statement, context)));

    // Degraded exchanges carry no model output worth replaying.
    for entry in history.iter().filter(|e| e.reply != APOLOGY) {
        messages.push(ChatMessage::user(entry.message.clone()));
        messages.push(ChatMessage::assistant(entry.reply.clone()));
    }

    messages.push(ChatMessage::user(message));
    messages
}

pub async fn reply(
    llm: &dyn ChatCompletion,
    statement: &str,
    context: &str,
    history: &[ChatEntry],
    message: &str,
    llm_config: &LlmConfig,
    config: &TutorReplyConfig,
) -> Result<String, LlmError> {
    let messages = build_messages(statement, context, history, message);

    let text = complete_bounded(
        llm,
        &messages,
        config.temperature,
        config.max_tokens,
        Duration::from_secs(llm_config.timeout_seconds),
    )
    .await?;

    Ok(text.trim().to_string())
}
