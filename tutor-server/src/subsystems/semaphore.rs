//! Sliding-window semaphore
//!
//! Colors are recomputed from stored rows on every call. There is no cache:
//! the result depends only on the rows created at or after `now - window`.

use chrono::{DateTime, Duration, Utc};
use tutor_core::config::SemaphoreConfig;
use tutor_core::store::{InteractionStore, StoreError};
use tutor_core::{Color, Interaction};

const RED_PATTERNS: [&str; 2] = ["demand for direct answer", "negative expression"];
const YELLOW_PATTERNS: [&str; 2] = ["off-topic", "expression of incomprehension"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowCounts {
    pub red: usize,
    pub yellow: usize,
    pub total: usize,
}

/// Bucket rows by intent label. A row counted red is never counted yellow.
pub fn count_flags(interactions: &[Interaction]) -> WindowCounts {
    let mut counts = WindowCounts {
        total: interactions.len(),
        ..WindowCounts::default()
    };

    for interaction in interactions {
        let label = interaction.intent.label().to_lowercase();
        if RED_PATTERNS.iter().any(|p| label.contains(p)) {
            counts.red += 1;
        } else if YELLOW_PATTERNS.iter().any(|p| label.contains(p)) {
            counts.yellow += 1;
        }
    }

    counts
}

pub fn color_for_counts(counts: &WindowCounts, config: &SemaphoreConfig) -> Color {
    if counts.red >= config.red_threshold {
        Color::Red
    } else if counts.yellow >= config.yellow_threshold {
        Color::Yellow
    } else {
        Color::Green
    }
}

/// Inclusive start of the window ending at `now`.
pub fn window_start(now: DateTime<Utc>, config: &SemaphoreConfig) -> DateTime<Utc> {
    now - Duration::seconds(config.window_seconds)
}

pub async fn compute_color<S>(
    store: &S,
    identity: &str,
    now: DateTime<Utc>,
    config: &SemaphoreConfig,
) -> Result<Color, StoreError>
where
    S: InteractionStore + ?Sized,
{
    let since = window_start(now, config);
    let rows = store.interactions_since(identity, since).await?;

    if rows.is_empty() {
        return Ok(Color::Green);
    }

    let counts = count_flags(&rows);
    let color = color_for_counts(&counts, config);

    tracing::debug!(
        identity = %identity,
        red = counts.red,
        yellow = counts.yellow,
        total = counts.total,
        color = %color,
        "Semaphore recomputed"
    );

    Ok(color)
}
