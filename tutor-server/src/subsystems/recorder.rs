//! Interaction recorder
//!
//! Rows are inserted green and later stamped once with the window color.

use tutor_core::store::{InteractionStore, StoreError};
use tutor_core::{Color, Dimension, Intent, Interaction, NewInteraction};
use uuid::Uuid;

/// Insert a classified message with a provisional green color.
pub async fn record<S>(
    store: &S,
    chat_id: Uuid,
    identity: &str,
    intent: Intent,
    dimension: Dimension,
) -> Result<Interaction, StoreError>
where
    S: InteractionStore + ?Sized,
{
    let interaction = store
        .insert_interaction(NewInteraction {
            identity: identity.to_string(),
            source_chat_id: chat_id,
            intent,
            dimension,
            color: Color::Green,
        })
        .await?;

    tracing::debug!(
        interaction_id = %interaction.id,
        identity = %identity,
        intent = %intent,
        "Interaction recorded"
    );

    Ok(interaction)
}

/// Stamp one row with its final color. A missing row is a no-op.
pub async fn finalize_color<S>(store: &S, id: Uuid, color: Color) -> Result<bool, StoreError>
where
    S: InteractionStore + ?Sized,
{
    let updated = store.set_interaction_color(id, color).await?;
    if !updated {
        tracing::warn!(interaction_id = %id, "Interaction not found when finalizing color");
    }
    Ok(updated)
}
