//! Image and caption generation, points accounting included.
//!
//! A fresh generation costs points; regenerating from the history viewer is
//! free. The points check runs before the upstream call and the debit runs
//! after the artifacts are on disk, both guarded so a concurrent spend can
//! never push the balance negative.

use base64::{engine::general_purpose::STANDARD, Engine};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::genai;
use crate::models::session::GenerationEntry;
use crate::models::user::PointsSnapshot;
use crate::repositories::activity as activity_repo;
use crate::repositories::user as user_repo;
use crate::state::AppState;
use crate::storage;

/// Points debited for one fresh generation.
pub const GENERATION_COST: i32 = 5;

/// Everything a generation produces for the client.
pub struct GenerationResult {
    /// The history entry for this generation.
    pub entry: GenerationEntry,
    /// The stored image, base64 encoded for the response body.
    pub image_b64: String,
    /// The balance after accounting.
    pub points: PointsSnapshot,
}

/// Runs one generation end to end: upstream call, artifact storage, the
/// debit and the activity record.
pub async fn run(
    state: &AppState,
    user_id: &Uuid,
    prompt: &str,
    tone: &str,
    content_type: &str,
    is_regeneration: bool,
) -> Result<GenerationResult> {
    if !is_regeneration {
        let points = user_repo::get_points(&state.db, user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if points.available < GENERATION_COST {
            return Err(AppError::InsufficientPoints);
        }
    }

    let full_prompt = format!(
        "Generate a {} {} for: {}. Provide an Instagram caption with 3 hashtags.",
        tone, content_type, prompt
    );
    tracing::info!("Sending prompt to generative API: {}", full_prompt);

    let content = state.genai.generate(&full_prompt).await?;

    let caption = match content.caption {
        Some(caption) => caption,
        None => {
            tracing::warn!("No caption generated for prompt: {}", full_prompt);
            genai::fallback_caption(prompt)
        }
    };

    let (filename, _checksum) =
        storage::save_image(&state.config.media_root, user_id, &content.image).await?;
    let caption_filename = storage::save_caption_sidecar(
        &state.config.media_root,
        user_id,
        &filename,
        prompt,
        &caption,
    )
    .await?;

    let (points, cost) = if is_regeneration {
        let points = user_repo::get_points(&state.db, user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        (points, 0)
    } else {
        let points = user_repo::debit_points(&state.db, user_id, GENERATION_COST)
            .await?
            .ok_or(AppError::InsufficientPoints)?;
        (points, GENERATION_COST)
    };

    activity_repo::create_activity(
        &state.db,
        user_id,
        prompt,
        &filename,
        &caption,
        &caption_filename,
        cost,
    )
    .await?;

    tracing::info!(
        "✅ Generated {} for user {} ({} points left)",
        filename,
        user_id,
        points.available
    );

    Ok(GenerationResult {
        entry: GenerationEntry {
            filename,
            caption,
            prompt: prompt.to_string(),
        },
        image_b64: STANDARD.encode(&content.image),
        points,
    })
}
