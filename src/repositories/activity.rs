use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;
use crate::{error::Result, models::activity::Activity};

/// A helper function to map a `tokio_postgres::Row` to an `Activity`.
fn row_to_activity(row: &Row) -> Result<Activity> {
    Ok(Activity {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        prompt: row.try_get("prompt")?,
        image_filename: row.try_get("image_filename")?,
        generated_caption: row.try_get("generated_caption")?,
        modified_caption: row.try_get("modified_caption")?,
        caption_filename: row.try_get("caption_filename")?,
        points_used: row.try_get("points_used")?,
        was_downloaded: row.try_get("was_downloaded")?,
        was_posted: row.try_get("was_posted")?,
        download_time: row.try_get("download_time")?,
        post_time: row.try_get("post_time")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Creates the activity row for a fresh generation.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `user_id` - The owner of the artifact.
/// * `prompt` - The prompt that produced it.
/// * `image_filename` - The stored image filename.
/// * `generated_caption` - The caption the model produced.
/// * `caption_filename` - The caption sidecar filename.
/// * `points_used` - Points spent on this generation (0 for regenerations).
///
/// # Returns
///
/// A `Result` containing the created `Activity`.
pub async fn create_activity(
    pool: &Pool,
    user_id: &Uuid,
    prompt: &str,
    image_filename: &str,
    generated_caption: &str,
    caption_filename: &str,
    points_used: i32,
) -> Result<Activity> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            INSERT INTO activities (
                user_id, prompt, image_filename, generated_caption,
                caption_filename, points_used
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
            &[
                &user_id,
                &prompt,
                &image_filename,
                &generated_caption,
                &caption_filename,
                &points_used,
            ],
        )
        .await?;
    row_to_activity(&row)
}

/// Finds the activity tying a filename to its owner. This lookup is the
/// authorization gate for every file operation: `None` means the caller
/// does not own the filename.
pub async fn find_owned(
    pool: &Pool,
    user_id: &Uuid,
    image_filename: &str,
) -> Result<Option<Activity>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT *
            FROM activities
            WHERE user_id = $1 AND image_filename = $2
            "#,
            &[&user_id, &image_filename],
        )
        .await?;
    row.map(|r| row_to_activity(&r)).transpose()
}

/// Lists the user's most recent activities, newest first.
pub async fn recent(pool: &Pool, user_id: &Uuid, limit: i64) -> Result<Vec<Activity>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            r#"
            SELECT *
            FROM activities
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            &[&user_id, &limit],
        )
        .await?;
    rows.iter().map(row_to_activity).collect()
}

/// Marks an activity posted with the caption that actually went out.
/// Returns `false` when no owned row matched.
pub async fn mark_posted(
    pool: &Pool,
    user_id: &Uuid,
    image_filename: &str,
    caption: &str,
) -> Result<bool> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            r#"
            UPDATE activities
            SET was_posted = TRUE,
                post_time = CURRENT_TIMESTAMP,
                modified_caption = $3,
                updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $1 AND image_filename = $2
            "#,
            &[&user_id, &image_filename, &caption],
        )
        .await?;
    Ok(updated > 0)
}

/// Marks an activity downloaded. Returns `false` when no owned row matched.
pub async fn mark_downloaded(pool: &Pool, user_id: &Uuid, image_filename: &str) -> Result<bool> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            r#"
            UPDATE activities
            SET was_downloaded = TRUE,
                download_time = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $1 AND image_filename = $2
            "#,
            &[&user_id, &image_filename],
        )
        .await?;
    Ok(updated > 0)
}

/// Stores a user-edited caption and the sidecar it was written to.
pub async fn update_caption(
    pool: &Pool,
    user_id: &Uuid,
    image_filename: &str,
    modified_caption: &str,
    caption_filename: &str,
) -> Result<bool> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            r#"
            UPDATE activities
            SET modified_caption = $3,
                caption_filename = $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $1 AND image_filename = $2
            "#,
            &[&user_id, &image_filename, &modified_caption, &caption_filename],
        )
        .await?;
    Ok(updated > 0)
}
