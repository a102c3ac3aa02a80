use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;
use crate::{
    error::{AppError, Result},
    models::scheduled_post::{ScheduleStatus, ScheduledPost},
};

/// A helper function to map a `tokio_postgres::Row` to a `ScheduledPost`.
fn row_to_scheduled_post(row: &Row) -> Result<ScheduledPost> {
    let status_raw: String = row.try_get("status")?;
    let status = ScheduleStatus::parse(&status_raw).ok_or_else(|| {
        AppError::Internal(format!("unknown scheduled post status '{}'", status_raw))
    })?;
    Ok(ScheduledPost {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        caption: row.try_get("caption")?,
        image_filename: row.try_get("image_filename")?,
        scheduled_time: row.try_get("scheduled_time")?,
        platform: row.try_get("platform")?,
        status,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

/// Creates a scheduled post in the `scheduled` state.
pub async fn create(
    pool: &Pool,
    user_id: &Uuid,
    caption: &str,
    image_filename: Option<&str>,
    scheduled_time: &DateTime<Utc>,
    platform: &str,
) -> Result<ScheduledPost> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            INSERT INTO scheduled_posts (user_id, caption, image_filename, scheduled_time, platform)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
            &[&user_id, &caption, &image_filename, &scheduled_time, &platform],
        )
        .await?;
    row_to_scheduled_post(&row)
}

/// Lists a user's scheduled posts, soonest first.
pub async fn list_for_user(pool: &Pool, user_id: &Uuid) -> Result<Vec<ScheduledPost>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            r#"
            SELECT *
            FROM scheduled_posts
            WHERE user_id = $1
            ORDER BY scheduled_time ASC
            "#,
            &[&user_id],
        )
        .await?;
    rows.iter().map(row_to_scheduled_post).collect()
}

/// Finds one of the user's scheduled posts by id.
pub async fn find_for_user(
    pool: &Pool,
    user_id: &Uuid,
    post_id: &Uuid,
) -> Result<Option<ScheduledPost>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT *
            FROM scheduled_posts
            WHERE id = $1 AND user_id = $2
            "#,
            &[&post_id, &user_id],
        )
        .await?;
    row.map(|r| row_to_scheduled_post(&r)).transpose()
}

/// Deletes one of the user's scheduled posts. Returns `false` when no owned
/// row matched.
pub async fn delete_for_user(pool: &Pool, user_id: &Uuid, post_id: &Uuid) -> Result<bool> {
    let client = pool.get().await?;
    let deleted = client
        .execute(
            r#"
            DELETE FROM scheduled_posts
            WHERE id = $1 AND user_id = $2
            "#,
            &[&post_id, &user_id],
        )
        .await?;
    Ok(deleted > 0)
}

/// Fetches every post still `scheduled` whose time falls on or before the
/// cutoff. The caller computes the cutoff as now plus the lookahead window.
pub async fn due_before(pool: &Pool, cutoff: &DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            r#"
            SELECT *
            FROM scheduled_posts
            WHERE status = 'scheduled' AND scheduled_time <= $1
            ORDER BY scheduled_time ASC
            "#,
            &[&cutoff],
        )
        .await?;
    rows.iter().map(row_to_scheduled_post).collect()
}

/// Flags a post as waiting on an OTP challenge. Guarded so only a
/// still-`scheduled` post can move; completed and failed posts stay put.
pub async fn mark_otp_required(pool: &Pool, post_id: &Uuid, message: &str) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            r#"
            UPDATE scheduled_posts
            SET status = 'otp_required', error_message = $2
            WHERE id = $1 AND status = 'scheduled'
            "#,
            &[&post_id, &message],
        )
        .await?;
    Ok(())
}

/// Finalizes a post as published.
pub async fn mark_completed(pool: &Pool, post_id: &Uuid) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            r#"
            UPDATE scheduled_posts
            SET status = 'completed', error_message = NULL, completed_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'scheduled'
            "#,
            &[&post_id],
        )
        .await?;
    Ok(())
}

/// Finalizes a post as failed with the error detail. Failed posts are never
/// retried; resubmission takes a new schedule request.
pub async fn mark_failed(pool: &Pool, post_id: &Uuid, error: &str) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            r#"
            UPDATE scheduled_posts
            SET status = 'failed', error_message = $2
            WHERE id = $1 AND status = 'scheduled'
            "#,
            &[&post_id, &error],
        )
        .await?;
    Ok(())
}

/// Revives an `otp_required` post after its challenge was resolved, due
/// immediately. Returns `false` when the post was not waiting on a code.
pub async fn reset_after_otp(pool: &Pool, user_id: &Uuid, post_id: &Uuid) -> Result<bool> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            r#"
            UPDATE scheduled_posts
            SET status = 'scheduled', scheduled_time = NOW(), error_message = NULL
            WHERE id = $1 AND user_id = $2 AND status = 'otp_required'
            "#,
            &[&post_id, &user_id],
        )
        .await?;
    Ok(updated > 0)
}
