use chrono::Utc;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{session::Session, user::User},
    state::AppState,
};

/// Name of the cookie that carries the session id.
pub const SESSION_COOKIE: &str = "session_id";

fn redis_key(session_id: Uuid) -> String {
    format!("session:{}", session_id)
}

/// Creates and persists a fresh session for a user who just signed up or
/// logged in.
pub async fn create(state: &AppState, user: &User) -> Result<(Uuid, Session)> {
    let session_id = Uuid::new_v4();
    tracing::debug!("🔑 Generated session_id: {}", session_id);

    let now = Utc::now();
    let session = Session {
        user_id: user.id,
        username: user.username.clone(),
        history: Default::default(),
        created_at: now,
        expires_at: now + chrono::Duration::days(state.config.session_duration_days),
    };

    save(state, session_id, &session).await?;
    tracing::info!("✅ Session saved to Redis: session:{}", session_id);

    Ok((session_id, session))
}

/// Writes the session back under its key, refreshing the Redis TTL. The
/// `expires_at` inside the blob stays fixed and is the authoritative cutoff.
pub async fn save(state: &AppState, session_id: Uuid, session: &Session) -> Result<()> {
    let session_json = sonic_rs::to_string(session)
        .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;

    let expiration_seconds = (state.config.session_duration_days * 86400) as u64;
    let mut redis = state.redis.clone();
    let _: () = redis
        .set_ex(redis_key(session_id), &session_json, expiration_seconds)
        .await
        .map_err(|e| {
            tracing::error!("❌ Redis set_ex failed: {}", e);
            AppError::Redis(e)
        })?;

    Ok(())
}

/// Fetches the session stored under the id, if any. An unreadable blob is
/// deleted and treated as absent.
pub async fn load(state: &AppState, session_id: Uuid) -> Result<Option<Session>> {
    let mut redis = state.redis.clone();
    let session_json: Option<String> = redis.get(redis_key(session_id)).await?;

    let Some(json) = session_json else {
        return Ok(None);
    };

    match sonic_rs::from_str(&json) {
        Ok(session) => Ok(Some(session)),
        Err(e) => {
            tracing::warn!("❌ Invalid session JSON for {}: {}", session_id, e);
            destroy(state, session_id).await;
            Ok(None)
        }
    }
}

/// Deletes the session from Redis. Failures are logged and swallowed so
/// logout never surfaces a storage error to the user.
pub async fn destroy(state: &AppState, session_id: Uuid) {
    let mut redis = state.redis.clone();
    let result: redis::RedisResult<()> = redis.del(redis_key(session_id)).await;
    if let Err(e) = result {
        tracing::warn!("Failed to delete session {}: {}", session_id, e);
    }
}
