use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::session::Session,
    services::session_store,
    state::AppState,
};

/// A live session together with the id it is stored under.
///
/// Inserted into request extensions by [`require_auth`] so handlers can
/// both read the session and write it back after mutating the history.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub session: Session,
}

/// Extracts the session token from the request cookies.
///
/// # Arguments
///
/// * `cookies` - The request cookies.
///
/// # Returns
///
/// An `Option` containing the session ID if found.
fn extract_session_token(cookies: &Cookies) -> Option<Uuid> {
    cookies
        .get(session_store::SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// A middleware that requires a valid session to be present.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or an error `AppError`.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let session_id = extract_session_token(&cookies).ok_or_else(|| {
        tracing::debug!("❌ No session_id cookie found");
        AppError::Unauthorized
    })?;

    tracing::debug!("🔑 Found session_id: {}", session_id);

    let session = session_store::load(&state, session_id)
        .await?
        .ok_or_else(|| {
            tracing::debug!("❌ Session not found in Redis: {}", session_id);
            AppError::Unauthorized
        })?;

    if chrono::Utc::now() > session.expires_at {
        tracing::warn!("❌ Session expired for user: {}", session.user_id);
        session_store::destroy(&state, session_id).await;
        return Err(AppError::Unauthorized);
    }

    tracing::debug!("✅ User authenticated: {}", session.user_id);

    request.extensions_mut().insert(SessionHandle {
        id: session_id,
        session,
    });

    Ok(next.run(request).await)
}
