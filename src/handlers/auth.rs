use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use tower_cookies::{Cookies, Cookie};
use tower_cookies::cookie::time::Duration;
use uuid::Uuid;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::SessionHandle,
    models::user::{PointsSnapshot, User},
    repositories::user as user_repo,
    services::{auth as auth_service, generation, session_store},
    state::AppState,
    validation::auth::validate_credentials,
};

use redis::AsyncCommands;

/// The request payload for user signup.
#[derive(Deserialize, Debug)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub referral_code: Option<String>,
}

/// The request payload for user login.
#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// The response payload for a successful signup.
#[derive(Serialize)]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
    pub referral_code: String,
    pub points: PointsSnapshot,
}

/// The response payload for a successful login.
#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub referral_code: String,
    pub referrals_count: i32,
    pub points: PointsSnapshot,
}

#[derive(Serialize)]
struct AuthStatus {
    authenticated: bool,
}

/// The response payload for an authenticated session check.
#[derive(Serialize)]
pub struct CheckAuthResponse {
    pub authenticated: bool,
    pub username: String,
    pub referral_code: String,
    pub referrals_count: i32,
    pub is_premium: bool,
    pub points: PointsSnapshot,
}

/// The response payload for the usage widget.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub success: bool,
    pub referral_code: String,
    pub total_points: i32,
    pub points_used: i32,
    pub available_points: i32,
    pub referrals_count: i32,
    pub free_generations: i32,
}

#[derive(Serialize)]
struct LogoutResponse {
    success: bool,
    message: String,
}

/// Creates a secure cookie with the given name, value, and max age.
fn create_secure_cookie(name: String, value: String, max_age_days: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(name.clone(), value);

    let is_production = std::env::var("APP_ENV")
        .unwrap_or_else(|_| "development".to_string()) == "production";

    if name != "csrf_token" {
        cookie.set_http_only(true);
    }

    if is_production {
        cookie.set_secure(true);
    }

    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    let duration_secs = max_age_days * 86400;
    cookie.set_max_age(Duration::seconds(duration_secs));
    cookie.set_path("/");

    cookie
}

/// Creates the Redis-backed session plus a CSRF token and attaches both
/// cookies to the response.
async fn issue_session_cookies(state: &AppState, cookies: &Cookies, user: &User) -> Result<()> {
    let (session_id, _session) = session_store::create(state, user).await?;

    let session_cookie = create_secure_cookie(
        session_store::SESSION_COOKIE.to_string(),
        session_id.to_string(),
        state.config.session_duration_days,
    );
    cookies.add(session_cookie);
    tracing::info!("✅ Session cookie added: session_id={}", session_id);

    let csrf_token = crate::crypto::csrf::generate_csrf_token()?;
    tracing::debug!("🔐 Generated CSRF token: {}", &csrf_token[..20.min(csrf_token.len())]);

    let mut redis = state.redis.clone();
    let _: () = redis
        .set_ex(format!("csrf:{}", csrf_token), "valid", 3600)
        .await
        .map_err(|e| {
            tracing::error!("❌ Redis set_ex failed para CSRF: {}", e);
            AppError::Redis(e)
        })?;

    let csrf_cookie = create_secure_cookie("csrf_token".to_string(), csrf_token, 1);
    cookies.add(csrf_cookie);
    tracing::info!("✅ CSRF cookie added");

    Ok(())
}

/// Handles user signup.
#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<SignupRequest>,
) -> Result<Response> {
    let username = payload.username.as_deref().unwrap_or("");
    let password = payload.password.as_deref().unwrap_or("");
    tracing::info!("📝 Signup attempt for username: {}", username);

    validate_credentials(username, password)?;

    let (user, points) = auth_service::signup(
        &state,
        username,
        password,
        payload.referral_code.as_deref(),
    )
    .await?;

    tracing::info!("✅ User registered: {}", user.id);

    issue_session_cookies(&state, &cookies, &user).await?;

    let response = SignupResponse {
        success: true,
        message: "Signup successful!".to_string(),
        referral_code: user.referral_code,
        points,
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles user login.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    let username = payload.username.as_deref().unwrap_or("");
    let password = payload.password.as_deref().unwrap_or("");
    tracing::info!("🔐 Login attempt for username: {}", username);

    let user = auth_service::login(&state, username, password).await?;

    issue_session_cookies(&state, &cookies, &user).await?;
    tracing::info!("✅ User logged in: {}", user.id);

    let points = user.points();
    let response = LoginResponse {
        success: true,
        message: "Login successful!".to_string(),
        referral_code: user.referral_code,
        referrals_count: user.referrals_count,
        points,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Reports whether the request carries a live session, with the account
/// summary the client shell renders.
#[axum::debug_handler]
pub async fn check_auth(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Response> {
    fn denied() -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(AuthStatus { authenticated: false }),
        )
            .into_response()
    }

    let Some(session_id) = cookies
        .get(session_store::SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
    else {
        return Ok(denied());
    };

    let Some(session) = session_store::load(&state, session_id).await? else {
        return Ok(denied());
    };

    if chrono::Utc::now() > session.expires_at {
        session_store::destroy(&state, session_id).await;
        return Ok(denied());
    }

    let Some(user) = user_repo::find_by_id(&state.db, &session.user_id).await? else {
        return Ok(denied());
    };

    let points = user.points();
    let response = CheckAuthResponse {
        authenticated: true,
        username: session.username,
        referral_code: user.referral_code,
        referrals_count: user.referrals_count,
        is_premium: user.is_premium,
        points,
    };

    Ok(Json(response).into_response())
}

/// Reports the point balance and referral stats for the usage widget.
#[axum::debug_handler]
pub async fn usage(
    State(state): State<AppState>,
    Extension(handle): Extension<SessionHandle>,
) -> Result<Response> {
    let user = user_repo::find_by_id(&state.db, &handle.session.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let points = user.points();
    let response = UsageResponse {
        success: true,
        referral_code: user.referral_code,
        total_points: points.total,
        points_used: points.used,
        available_points: points.available,
        referrals_count: user.referrals_count,
        free_generations: points.available / generation::GENERATION_COST,
    };

    Ok(Json(response).into_response())
}

/// Handles user logout. Succeeds whether or not a live session is present.
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Response> {
    if let Some(session_id) = cookies
        .get(session_store::SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
    {
        tracing::info!("👋 Logout for session: {}", session_id);
        session_store::destroy(&state, session_id).await;
    }

    if let Some(csrf_cookie) = cookies.get("csrf_token") {
        let csrf_token = csrf_cookie.value();
        let mut redis = state.redis.clone();
        let _: () = redis
            .del(format!("csrf:{}", csrf_token))
            .await
            .unwrap_or(());
        tracing::info!("✅ CSRF token deleted from Redis");
    }

    let mut session_cookie = Cookie::new(session_store::SESSION_COOKIE, "");
    session_cookie.set_max_age(Duration::seconds(0));
    session_cookie.set_path("/");
    cookies.remove(session_cookie);

    let mut csrf_cookie = Cookie::new("csrf_token", "");
    csrf_cookie.set_max_age(Duration::seconds(0));
    csrf_cookie.set_path("/");
    cookies.remove(csrf_cookie);

    let response = LogoutResponse {
        success: true,
        message: "Logged out".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
