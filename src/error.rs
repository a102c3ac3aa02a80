use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A database pool error.
    #[error("Database pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A database pool construction error.
    #[error("Database pool build error: {0}")]
    PoolBuild(#[from] deadpool_postgres::CreatePoolError),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An outbound HTTP error.
    #[error("Upstream HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Signup attempted with a username that already exists.
    #[error("Username already exists")]
    UsernameTaken,

    /// Login attempted for a username that does not exist.
    #[error("User not found")]
    UnknownUser,

    /// Login attempted with the wrong password.
    #[error("Incorrect password")]
    IncorrectPassword,

    /// A request without an active session.
    #[error("Unauthorized")]
    Unauthorized,

    /// An ownership check rejected the request.
    #[error("Access denied")]
    AccessDenied,

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// No platform credentials are stored for the user.
    #[error("Instagram credentials missing")]
    CredentialsMissing,

    /// The platform demanded a verification code before granting a session.
    #[error("OTP challenge required")]
    OtpRequired,

    /// The submitted verification code was rejected.
    #[error("OTP verification failed: {0}")]
    OtpVerificationFailed(String),

    /// The platform rejected the login outright.
    #[error("Platform login failed: {0}")]
    AuthFailed(String),

    /// The generative API or the platform bridge misbehaved.
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// The user does not have enough points for the operation.
    #[error("Not enough points")]
    InsufficientPoints,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An encryption error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// A rate limit exceeded error.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    sonic_rs::json!({ "error": "Database error" }),
                )
            }

            AppError::Pool(ref e) => {
                tracing::error!("Database pool error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    sonic_rs::json!({ "error": "Database error" }),
                )
            }

            AppError::PoolBuild(ref e) => {
                tracing::error!("Database pool build error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    sonic_rs::json!({ "error": "Database error" }),
                )
            }

            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    sonic_rs::json!({ "error": "Cache error" }),
                )
            }

            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    sonic_rs::json!({ "error": "File system error" }),
                )
            }

            AppError::Http(ref e) => {
                tracing::error!("Upstream HTTP error: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    sonic_rs::json!({ "error": "Upstream service error" }),
                )
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, sonic_rs::json!({ "error": msg }))
            }

            AppError::UsernameTaken => {
                tracing::debug!("Signup refused: username already exists");
                (
                    StatusCode::CONFLICT,
                    sonic_rs::json!({
                        "success": false,
                        "message": "Username already exists. Please login."
                    }),
                )
            }

            AppError::UnknownUser => {
                tracing::debug!("Login refused: unknown username");
                (
                    StatusCode::NOT_FOUND,
                    sonic_rs::json!({
                        "success": false,
                        "message": "User not found. Please sign up first."
                    }),
                )
            }

            AppError::IncorrectPassword => {
                tracing::warn!("Login refused: incorrect password");
                (
                    StatusCode::UNAUTHORIZED,
                    sonic_rs::json!({
                        "success": false,
                        "message": "Incorrect password."
                    }),
                )
            }

            AppError::Unauthorized => {
                tracing::debug!("Request without an active session");
                (
                    StatusCode::UNAUTHORIZED,
                    sonic_rs::json!({ "error": "Unauthorized" }),
                )
            }

            AppError::AccessDenied => {
                tracing::warn!("Access denied by ownership check");
                (
                    StatusCode::FORBIDDEN,
                    sonic_rs::json!({ "error": "Access denied" }),
                )
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (
                    StatusCode::NOT_FOUND,
                    sonic_rs::json!({ "error": "Resource not found" }),
                )
            }

            AppError::CredentialsMissing => {
                tracing::warn!("Publish attempted without stored platform credentials");
                (
                    StatusCode::BAD_REQUEST,
                    sonic_rs::json!({ "error": "Instagram credentials missing" }),
                )
            }

            // Not a terminal failure: the client is expected to collect a
            // verification code and call the resume endpoint next.
            AppError::OtpRequired => {
                tracing::info!("📲 OTP challenge required, asking client for a code");
                (
                    StatusCode::UNAUTHORIZED,
                    sonic_rs::json!({
                        "success": false,
                        "require_otp": true,
                        "message": "OTP verification required"
                    }),
                )
            }

            AppError::OtpVerificationFailed(ref msg) => {
                tracing::warn!("OTP verification failed: {}", msg);
                (
                    StatusCode::UNAUTHORIZED,
                    sonic_rs::json!({ "error": format!("OTP verification failed: {}", msg) }),
                )
            }

            AppError::AuthFailed(ref msg) => {
                tracing::warn!("Platform login failed: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    sonic_rs::json!({ "error": format!("Login failed: {}", msg) }),
                )
            }

            AppError::Upstream(ref msg) => {
                tracing::error!("Upstream service error: {}", msg);
                (StatusCode::BAD_GATEWAY, sonic_rs::json!({ "error": msg }))
            }

            AppError::InsufficientPoints => {
                tracing::debug!("Generation refused: not enough points");
                (
                    StatusCode::PAYMENT_REQUIRED,
                    sonic_rs::json!({
                        "success": false,
                        "message": "Not enough points",
                        "code": "INSUFFICIENT_POINTS"
                    }),
                )
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, sonic_rs::json!({ "error": msg }))
            }

            AppError::Encryption(ref msg) => {
                tracing::error!("Encryption error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    sonic_rs::json!({ "error": "Encryption error" }),
                )
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    sonic_rs::json!({ "error": "Internal server error" }),
                )
            }

            AppError::RateLimitExceeded(ref msg) => {
                tracing::warn!("Rate limit exceeded: {}", msg);
                (StatusCode::TOO_MANY_REQUESTS, sonic_rs::json!({ "error": msg }))
            }
        };

        let body = sonic_rs::to_string(&body)
            .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}
