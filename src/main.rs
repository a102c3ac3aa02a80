use axum::{
    Router,
    routing::{get, post, delete},
    middleware::from_fn_with_state,
    extract::DefaultBodyLimit,
};

use http::{Method, header};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::{
    services::ServeDir,
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, DefaultOnFailure},
    cors::CorsLayer,
};

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod state;
mod db;
mod genai;
mod scheduler;
mod storage;
mod crypto {
    pub mod csrf;
    pub mod vault;
}

mod models {
    pub mod activity;
    pub mod scheduled_post;
    pub mod session;
    pub mod user;
}

mod platform {
    pub mod bridge;
    pub mod client;
    #[cfg(test)]
    pub mod mock;
}

mod repositories {
    pub mod activity;
    pub mod scheduled_post;
    pub mod user;
}

mod services {
    pub mod auth;
    pub mod challenge;
    pub mod generation;
    pub mod platform_session;
    pub mod publish;
    pub mod session_store;
}

mod handlers {
    pub mod activity;
    pub mod auth;
    pub mod generate;
    pub mod publish;
    pub mod schedule;
}

mod middleware_layer {
    pub mod auth;
    pub mod csrf;
    pub mod rate_limit;
}

mod validation {
    pub mod auth;
    pub mod media;
    pub mod schedule;
}

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized with optimized pools");

    db::init_schema(&state.db).await?;

    let cors = CorsLayer::new()
        .allow_origin([
            "http://localhost:3000".parse().unwrap(),
            "http://127.0.0.1:3000".parse().unwrap(),
            "http://[::1]:3000".parse().unwrap(),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
            "x-csrf-token".parse().unwrap(),
        ])
        .allow_credentials(true)
        .expose_headers(["x-csrf-token".parse().unwrap()])
        .max_age(Duration::from_secs(86400));

    let protected_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10_000)
            .burst_size(50_000)
            .use_headers()
            .finish()
            .unwrap(),
    );

    let signup_routes = Router::new()
        .route("/api/signup", post(handlers::auth::signup))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_signup,
        ))
        .with_state(state.clone());

    let login_routes = Router::new()
        .route("/api/login", post(handlers::auth::login))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_login,
        ))
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/api/check-auth", get(handlers::auth::check_auth))
        .route("/api/logout", post(handlers::auth::logout))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/generate", post(handlers::generate::generate))
        .route("/api/back", post(handlers::generate::back))
        .route("/api/forward", post(handlers::generate::forward))
        .route("/api/post", post(handlers::publish::post))
        .route("/api/verify-otp", post(handlers::publish::verify_otp))
        .route(
            "/api/ig-session/prepare",
            post(handlers::publish::prepare_session),
        )
        .route(
            "/api/ig-session/verify",
            post(handlers::publish::verify_session),
        )
        .route(
            "/api/verify-scheduled-otp",
            post(handlers::schedule::verify_scheduled_otp),
        )
        .route("/api/usage", get(handlers::auth::usage))
        .route("/api/get-image", get(handlers::activity::get_image))
        .route("/api/get-caption", get(handlers::activity::get_caption))
        .route("/api/history", get(handlers::activity::history))
        .route(
            "/api/update_caption",
            post(handlers::activity::update_caption),
        )
        .route(
            "/api/record-download",
            post(handlers::activity::record_download),
        )
        .route(
            "/api/scheduled-posts",
            get(handlers::schedule::list_scheduled),
        )
        .route("/api/schedule-post", post(handlers::schedule::schedule_post))
        .route(
            "/api/scheduled-post/{post_id}",
            delete(handlers::schedule::delete_scheduled),
        )
        .layer(tower_governor::GovernorLayer::new(
            protected_governor_conf.clone(),
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::csrf::verify_csrf,
        ))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    let app = Router::new()
        .merge(signup_routes)
        .merge(login_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
        .layer(cors)
        .fallback_service(ServeDir::new("public"));

    let scheduler_state = state.clone();
    tokio::spawn(scheduler::run(scheduler_state));

    let addr = SocketAddr::from(([127, 0, 0, 1], state.config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);
    tracing::info!("✅ Scheduled delivery loop started");
    tracing::info!("✅ All systems operational");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
