use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use tokio::sync::broadcast;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod config;
mod db;
mod dto;
mod engine;
mod error;
mod handlers;
mod models;
mod services;

use auth::rate_limit::RateLimitState;
use config::Config;
use engine::Engine;
use services::remote_sync::RemoteStatsClient;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub engine: Engine,
    pub remote: RemoteStatsClient,
    pub ws_tx: broadcast::Sender<String>,
    pub rate_limiter: RateLimitState,
}

impl AppState {
    fn new(db: PgPool, config: Arc<Config>) -> anyhow::Result<Self> {
        let engine = Engine::new(config.remote_platform.clone(), config.baseline_daily_target);
        let remote = RemoteStatsClient::new(
            &config.remote_stats_url,
            &config.remote_platform,
            config.remote_timeout_secs,
        )?;
        let (ws_tx, _) = broadcast::channel::<String>(256);

        Ok(Self {
            db,
            config,
            engine,
            remote,
            ws_tx,
            rate_limiter: RateLimitState::new(),
        })
    }
}

fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_auth,
        ));

    // Security-answer guesses get their own, tighter budget
    let recovery_routes = Router::new()
        .route(
            "/api/auth/recovery/question",
            post(handlers::auth::security_question),
        )
        .route(
            "/api/auth/recovery/reset",
            post(handlers::auth::reset_password),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_recovery,
        ));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .route("/ws", get(handlers::ws::ws_handler))
        .merge(recovery_routes)
        .merge(auth_routes);

    let protected_routes = Router::new()
        // Account
        .route("/api/me", get(handlers::auth::me))
        .route("/api/me/security", put(handlers::auth::update_security))
        .route("/api/account", delete(handlers::auth::delete_account))
        .route("/api/auth/logout", post(handlers::auth::logout))
        // Progress
        .route("/api/state", get(handlers::state::get_state))
        .route("/api/progress/manual", post(handlers::progress::manual_increment))
        .route("/api/sync", post(handlers::progress::sync))
        .route("/api/sync/fetch", post(handlers::progress::fetch_and_sync))
        .route("/api/target/miss", post(handlers::progress::record_miss))
        .route("/api/target/reset", post(handlers::progress::reset_target))
        // Goals
        .route(
            "/api/goals",
            get(handlers::goals::list_goals).post(handlers::goals::create_goal),
        )
        .route(
            "/api/goals/:id",
            put(handlers::goals::update_goal).delete(handlers::goals::delete_goal),
        )
        // History
        .route("/api/logs", get(handlers::logs::list_logs))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = vec![config
        .frontend_url
        .parse::<HeaderValue>()
        .context("FRONTEND_URL is not a valid origin")?];
    for extra in &config.cors_extra_origins {
        match extra.parse::<HeaderValue>() {
            Ok(hv) => origins.push(hv),
            Err(_) => tracing::warn!(origin = %extra, "Ignoring invalid CORS origin"),
        }
    }

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codestrike_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env()?);

    let db = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations applied");

    let state = AppState::new(db, config.clone())?;
    auth::rate_limit::spawn_cleanup_worker(state.rate_limiter.clone());

    let app = build_router(state)
        .layer(cors_layer(&config)?)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    let addr = config.listen_addr();
    tracing::info!(
        remote_platform = %config.remote_platform,
        baseline_target = config.baseline_daily_target,
        "Starting server on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    // Client IP is needed by the rate limiters
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let config = Arc::new(Config::for_tests());
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        build_router(AppState::new(db, config).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_engine_settings() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["service"], "codestrike-api");
        assert_eq!(json["remote_platform"], "LeetCode");
        assert_eq!(json["baseline_target"], 3);
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let response = test_app()
            .oneshot(Request::get("/api/state").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"]["message"].is_string());
    }

    #[tokio::test]
    async fn test_rejects_refresh_token_as_bearer() {
        let config = Config::for_tests();
        let refresh =
            auth::jwt::create_refresh_token(uuid::Uuid::new_v4(), "a@b.com", &config).unwrap();
        let response = test_app()
            .oneshot(
                Request::post("/api/progress/manual")
                    .header(header::AUTHORIZATION, format!("Bearer {refresh}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"count":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_cors_rejects_bad_frontend_url() {
        let mut config = Config::for_tests();
        config.frontend_url = "bad\norigin".into();
        assert!(cors_layer(&config).is_err());
    }
}
