use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use claw_office_engine::{Registry, SnapshotStore};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

pub mod api;
pub mod config;
pub mod error;
pub mod realtime;
pub mod simulation;
pub mod token;
pub mod validate;

use config::Config;
use error::ApiError;
use realtime::Hub;
use token::TokenIssuer;

const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

pub struct AppState {
    pub registry: Arc<Registry>,
    pub hub: Arc<Hub>,
    pub tokens: TokenIssuer,
    pub api_token: String,
    pub public_dir: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
}

impl AppState {
    /// Loads the map, opens the snapshot store and builds the registry with
    /// the broadcast hub as its event sink.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let Some(api_token) = cfg.api_token.clone().filter(|t| !t.is_empty()) else {
            anyhow::bail!("an API token is required (api_token, --api-token or CLAW_OFFICE_API_TOKEN)");
        };
        let tokens = match &cfg.realtime_secret {
            Some(secret) => TokenIssuer::new(secret.as_bytes(), cfg.token_ttl()),
            None => TokenIssuer::random(cfg.token_ttl()),
        }
        .map_err(|e| anyhow::anyhow!("realtime secret: {e}"))?;

        let hub = Arc::new(Hub::new(cfg.broadcast_capacity));
        let registry = Registry::open(
            cfg.registry_settings(),
            Arc::new(cfg.load_map()),
            SnapshotStore::new(cfg.db_path()),
            hub.clone(),
        )?;
        Ok(Self {
            registry: Arc::new(registry),
            hub,
            tokens,
            api_token,
            public_dir: cfg.public_dir.clone(),
            allowed_origins: cfg.allowed_origins.clone(),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let public_dir = state.public_dir.clone();
    let cors = office_cors(state.allowed_origins.clone());
    let state = Arc::new(state);

    let control = Router::new()
        .route("/api/bots", get(api::list_bots))
        .route("/api/bots/bind", post(api::bind))
        .route("/api/bots/unbind", post(api::unbind))
        .route("/api/bots/move", post(api::move_bot))
        .route("/api/bots/goto", post(api::goto))
        .route("/api/bots/state", post(api::set_state))
        .route("/api/bots/say", post(api::say))
        .route("/api/bots/task-status", post(api::set_task_status))
        .route("/api/bots/{id}", get(api::get_bot))
        .route("/api/bots/{id}/task-status", get(api::get_task_status))
        .route("/api/map/info", get(api::map_info))
        .route("/api/map/locations", get(api::map_locations))
        .route("/api/map/random-point", get(api::random_point))
        .route("/api/realtime/token", post(api::realtime_token))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_token,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/ws", get(realtime::ws_handler))
        .merge(control);
    if let Some(dir) = public_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }
    app.with_state(state).layer(cors)
}

async fn health() -> &'static str {
    "ok"
}

async fn require_api_token(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    match presented_token(req.headers()) {
        Some(token) if token::constant_time_eq(token, &state.api_token) => next.run(req).await,
        _ => ApiError::unauthorized().into_response(),
    }
}

/// `Authorization: Bearer <token>` or `x-api-key: <token>`.
fn presented_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(v) = headers.get(header::AUTHORIZATION) {
        let v = v.to_str().ok()?;
        return v
            .strip_prefix("Bearer ")
            .or_else(|| v.strip_prefix("bearer "))
            .map(str::trim);
    }
    headers.get(X_API_KEY)?.to_str().ok().map(str::trim)
}

pub async fn serve(cfg: Config) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(cfg.listen).await?;
    serve_listener(listener, cfg, shutdown_signal()).await?;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    cfg: Config,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let state = AppState::from_config(&cfg)?;
    let driver = cfg
        .simulation
        .enabled
        .then(|| tokio::spawn(simulation::Driver::new(state.registry.clone(), &cfg.simulation).run()));

    let app = build_router(state);
    let addr = listener.local_addr()?;
    info!(%addr, "claw-office listening");
    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown).await;
    if let Some(driver) = driver {
        driver.abort();
    }
    served?;
    Ok(addr)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// Browser access is limited to loopback origins plus whatever the operator
/// lists in `allowed_origins`. Never `*`: the API drives bots.
fn office_cors(allowed: Vec<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, X_API_KEY])
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _req| {
            is_allowed_origin(origin, &allowed)
        }))
}

fn is_allowed_origin(origin: &HeaderValue, allowed: &[String]) -> bool {
    let Ok(s) = origin.to_str() else {
        return false;
    };
    if allowed.iter().any(|a| a == s) {
        return true;
    }
    is_http_origin_for_host(s, "localhost") || is_http_origin_for_host(s, "127.0.0.1")
}

fn is_http_origin_for_host(origin: &str, host: &str) -> bool {
    for scheme in ["http://", "https://"] {
        if let Some(rest) = origin.strip_prefix(scheme) {
            if let Some(after) = rest.strip_prefix(host) {
                // scheme://host[:port] only
                return after.is_empty() || after.starts_with(':');
            }
        }
    }
    false
}
