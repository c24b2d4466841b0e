use std::{
    any::Any,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use tcr_core::{
    config::Config,
    ports::{PhotoRelay, RequestLog},
};

use crate::{errors::ApiError, handlers};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub relay: Arc<dyn PhotoRelay>,
    pub request_log: Arc<dyn RequestLog>,
    pub stats: Arc<Stats>,
}

impl AppState {
    pub fn new(cfg: Arc<Config>, relay: Arc<dyn PhotoRelay>, request_log: Arc<dyn RequestLog>) -> Self {
        Self {
            cfg,
            relay,
            request_log,
            stats: Arc::new(Stats::default()),
        }
    }
}

/// Process-lifetime request counters.
#[derive(Debug)]
pub struct Stats {
    started: Instant,
    requests: AtomicU64,
    delivered: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            requests: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub delivered: u64,
    pub rejected: u64,
    pub failed: u64,
    pub uptime_secs: u64,
}

impl Stats {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            uptime_secs: self.uptime_secs(),
        }
    }
}

/// Build the application router: API routes, static fallback and middleware.
pub fn build_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::status::root))
        .route("/health", get(handlers::status::health))
        .route("/bot-info", get(handlers::status::bot_info))
        .route("/api/bot-status", get(handlers::status::bot_info))
        .route("/api/stats", get(handlers::status::stats))
        .route("/api/test", get(handlers::status::api_test))
        .route("/api/send-photo", post(handlers::send_photo::send_photo))
        .fallback_service(ServeDir::new(&state.cfg.static_dir));

    with_middleware(routes, &state.cfg).with_state(state)
}

fn with_middleware(router: Router<AppState>, cfg: &Config) -> Router<AppState> {
    router
        .layer(DefaultBodyLimit::max(cfg.max_body_bytes()))
        .layer(cors_layer(cfg))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

/// CORS from the configured allow-list; `*` disables credentials.
fn cors_layer(cfg: &Config) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if cfg.cors_allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

/// Last line of defence: a panicking handler becomes a 500, not a dead connection.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "request handler panicked");
    ApiError::Internal(detail).into_response()
}

/// Bind the configured address and serve until `shutdown` is cancelled.
pub async fn serve(state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = state.cfg.listen_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        %addr,
        static_dir = %state.cfg.static_dir.display(),
        allowed_users = ?state.cfg.allowed_users.ids(),
        "camera relay listening"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("server stopped");
    Ok(())
}
