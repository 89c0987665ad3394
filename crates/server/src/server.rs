//! Server initialization and routing
//!
//! - Router configuration with all API endpoints
//! - Middleware stack (auth, logging, compression, timeouts)
//! - Periodic catalog refresh
//! - Graceful shutdown handling

use crate::config::ServerConfig;
use crate::middleware::{api_key_auth, log_requests, request_id};
use crate::routes::{api_info, categorize, health, not_found, refresh};
use crate::state::ServerState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use titlecat::{RefreshCoordinator, RefreshOutcome, Titlecat};

/// Build the router with all routes and middleware.
///
/// Public routes are `/`, `/health` and `/ready`. Everything under
/// `/api/v1` needs an API key.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let public_routes = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check));

    let protected_routes = Router::new()
        .route("/api/v1/categorize", post(categorize::categorize_titles))
        .route("/api/v1/refresh", post(refresh::trigger_refresh))
        .route("/api/v1/metadata", get(health::server_metadata))
        .layer(from_fn_with_state(state.clone(), api_key_auth));

    let router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http());

    with_security_headers(router).with_state(state)
}

/// Headers stamped on every response, errors and fallbacks included.
pub const SECURITY_HEADERS: [(HeaderName, &str); 6] = [
    (
        header::CONTENT_SECURITY_POLICY,
        "default-src 'none'; frame-ancestors 'none'",
    ),
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
    (header::X_XSS_PROTECTION, "1; mode=block"),
    (header::REFERRER_POLICY, "no-referrer"),
    (
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=31536000; includeSubDomains",
    ),
];

fn with_security_headers(router: Router<Arc<ServerState>>) -> Router<Arc<ServerState>> {
    SECURITY_HEADERS
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(
                name,
                HeaderValue::from_static(value),
            ))
        })
}

/// Drive `refresh` on its configured interval until the task is aborted.
///
/// The first tick fires immediately, so `run_on_startup` decides whether the
/// catalog is loaded at boot or only after one full interval.
pub fn spawn_refresh_loop(refresh: Arc<RefreshCoordinator>) -> JoinHandle<()> {
    let config = refresh.config().clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !config.run_on_startup {
            ticker.tick().await;
        }

        loop {
            ticker.tick().await;
            match refresh.refresh().await {
                Ok(RefreshOutcome::Published(report)) => {
                    tracing::debug!(version = report.version, "scheduled refresh published");
                }
                Ok(RefreshOutcome::Skipped) => {
                    tracing::debug!("scheduled refresh skipped; one is already running");
                }
                // The coordinator has logged it; the next tick retries.
                Err(_) => {}
            }
        }
    })
}

/// Start the titlecat HTTP server.
///
/// Loads the core configuration, assembles the categorization core, starts
/// the refresh loop and serves until SIGTERM or Ctrl+C.
///
/// ```rust,no_run
/// use server::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load()?;
///     server::start_server(config).await?;
///     Ok(())
/// }
/// ```
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .try_init();

    let core_config = config.load_titlecat()?;
    let core = Titlecat::from_config(&core_config).await?;
    let state = Arc::new(ServerState::new(config.clone(), core.clone()));

    let refresh_task = config
        .refresh_loop_enabled
        .then(|| spawn_refresh_loop(Arc::clone(&core.refresh)));

    let app = build_router(state);
    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!(
        %addr,
        api_keys = config.api_keys.len(),
        timeout_secs = config.timeout_secs,
        max_body_size_mb = config.max_body_size_mb,
        rate_limit_per_minute = config.rate_limit_per_minute,
        cors = config.enable_cors,
        refresh_interval_secs = core_config.refresh.interval_secs,
        "starting titlecat server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = refresh_task {
        task.abort();
    }
    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
