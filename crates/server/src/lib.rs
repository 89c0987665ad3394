//! titlecat server: HTTP REST API for job-title categorization.
//!
//! Wraps the [`titlecat`] core in an axum router with API-key
//! authentication, per-key rate limiting, a periodic catalog refresh and
//! graceful shutdown.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! Public:
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe, 503 until a catalog snapshot is loaded
//!
//! Protected (API key in `X-API-Key` or `Authorization: Bearer`):
//!
//! - `POST /api/v1/categorize` - Rank job titles against the catalog
//! - `POST /api/v1/refresh` - Rebuild the catalog snapshot now
//! - `GET /api/v1/metadata` - Snapshot and refresh status

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, spawn_refresh_loop, start_server, SECURITY_HEADERS};
pub use state::ServerState;
