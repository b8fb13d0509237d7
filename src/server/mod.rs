//! # HTTP Bridge Server
//!
//! Serves the method-call [`Bridge`](crate::bridge::Bridge) to host
//! applications as JSON over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! btprinter serve --listen 127.0.0.1:8765
//! ```
//!
//! ```bash
//! curl -s localhost:8765/api/call \
//!      -H 'content-type: application/json' \
//!      -d '{"method":"connectPrinter","arguments":"66:22:B3:0A:11:9C"}'
//! # {"ok":true,"result":"true"}
//! ```
//!
//! ## Endpoints
//!
//! | Route | Description |
//! |-------|-------------|
//! | `POST /api/call` | Dispatch a `{"method", "arguments"}` call |
//! | `GET /api/health` | Server uptime and current connection |

mod handlers;
mod state;

pub use state::{AppState, DEFAULT_LISTEN_ADDR, ServerConfig};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::bridge::Bridge;
use crate::error::PrinterError;
use crate::platform::Platform;
use crate::transport::Adapter;

/// Build the router without binding a socket.
pub fn router<A: Adapter, P: Platform>(state: Arc<AppState<A, P>>) -> Router {
    Router::new()
        .route("/api/call", post(handlers::call::<A, P>))
        .route("/api/health", get(handlers::health::<A, P>))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Start the HTTP server.
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
/// use btprinter::bridge::Bridge;
/// use btprinter::config::ManagerConfig;
/// use btprinter::connection::ConnectionManager;
/// use btprinter::platform::LinuxPlatform;
/// use btprinter::server::{serve, ServerConfig};
/// use btprinter::transport::BluezAdapter;
///
/// # async fn example() -> Result<(), btprinter::PrinterError> {
/// let manager = ConnectionManager::new(
///     BluezAdapter::new(ManagerConfig::default()),
///     ManagerConfig::default(),
/// );
/// let bridge = Bridge::new(Arc::new(manager), LinuxPlatform);
/// let config = ServerConfig {
///     listen_addr: "127.0.0.1:8765".to_string(),
/// };
///
/// serve(config, bridge).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve<A: Adapter, P: Platform>(
    config: ServerConfig,
    bridge: Bridge<A, P>,
) -> Result<(), PrinterError> {
    let app_state = Arc::new(AppState::new(config.clone(), bridge));
    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| {
            PrinterError::Transport(format!("Failed to bind to {}: {}", config.listen_addr, e))
        })?;

    info!("Bridge server listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| PrinterError::Transport(format!("Server error: {}", e)))?;

    Ok(())
}
