//! `RelayServer` — axum router wiring the relay, proxy, and WebSocket
//! bridge together.

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use chirp_stream::StreamRelay;

use crate::config::RelayConfig;
use crate::{proxy, ws};

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The stream relay subscribers attach to.
    pub relay: Arc<StreamRelay>,
    /// HTTP client for proxied upstream requests.
    pub http: reqwest::Client,
    /// Process configuration.
    pub config: Arc<RelayConfig>,
}

/// The relay's HTTP server.
pub struct RelayServer {
    state: AppState,
}

impl RelayServer {
    /// Build a server (and its relay) from configuration.
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        let relay = Arc::new(StreamRelay::new(
            config.upstream_base_url.clone(),
            config.api_token.clone(),
        ));
        Self {
            state: AppState {
                relay,
                http: reqwest::Client::new(),
                config: Arc::new(config),
            },
        }
    }

    /// The relay behind this server.
    #[must_use]
    pub fn relay(&self) -> &Arc<StreamRelay> {
        &self.state.relay
    }

    /// Build the axum router with all routes.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/stream", get(ws::ws_handler))
            .route(
                "/api/{*path}",
                get(proxy::proxy_get).post(proxy::proxy_post),
            )
            .fallback(not_found)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}
