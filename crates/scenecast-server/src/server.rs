use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use scenecast_core::{DisconnectScope, ServerEvent};
use scenecast_engine::RelayEngine;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::client::{self, ClientRegistry, Delivery};
use crate::relay::{self, RelayHandle};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_send_queue: usize,
    pub heartbeat_interval: Duration,
    pub disconnect_scope: DisconnectScope,
    /// Rendered at `/metrics` when set.
    pub metrics: Option<PrometheusHandle>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            max_send_queue: 256,
            heartbeat_interval: Duration::from_secs(25),
            disconnect_scope: DisconnectScope::Scene,
            metrics: None,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub client_registry: Arc<ClientRegistry>,
    pub relay: RelayHandle,
    pub heartbeat_interval: Duration,
    pub metrics: Option<PrometheusHandle>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the listener and start serving. Returns a handle that keeps the
/// background tasks alive.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    if config.disconnect_scope == DisconnectScope::All {
        tracing::warn!(
            "disconnect notifications go to every connection, not just the departed player's scene"
        );
    }

    let client_registry = Arc::new(ClientRegistry::new(config.max_send_queue));
    let engine = RelayEngine::new(config.disconnect_scope);
    let (relay, relay_task) = relay::spawn_relay(engine, Arc::clone(&client_registry), 1024);

    let app_state = AppState {
        client_registry,
        relay,
        heartbeat_interval: config.heartbeat_interval,
        metrics: config.metrics,
    };

    let router = build_router(app_state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(addr = %local_addr, "scenecast relay listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "server stopped");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        local_addr,
        server,
        relay: relay_task,
    })
}

/// Handle returned by `start()`; keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    pub local_addr: SocketAddr,
    server: tokio::task::JoinHandle<()>,
    relay: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and stop the relay.
    pub fn shutdown(self) {
        self.server.abort();
        self.relay.abort();
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Register a new socket, tell it its id, then pump it until it closes.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (conn_id, rx) = state.client_registry.register();

    match (ServerEvent::Connected { id: conn_id.clone() }).encode() {
        Ok(frame) => {
            let _ = state
                .client_registry
                .send_to(&conn_id, Arc::new(frame), Delivery::Reliable);
        }
        Err(e) => tracing::warn!(conn_id = %conn_id, error = %e, "failed to encode greeting"),
    }
    state.relay.connect(conn_id.clone()).await;

    client::handle_ws_connection(socket, conn_id, rx, state.relay, state.heartbeat_interval).await;
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "connections": state.client_registry.count(),
    }))
}

/// Prometheus scrape endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn server_starts_and_serves_health() {
        let handle = start(local_config()).await.unwrap();
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["connections"], 0);
        handle.shutdown();
    }

    #[tokio::test]
    async fn metrics_endpoint_is_absent_without_recorder() {
        let handle = start(local_config()).await.unwrap();
        let url = format!("http://127.0.0.1:{}/metrics", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 404);
        handle.shutdown();
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_with_recorder() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let config = ServerConfig {
            metrics: Some(recorder.handle()),
            ..local_config()
        };
        let handle = start(config).await.unwrap();
        let url = format!("http://127.0.0.1:{}/metrics", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);
        handle.shutdown();
    }

    #[test]
    fn default_config_uses_scene_scope() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 4000);
        assert_eq!(config.disconnect_scope, DisconnectScope::Scene);
        assert!(config.metrics.is_none());
    }
}
