//! HTTP surface
//!
//! - `GET /health` - liveness, no authentication
//! - `GET /.well-known/oauth-protected-resource` - RFC 9728 metadata, no authentication
//! - `POST /mcp` - JSON-RPC, behind [`auth::authenticate`]
//!
//! Every response carries the security headers; CORS is limited to the
//! known MCP client origins.

use crate::router::{self, JsonRpcRequest, JsonRpcResponse};
use crate::state::AppState;
use crate::{SERVER_NAME, SERVER_VERSION, auth};
use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use odoo_mcp_auth::{METADATA_PATH, Principal, ProtectedResourceMetadata};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Origins of the MCP clients allowed to call from a browser.
pub const ALLOWED_ORIGINS: &[&str] = &[
    "https://claude.ai",
    "https://console.anthropic.com",
    "https://app.slack.com",
];

/// Extra origins allowed in debug mode.
pub const DEBUG_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:8080",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8080",
];

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let mcp = Router::new()
        .route("/mcp", post(handle_mcp))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::authenticate));

    Router::new()
        .route("/health", get(health))
        .route(METADATA_PATH, get(protected_resource_metadata))
        .merge(mcp)
        .layer(DefaultBodyLimit::max(config.http.max_body_bytes))
        .layer(
            // CORS answers preflights with `ResBody::default()`, so it sits
            // inside the trace layer, whose body type has no default.
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(security_headers))
                .layer(cors_layer(config.debug))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.request_timeout(),
                )),
        )
        .with_state(state)
}

/// Bind, serve until SIGINT/SIGTERM, then drain in-flight requests.
///
/// # Errors
///
/// Returns the I/O error if the listener cannot be bound or the server fails.
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let address = state.config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!(
        address = %listener.local_addr()?,
        resource = %state.resource_server.metadata().resource,
        "Odoo MCP server listening (POST /mcp, GET /health, GET {METADATA_PATH})"
    );

    let purge = tokio::spawn(purge_caches(state.clone()));
    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    purge.abort();
    info!("Odoo MCP server stopped");
    result
}

async fn purge_caches(state: AppState) {
    let mut ticker = tokio::time::interval(CACHE_PURGE_INTERVAL);
    loop {
        ticker.tick().await;
        state.purge_expired();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVER_NAME,
        "version": SERVER_VERSION,
    }))
}

async fn protected_resource_metadata(State(state): State<AppState>) -> Json<ProtectedResourceMetadata> {
    Json(state.resource_server.metadata().clone())
}

async fn handle_mcp(
    State(state): State<AppState>,
    Extension(principal): Extension<Arc<Principal>>,
    body: Bytes,
) -> Json<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return Json(JsonRpcResponse::parse_error(e.to_string())),
    };
    Json(router::route_request(&state, &principal, request).await)
}

/// Apply the fixed security headers to every response.
async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'; frame-ancestors 'none'"),
    );

    response
}

fn cors_layer(debug: bool) -> CorsLayer {
    let origins: Vec<HeaderValue> = ALLOWED_ORIGINS
        .iter()
        .chain(if debug { DEBUG_ORIGINS } else { &[] })
        .copied()
        .map(HeaderValue::from_static)
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}
