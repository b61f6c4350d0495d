//! Router construction and request handlers.
//!
//! # Responsibilities
//! - Assemble the axum router with its middleware stack
//! - Serve the click-redirect, postback, and admin endpoints
//! - Drive graceful shutdown of the listener

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admission::{AdmissionGate, Decision};
use crate::dispatch::{network_from_params, PostbackDispatcher};
use crate::geo::GeoResolver;
use crate::http::request::{ClientRequest, RequestIdLayer};
use crate::lifecycle::Shutdown;
use crate::observability::events::{Event, EventSink, EventValue};
use crate::observability::metrics;
use crate::products::ProductCatalog;
use crate::resilience::BreakerRegistry;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AdmissionGate>,
    pub catalog: Arc<ProductCatalog>,
    pub dispatcher: Arc<PostbackDispatcher>,
    pub registry: Arc<BreakerRegistry>,
    pub geo: Option<Arc<dyn GeoResolver>>,
    pub events: Arc<dyn EventSink>,
}

/// Build the full application router.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let clicks = Router::new()
        .route("/", get(redirect_handler))
        .route("/r", get(redirect_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admission_middleware,
        ));

    Router::new()
        .merge(clicks)
        .route("/postback", get(postback_handler))
        .route("/health", get(health_handler))
        .route("/breakers", get(breaker_stats_handler))
        .route("/breakers/reset", post(breakers_reset_all_handler))
        .route("/breakers/{network}/reset", post(breaker_reset_handler))
        .route("/admission", get(admission_status_handler))
        .route("/admission/toggle", post(admission_toggle_handler))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(RequestIdLayer)
        .layer(TraceLayer::new_for_http())
}

/// The HTTP server and its lifecycle.
pub struct HttpServer {
    state: AppState,
    request_timeout: Duration,
    shutdown: Arc<Shutdown>,
}

impl HttpServer {
    pub fn new(state: AppState, request_timeout: Duration, shutdown: Arc<Shutdown>) -> Self {
        Self {
            state,
            request_timeout,
            shutdown,
        }
    }

    /// Serve until the shutdown coordinator fires.
    pub async fn run(self, listener: TcpListener) -> std::io::Result<()> {
        let router = build_router(self.state, self.request_timeout);
        let mut shutdown_rx = self.shutdown.subscribe();

        tracing::info!(address = %listener.local_addr()?, "HTTP server listening");
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            tracing::info!("HTTP server shutting down");
        })
        .await
    }
}

/// Gate middleware for the click routes. A deny is an empty 403.
async fn admission_middleware(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    let client = ClientRequest::from_parts(request.headers(), request.uri(), peer);
    match state.gate.evaluate(&client) {
        Decision::Allow => {
            request.extensions_mut().insert(client);
            next.run(request).await
        }
        Decision::Deny(_) => StatusCode::FORBIDDEN.into_response(),
    }
}

/// Serve one click: pick a product, resolve its URL, 302.
async fn redirect_handler(
    State(state): State<AppState>,
    Extension(client): Extension<ClientRequest>,
) -> Response {
    let mut params = client.query.clone();
    params.remove("bypass");

    // Explicit override first, weighted pick otherwise. An unknown
    // override id degrades to the pick.
    let product = params
        .remove("product")
        .and_then(|id| state.catalog.by_id(&id))
        .or_else(|| state.catalog.pick());
    let Some(product) = product else {
        return (StatusCode::NOT_FOUND, "no products configured").into_response();
    };

    derive_click_id(&mut params);
    let target = crate::dispatch::build_url(&product.url, &params);

    let mut event = Event::new("redirect")
        .field("product_id", product.id.as_str())
        .field("product_name", product.name.as_str())
        .field("target", target.as_str())
        .field("ip", client.ip.as_str())
        .field("user_agent", client.user_agent.as_str());
    if let Some(record) = state.geo.as_ref().and_then(|g| g.city_record(&client.ip)) {
        let mut geo = BTreeMap::new();
        geo.insert("country".to_string(), EventValue::from(record.country));
        geo.insert("region".to_string(), EventValue::from(record.region));
        geo.insert("city".to_string(), EventValue::from(record.city));
        geo.insert("timezone".to_string(), EventValue::from(record.timezone));
        event = event.field("geo", geo);
    }
    state.events.emit(event);
    metrics::record_redirect(&product.id);

    match HeaderValue::from_str(&target) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(e) => {
            tracing::error!(target = %target, error = %e, "Resolved URL not header-safe");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Inject the tracker-specific click id as the canonical `sub_id`.
fn derive_click_id(params: &mut HashMap<String, String>) {
    if params.contains_key("sub_id") {
        return;
    }
    let derived = match params.get("type_ads").map(String::as_str) {
        Some("1") => params.get("subid"),
        Some("2") => params.get("clickid"),
        _ => None,
    };
    if let Some(click_id) = derived.filter(|v| !v.is_empty()).cloned() {
        params.insert("sub_id".to_string(), click_id);
    }
}

/// Acknowledge a conversion and forward it off the request path.
async fn postback_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    uri: Uri,
) -> Json<serde_json::Value> {
    let client = ClientRequest::from_parts(&headers, &uri, peer);
    let params = client.query;

    let mut fields = BTreeMap::new();
    for (key, value) in &params {
        fields.insert(key.clone(), EventValue::from(value.clone()));
    }
    state.events.emit(
        Event::new("postback_received")
            .field("ip", client.ip.as_str())
            .field("params", fields),
    );

    match network_from_params(&params) {
        Some(network) => state.dispatcher.spawn(network, params.clone()),
        None => tracing::debug!(url = %client.url, "Postback without a resolvable network"),
    }

    Json(json!({ "status": "ok", "data": params }))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Breaker stats for every network seen so far.
async fn breaker_stats_handler(State(state): State<AppState>) -> Response {
    Json(state.registry.stats().await).into_response()
}

async fn breaker_reset_handler(
    State(state): State<AppState>,
    Path(network): Path<String>,
) -> Response {
    if state.registry.reset(&network).await {
        Json(json!({ "status": "ok", "network": network })).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "message": format!("unknown network `{network}`") })),
        )
            .into_response()
    }
}

async fn breakers_reset_all_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.registry.reset_all().await;
    Json(json!({ "status": "ok" }))
}

async fn admission_status_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "enabled": state.gate.is_enabled() }))
}

async fn admission_toggle_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let enabled = state.gate.toggle();
    tracing::info!(enabled, "Admission gate toggled");
    Json(json!({ "enabled": enabled }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_derive_click_id_per_tracker() {
        let mut p = params(&[("type_ads", "1"), ("subid", "prop123")]);
        derive_click_id(&mut p);
        assert_eq!(p["sub_id"], "prop123");

        let mut p = params(&[("type_ads", "2"), ("clickid", "galak456")]);
        derive_click_id(&mut p);
        assert_eq!(p["sub_id"], "galak456");
    }

    #[test]
    fn test_derive_click_id_keeps_explicit_sub_id() {
        let mut p = params(&[("type_ads", "2"), ("clickid", "x"), ("sub_id", "keep")]);
        derive_click_id(&mut p);
        assert_eq!(p["sub_id"], "keep");
    }

    #[test]
    fn test_derive_click_id_no_tracker_match() {
        let mut p = params(&[("type_ads", "3"), ("clickid", "x")]);
        derive_click_id(&mut p);
        assert!(!p.contains_key("sub_id"));
    }
}
