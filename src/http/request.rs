//! Request identity and transformation.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4) as early as possible
//! - Extract the client identity the admission gate evaluates
//!
//! # Design Decisions
//! - Client IP honors `X-Forwarded-For` (first entry) before
//!   `X-Real-Ip` before the socket peer address
//! - `ClientRequest` is built once per request and read-only afterwards

use std::collections::HashMap;
use std::net::SocketAddr;
use std::task::{Context, Poll};

use axum::http::{HeaderMap, HeaderValue, Request, Uri};
use tower::{Layer, Service};
use uuid::Uuid;

/// Everything the admission gate needs to know about one click.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    /// Client IP as a string (forwarding headers already applied).
    pub ip: String,
    /// Raw User-Agent header.
    pub user_agent: String,
    /// Raw Referer header.
    pub referrer: String,
    /// Original request path and query.
    pub url: String,
    /// Decoded query parameters.
    pub query: HashMap<String, String>,
    /// `X-Bypass-Key` header, when present.
    pub bypass_header: Option<String>,
}

impl ClientRequest {
    /// Build the per-request context from headers, URI, and peer address.
    pub fn from_parts(headers: &HeaderMap, uri: &Uri, peer: SocketAddr) -> Self {
        let query = uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            ip: client_ip(headers, peer),
            user_agent: header_str(headers, "user-agent"),
            referrer: header_str(headers, "referer"),
            url: uri.to_string(),
            query,
            bypass_header: headers
                .get("x-bypass-key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Extract the client IP: forwarded-for first entry, then real-ip
/// header, then the transport peer address.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        let first = xff.split(',').next().unwrap_or("").trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }
    if let Some(real) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real = real.trim();
        if !real.is_empty() {
            return real.to_string();
        }
    }
    peer.ip().to_string()
}

/// Layer that stamps an `x-request-id` header on requests lacking one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

/// Service produced by [`RequestIdLayer`].
#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for RequestIdService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        if !req.headers().contains_key("x-request-id") {
            if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
                req.headers_mut().insert("x-request-id", value);
            }
        }
        self.inner.call(req)
    }
}
