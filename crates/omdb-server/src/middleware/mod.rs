//! Middleware for the OMDb server
//!
//! - CORS (Cross-Origin Resource Sharing)
//! - Request logging with tracing
//! - Panic recovery

use axum::{
    extract::ConnectInfo,
    http::{header, Method, Request, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::{any::Any, net::SocketAddr, time::Duration};
use tower_http::{
    catch_panic::CatchPanicLayer,
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::{Any as AnyOrigin, CorsLayer},
    trace::{DefaultOnRequest, MakeSpan, OnResponse, TraceLayer},
};
use tracing::{Level, Span};

use crate::config::CorsConfig;

/// Create CORS layer from configuration
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    if config.allowed_origins.is_empty() || config.allowed_origins.iter().any(|o| o == "*") {
        cors.allow_origin(AnyOrigin)
    } else {
        let origins: Vec<_> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

pub type RequestTraceLayer =
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan, DefaultOnRequest, ResponseLog>;

/// Create tracing/logging layer
pub fn tracing_layer() -> RequestTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(ResponseLog)
}

/// One span per request: method, URI, client IP and referer.
#[derive(Debug, Clone, Copy)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let referer = request
            .headers()
            .get(header::REFERER)
            .and_then(|value| value.to_str().ok());

        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            ip = %client_ip(request),
            referer,
        )
    }
}

/// Logs status, body size (when known) and latency once headers are sent.
#[derive(Debug, Clone, Copy)]
pub struct ResponseLog;

impl<B> OnResponse<B> for ResponseLog {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let size = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());

        tracing::info!(
            parent: span,
            status = response.status().as_u16(),
            size,
            latency_ms = latency.as_millis() as u64,
            "request completed"
        );
    }
}

/// `X-Forwarded-For` (first hop) when behind a proxy, else the peer address.
pub fn client_ip<B>(request: &Request<B>) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Turn handler panics into a logged 500.
pub fn catch_panic_layer() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> axum::response::Response> {
    CatchPanicLayer::custom(handle_panic as fn(Box<dyn Any + Send + 'static>) -> axum::response::Response)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> axum::response::Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = detail, "handler panicked");

    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (
        status,
        Json(json!({
            "error": {
                "message": "Internal server error",
                "status": status.as_u16(),
            }
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    fn request() -> axum::http::request::Builder {
        Request::builder().uri("/")
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let req = request()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let mut req = request().body(()).unwrap();
        assert_eq!(client_ip(&req), "-");

        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 41000))));
        assert_eq!(client_ip(&req), "192.0.2.1");
    }

    #[test]
    fn test_cors_layer_with_specific_origins() {
        let config = CorsConfig {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "https://example.com".to_string(),
            ],
        };

        let _layer = cors_layer(&config);
    }

    #[test]
    fn test_cors_layer_with_wildcard() {
        let config = CorsConfig {
            allowed_origins: vec!["*".to_string()],
        };

        let _layer = cors_layer(&config);
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_500() {
        async fn boom() -> &'static str {
            panic!("boom")
        }

        let app = Router::new()
            .route("/", get(boom))
            .layer(catch_panic_layer())
            .layer(tracing_layer());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
