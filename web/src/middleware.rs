//! Axum middleware for request references and CORS headers.
//!
//! # Request references
//!
//! 1. **Extract** the reference from the `X-Request-ID` header (or generate a new UUID)
//! 2. **Store** it in request extensions for handler access
//! 3. **Create tracing span** with a `reference` field
//! 4. **Inject** it into the response `X-Request-ID` header
//!
//! The same reference is what a failed ride request reports as
//! `Reference`.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use wild_rydes_web::middleware::{request_reference_layer, with_cors_headers};
//!
//! let app = with_cors_headers(Router::new().route("/ride", post(request_ride)))
//!     .layer(request_reference_layer());
//! ```

use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, header},
    response::Response,
};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::Instrument;
use uuid::Uuid;

/// Header name for the request reference.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Longest caller-supplied reference that is kept.
const MAX_REFERENCE_LEN: usize = 128;

/// Request reference stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestReference(pub String);

impl RequestReference {
    /// Reference from a caller-supplied header value, if usable.
    #[must_use]
    pub fn from_header(value: Option<&HeaderValue>) -> Option<Self> {
        value
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty() && s.len() <= MAX_REFERENCE_LEN)
            .map(|s| Self(s.to_string()))
    }

    /// Fresh reference.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Create a layer that gives every request a reference.
#[must_use]
pub const fn request_reference_layer() -> RequestReferenceLayer {
    RequestReferenceLayer
}

/// Layer for request reference tracking.
#[derive(Clone, Debug)]
pub struct RequestReferenceLayer;

impl<S> Layer<S> for RequestReferenceLayer {
    type Service = RequestReferenceMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestReferenceMiddleware { inner }
    }
}

/// Middleware service for request reference tracking.
#[derive(Clone, Debug)]
pub struct RequestReferenceMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for RequestReferenceMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let reference = RequestReference::from_header(req.headers().get(REQUEST_ID_HEADER))
            .unwrap_or_else(RequestReference::generate);

        req.extensions_mut().insert(reference.clone());

        let span = tracing::info_span!(
            "http_request",
            reference = %reference.0,
            method = %req.method(),
            uri = %req.uri(),
        );

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span).await?;

            if let Ok(header_value) = HeaderValue::from_str(&reference.0) {
                response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
            }

            Ok(response)
        })
    }
}

/// CORS headers carried by every ride API response.
pub const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "OPTIONS,POST,GET"),
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
];

/// Stamp [`CORS_HEADERS`] on every response of `router`, errors included.
#[must_use]
pub fn with_cors_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    CORS_HEADERS
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(
                name,
                HeaderValue::from_static(value),
            ))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        with_cors_headers(Router::new().route("/test", get(|| async { "ok" })))
            .layer(request_reference_layer())
    }

    #[tokio::test]
    async fn reference_generated_if_missing() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = app().oneshot(request).await.unwrap();

        let reference = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .expect("Request ID header should be present");
        assert!(Uuid::parse_str(reference.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn reference_preserved_from_request() {
        let request = Request::builder()
            .uri("/test")
            .header(REQUEST_ID_HEADER, "c0ffee-42")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.headers()[REQUEST_ID_HEADER], "c0ffee-42");
    }

    #[tokio::test]
    async fn cors_headers_on_unknown_route() {
        let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["access-control-allow-headers"], "Content-Type");
        assert_eq!(response.headers()["access-control-allow-methods"], "OPTIONS,POST,GET");
    }

    #[test]
    fn oversized_reference_is_ignored() {
        let long = HeaderValue::from_str(&"x".repeat(MAX_REFERENCE_LEN + 1)).unwrap();
        assert!(RequestReference::from_header(Some(&long)).is_none());
        assert!(RequestReference::from_header(None).is_none());
    }
}
