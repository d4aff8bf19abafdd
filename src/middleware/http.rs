//! HTTP-level middleware (cross-cutting concerns).
//!
//! Responsibility:
//! - Request-Id generation + propagation (X-Request-Id)
//! - Access logging / request tracing (TraceLayer)
//! - Body size limits
//! - Global timeouts
//! - Panic recovery with a caller-supplied error handler
//!
//! Notes:
//! - The timeout also bounds calls the auth middleware makes to the session
//!   store: when it fires, the request future (and the outbound call inside it)
//!   is dropped.

use std::any::Any;
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::{StatusCode, header::HeaderName};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Apply HTTP-level middleware to the given Router.
///
/// Defaults:
/// - Request-Id header: `x-request-id`
/// - Body limit: 1 MiB
pub fn apply(router: Router, timeout: Duration) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let layers = ServiceBuilder::new()
        // Make the service error `Infallible` by converting errors into responses.
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                StatusCode::REQUEST_TIMEOUT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }))
        // Generate a request id if missing, then propagate it to the response.
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http());

    router.layer(layers)
}

/// A handler panic, reduced to its message.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PanicError(pub String);

impl PanicError {
    fn from_payload(payload: Box<dyn Any + Send + 'static>) -> Self {
        if let Some(s) = payload.downcast_ref::<String>() {
            Self(s.clone())
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            Self((*s).to_string())
        } else {
            Self("unknown panic".to_string())
        }
    }
}

/// Turn panics in inner handlers into whatever `handler` answers.
pub fn recoverer<F>(router: Router, handler: F) -> Router
where
    F: Fn(PanicError) -> Response + Clone + Send + Sync + 'static,
{
    router.layer(CatchPanicLayer::custom(
        move |payload: Box<dyn Any + Send + 'static>| {
            let err = PanicError::from_payload(payload);
            tracing::error!(error = %err, "handler panicked");
            handler(err)
        },
    ))
}

/// Plain 500 without details.
pub fn internal_error(_: PanicError) -> Response {
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
