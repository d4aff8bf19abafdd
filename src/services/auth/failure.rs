//! Failure routing: turn an `AuthFailure` into the response the client sees.

use std::{fmt, sync::Arc};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::error::AuthFailure;

/// Caller-supplied failure handler.
pub type FailureHandler = Arc<dyn Fn(AuthFailure) -> Response + Send + Sync>;

/// Maps failures to responses.
///
/// Without a custom handler every failure becomes a bare `401` with an empty
/// body, whatever its kind.
#[derive(Clone, Default)]
pub struct FailureRouter {
    handler: Option<FailureHandler>,
}

impl fmt::Debug for FailureRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureRouter")
            .field("custom_handler", &self.handler.is_some())
            .finish()
    }
}

impl FailureRouter {
    pub fn new(handler: Option<FailureHandler>) -> Self {
        Self { handler }
    }

    /// Replace the handler. `None` leaves the current one in place.
    pub fn with_handler(mut self, handler: Option<FailureHandler>) -> Self {
        if handler.is_some() {
            self.handler = handler;
        }
        self
    }

    pub fn route(&self, failure: AuthFailure) -> Response {
        warn!(
            kind = failure.kind().as_str(),
            error = %failure,
            "request authentication failed"
        );

        match &self.handler {
            Some(handler) => handler(failure),
            None => unauthorized(),
        }
    }
}

pub fn unauthorized() -> Response {
    StatusCode::UNAUTHORIZED.into_response()
}

/// 401 with the failure kind and message as JSON.
///
/// Tells the client why authentication failed; meant for debugging only.
pub fn verbose_handler() -> FailureHandler {
    Arc::new(|failure: AuthFailure| {
        (StatusCode::UNAUTHORIZED, Json(failure.to_error_response())).into_response()
    })
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_of(resp: Response) -> Vec<u8> {
        to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn default_is_bare_401_for_every_kind() {
        let router = FailureRouter::default();
        let failures = [
            AuthFailure::MissingCredential,
            AuthFailure::MalformedCredential("x"),
            AuthFailure::verification("bad signature"),
            AuthFailure::PolicyViolation("nope".into()),
            AuthFailure::Configuration("nope".into()),
        ];

        for failure in failures {
            let resp = router.route(failure);
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            assert!(body_of(resp).await.is_empty());
        }
    }

    #[tokio::test]
    async fn none_handler_keeps_default() {
        let router = FailureRouter::new(None).with_handler(None);
        assert_eq!(
            router.route(AuthFailure::MissingCredential).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn none_does_not_clear_custom_handler() {
        let forbidden: FailureHandler = Arc::new(|_| StatusCode::FORBIDDEN.into_response());
        let router = FailureRouter::new(Some(forbidden)).with_handler(None);

        assert_eq!(
            router.route(AuthFailure::MissingCredential).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn verbose_handler_explains_failure() {
        let router = FailureRouter::default().with_handler(Some(verbose_handler()));
        let resp = router.route(AuthFailure::PolicyViolation(
            r#"expected email "b@x.com" got "a@x.com""#.into(),
        ));

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_slice(&body_of(resp).await).unwrap();
        assert_eq!(body["error"]["code"], "POLICY_VIOLATION");
        assert_eq!(
            body["error"]["message"],
            r#"expected email "b@x.com" got "a@x.com""#
        );
    }
}
