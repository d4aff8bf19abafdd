//! Session cookie → `SessionPrincipal` in request extensions.
//!
//! Same shape as the token middleware minus the policy step: the session
//! store is the only authority here.

use std::{fmt, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::{self, Next},
    response::Response,
};
use tracing::debug;

use crate::error::AuthFailure;
use crate::services::auth::{
    failure::{FailureHandler, FailureRouter},
    principal::attach_principal,
};
use crate::services::session::{
    OrySessionStore, SessionPrincipal, SessionStore, SessionStoreError, SessionValidator,
};

#[derive(Clone, Default)]
pub struct SessionMiddlewareConfig {
    /// Custom failure handler. `None` keeps the default bare 401.
    pub auth_failed_handler: Option<FailureHandler>,
}

impl fmt::Debug for SessionMiddlewareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMiddlewareConfig")
            .field("auth_failed_handler", &self.auth_failed_handler.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct SessionMiddleware {
    validator: SessionValidator,
    failure: FailureRouter,
}

impl fmt::Debug for SessionMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMiddleware")
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

impl SessionMiddleware {
    /// Middleware backed by an Ory frontend API at `base_url`.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        config: SessionMiddlewareConfig,
    ) -> Result<Self, SessionStoreError> {
        let store = OrySessionStore::new(http, base_url)?;
        Ok(Self::with_store(Arc::new(store), config))
    }

    pub fn with_store(store: Arc<dyn SessionStore>, config: SessionMiddlewareConfig) -> Self {
        Self {
            validator: SessionValidator::new(store),
            failure: FailureRouter::new(config.auth_failed_handler),
        }
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<SessionPrincipal, AuthFailure> {
        self.validator.validate_session(headers).await
    }

    /// Put every route of `router` behind this middleware.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(self, session_middleware))
    }
}

async fn session_middleware(
    State(mw): State<SessionMiddleware>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match mw.authenticate(req.headers()).await {
        Ok(session) => {
            debug!(session_id = %session.id, "session validated");
            attach_principal(req.extensions_mut(), session);
            next.run(req).await
        }
        Err(failure) => mw.failure.route(failure),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{
        http::{StatusCode, header},
        response::IntoResponse,
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::services::auth::principal::{TokenPrincipal, principal_from};
    use crate::services::session::validator::tests::{FakeStore, session};

    fn app(store: Arc<dyn SessionStore>, config: SessionMiddlewareConfig, calls: Arc<AtomicUsize>) -> Router {
        let protected = Router::new().route(
            "/",
            get(move |req: Request<Body>| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let session = principal_from::<SessionPrincipal>(req.extensions())
                        .expect("session attached");
                    assert!(session.is_active());
                    // One principal type per middleware.
                    assert!(principal_from::<TokenPrincipal>(req.extensions()).is_none());
                    StatusCode::IM_A_TEAPOT
                }
            }),
        );
        SessionMiddleware::with_store(store, config).apply(protected)
    }

    fn request(cookie: Option<&'static str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn active_session_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = FakeStore::new(|| Ok(Some(session(Some(true)))));

        let resp = app(store.clone(), Default::default(), calls.clone())
            .oneshot(request(Some("ory_session=abc")))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*store.seen.lock().unwrap(), vec!["ory_session=abc".to_string()]);
    }

    #[tokio::test]
    async fn inactive_session_is_401() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = FakeStore::new(|| Ok(Some(session(Some(false)))));

        let resp = app(store, Default::default(), calls.clone())
            .oneshot(request(Some("ory_session=abc")))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn absent_session_goes_to_custom_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = FakeStore::new(|| Ok(None));
        let config = SessionMiddlewareConfig {
            auth_failed_handler: Some(Arc::new(|_| StatusCode::FORBIDDEN.into_response())),
        };

        let resp = app(store, config, calls.clone())
            .oneshot(request(Some("ory_session=abc")))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_cookie_is_401() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = FakeStore::new(|| Ok(Some(session(Some(true)))));

        let resp = app(store.clone(), Default::default(), calls.clone())
            .oneshot(request(None))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(store.seen.lock().unwrap().is_empty());
    }
}
