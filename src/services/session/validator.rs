use std::sync::Arc;

use axum::http::HeaderMap;
use thiserror::Error;

use crate::error::AuthFailure;
use crate::services::auth::extract;
use crate::services::session::store::{SessionPrincipal, SessionStore, SessionStoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active session found")]
    NoActiveSession,
    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

/// Cookie → session, trusting the store entirely.
#[derive(Clone)]
pub struct SessionValidator {
    store: Arc<dyn SessionStore>,
}

impl SessionValidator {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub async fn validate_session(
        &self,
        headers: &HeaderMap,
    ) -> Result<SessionPrincipal, AuthFailure> {
        let cookies = extract::cookie_header(headers)?;

        let session = self
            .store
            .to_session(&cookies)
            .await
            .map_err(|e| AuthFailure::verification(SessionError::Store(e)))?;

        match session {
            Some(session) if session.is_active() => Ok(session),
            _ => Err(AuthFailure::verification(SessionError::NoActiveSession)),
        }
    }
}
