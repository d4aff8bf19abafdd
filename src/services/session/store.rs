use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::services::auth::principal::Principal;

/// Session record returned by the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPrincipal {
    pub id: Uuid,
    // Only an explicit `true` counts as active.
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub authenticated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub identity: Option<SessionIdentity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub id: Uuid,
    #[serde(default)]
    pub schema_id: String,
    #[serde(default)]
    pub traits: serde_json::Value,
}

impl Principal for SessionPrincipal {}

impl SessionPrincipal {
    pub fn is_active(&self) -> bool {
        self.active == Some(true)
    }

    pub fn identity_id(&self) -> Option<Uuid> {
        self.identity.as_ref().map(|i| i.id)
    }

    pub fn email(&self) -> Option<&str> {
        self.identity
            .as_ref()
            .and_then(|i| i.traits.get("email"))
            .and_then(|v| v.as_str())
    }
}

/// Session store failures, kept apart from "no session" so transport
/// problems are not reported as a plain missing login.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("session store returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid session store response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("invalid session store url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Exchanges a raw `Cookie` header for a session record.
///
/// Returns:
/// - `Ok(Some(_))` => the store knows a session for these cookies
/// - `Ok(None)`    => no session
/// - `Err(_)`      => the store could not answer (caller fails closed)
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn to_session(
        &self,
        cookie_header: &str,
    ) -> Result<Option<SessionPrincipal>, SessionStoreError>;
}
