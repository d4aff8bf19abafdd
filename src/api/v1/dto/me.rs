/*
 * Responsibility
 * - Response DTOs for the "who am I" endpoints
 * - Principals are never serialized directly (raw claims stay server-side)
 */
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::services::auth::TokenPrincipal;
use crate::services::session::SessionPrincipal;

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub issuer: String,
    pub subject: String,
    pub audience: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&TokenPrincipal> for TokenResponse {
    fn from(p: &TokenPrincipal) -> Self {
        Self {
            issuer: p.issuer.clone(),
            subject: p.subject.clone(),
            audience: p.audience.clone(),
            email: p
                .claim("email")
                .and_then(|v| v.as_str())
                .map(str::to_owned),
            expires_at: p.expiry,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&SessionPrincipal> for SessionResponse {
    fn from(s: &SessionPrincipal) -> Self {
        Self {
            session_id: s.id,
            identity_id: s.identity_id(),
            email: s.email().map(str::to_owned),
            expires_at: s.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GreetingResponse {
    pub message: String,
}
