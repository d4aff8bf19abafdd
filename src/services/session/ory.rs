use async_trait::async_trait;
use reqwest::{StatusCode, header};
use url::Url;

use crate::services::session::store::{SessionPrincipal, SessionStore, SessionStoreError};

/// Ory (Kratos) frontend API client: `GET /sessions/whoami`.
///
/// The browser's cookies are forwarded untouched; the store decides which of
/// them is the session cookie.
#[derive(Debug, Clone)]
pub struct OrySessionStore {
    http: reqwest::Client,
    whoami_url: Url,
}

impl OrySessionStore {
    pub fn new(http: reqwest::Client, base_url: &str) -> Result<Self, SessionStoreError> {
        // `Url::join` drops the last path segment unless the base ends in '/'.
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        let whoami_url = base.join("sessions/whoami")?;

        Ok(Self { http, whoami_url })
    }

    pub fn whoami_url(&self) -> &Url {
        &self.whoami_url
    }
}

#[async_trait]
impl SessionStore for OrySessionStore {
    async fn to_session(
        &self,
        cookie_header: &str,
    ) -> Result<Option<SessionPrincipal>, SessionStoreError> {
        let resp = self
            .http
            .get(self.whoami_url.clone())
            .header(header::COOKIE, cookie_header)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(SessionStoreError::Transport)?;

        match resp.status() {
            status if status.is_success() => resp
                .json::<SessionPrincipal>()
                .await
                .map(Some)
                .map_err(SessionStoreError::Decode),
            StatusCode::UNAUTHORIZED => Ok(None),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(SessionStoreError::Status { status, body })
            }
        }
    }
}
