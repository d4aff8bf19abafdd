/*
 * Responsibility
 * - GET /me (bearer ID token) and GET /session (session cookie)
 * - Echo the verified principal back; no further authorization here
 */
use axum::Json;

use crate::api::v1::dto::me::{SessionResponse, TokenResponse};
use crate::api::v1::extractors::Authenticated;
use crate::services::auth::TokenPrincipal;
use crate::services::session::SessionPrincipal;

pub async fn me(Authenticated(principal): Authenticated<TokenPrincipal>) -> Json<TokenResponse> {
    Json(TokenResponse::from(&*principal))
}

pub async fn session(
    Authenticated(session): Authenticated<SessionPrincipal>,
) -> Json<SessionResponse> {
    Json(SessionResponse::from(&*session))
}
