use axum::Json;

use crate::api::v1::dto::me::GreetingResponse;
use crate::api::v1::extractors::MaybeAuthenticated;
use crate::services::auth::TokenPrincipal;

/// GET /greeting: names the caller when the token layer is mounted in front of
/// it, anonymous otherwise.
pub async fn greeting(
    MaybeAuthenticated(principal): MaybeAuthenticated<TokenPrincipal>,
) -> Json<GreetingResponse> {
    let message = match principal {
        Some(p) => format!("hello, {}", p.subject),
        None => "hello, anonymous".to_string(),
    };
    Json(GreetingResponse { message })
}
