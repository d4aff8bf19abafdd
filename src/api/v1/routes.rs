/*
 * Responsibility
 * - URL layout of v1
 * - Decides which groups sit behind which auth layer
 *
 * Notes
 * - A group whose middleware is not configured is not mounted at all,
 *   so it answers 404 instead of running unauthenticated.
 * - /greeting follows the token layer when there is one, and is public otherwise.
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{
    greeting::greeting,
    health::health,
    me::{me, session},
};
use crate::middleware::auth::{OidcMiddleware, SessionMiddleware};

pub fn routes(oidc: Option<OidcMiddleware>, sessions: Option<SessionMiddleware>) -> Router {
    let mut router = Router::new().route("/health", get(health));

    match oidc {
        Some(oidc) => {
            router = router.merge(
                oidc.apply(
                    Router::new()
                        .route("/me", get(me))
                        .route("/greeting", get(greeting)),
                ),
            );
        }
        None => router = router.route("/greeting", get(greeting)),
    }
    if let Some(sessions) = sessions {
        router = router.merge(sessions.apply(Router::new().route("/session", get(session))));
    }

    router
}
