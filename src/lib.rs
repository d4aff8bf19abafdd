//! Bearer ID token and session cookie authentication for axum.
//!
//! Two middlewares share one failure taxonomy ([`AuthFailure`]):
//!
//! - [`OidcMiddleware`] verifies `Authorization: Bearer <id_token>` against an
//!   OpenID Connect provider discovered at startup, then applies the email
//!   policy.
//! - [`SessionMiddleware`] forwards the `Cookie` header to a session store and
//!   accepts only active sessions.
//!
//! On success the verified principal is attached to the request; handlers read
//! it with [`principal_from`] or the [`Authenticated`] extractor. On failure the
//! configured handler answers (a bare 401 by default) and the route never runs.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;

pub use api::v1::extractors::{Authenticated, MaybeAuthenticated};
pub use error::{AuthFailure, FailureKind};
pub use middleware::{MiddlewareConfig, OidcMiddleware, SessionMiddleware, SessionMiddlewareConfig};
pub use services::auth::{TokenPrincipal, principal_from};
pub use services::session::SessionPrincipal;
