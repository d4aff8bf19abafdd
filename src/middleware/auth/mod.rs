/*
 * Responsibility
 * - Authentication layers (bearer ID token / session cookie)
 * - On success the verified principal is put into request extensions
 * - Authorization beyond the configured claim policy stays in handlers
 */
pub mod oidc;
pub mod session;

pub use oidc::{MiddlewareConfig, OidcMiddleware};
pub use session::{SessionMiddleware, SessionMiddlewareConfig};
