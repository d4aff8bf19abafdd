/*
 * Responsibility
 * - Public surface of the middleware layer (re-exports)
 * - Authentication layers, cross-cutting HTTP layers, security headers
 */
pub mod auth;
pub mod http;
pub mod security_headers;

pub use auth::{MiddlewareConfig, OidcMiddleware, SessionMiddleware, SessionMiddlewareConfig};
