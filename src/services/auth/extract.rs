//! Credential extraction from request headers.
//!
//! Nothing here verifies anything: it only decides whether a request carries
//! something worth handing to a verifier.

use axum::http::{HeaderMap, header};

use crate::error::AuthFailure;

pub const BEARER_SCHEME: &str = "Bearer ";

/// Strip an authorization scheme prefix, comparing ASCII-case-insensitively.
///
/// Returns `(token, true)` on a match. On a mismatch the input is returned
/// unchanged with `false`; that value is only useful for diagnostics.
pub fn validate_auth_header<'a>(header: &'a str, scheme: &str) -> (&'a str, bool) {
    match header.get(..scheme.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(scheme) => (&header[scheme.len()..], true),
        _ => (header, false),
    }
}

/// Bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthFailure> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthFailure::MissingCredential)?
        .to_str()
        .map_err(|_| AuthFailure::MalformedCredential("authorization header is not visible ascii"))?;

    let (token, ok) = validate_auth_header(value, BEARER_SCHEME);
    if !ok {
        return Err(AuthFailure::MalformedCredential("authorization scheme is not bearer"));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthFailure::MalformedCredential("bearer token is empty"));
    }

    Ok(token)
}

/// Raw `Cookie` header, forwarded as-is to the session store.
///
/// HTTP/2 clients may split cookies over several header fields; those are
/// joined back with `"; "` (RFC 9113, section 8.2.3).
pub fn cookie_header(headers: &HeaderMap) -> Result<String, AuthFailure> {
    let mut values = headers.get_all(header::COOKIE).iter().peekable();
    if values.peek().is_none() {
        return Err(AuthFailure::MissingCredential);
    }

    let parts = values
        .map(|v| v.to_str())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| AuthFailure::MalformedCredential("cookie header is not visible ascii"))?;

    Ok(parts.join("; "))
}
