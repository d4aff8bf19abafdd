//! Verified principals and their request-extension accessors.
//!
//! Only this crate can attach a principal: the value is stored behind a
//! private wrapper type, so a handler (or another layer) inserting a bare
//! `TokenPrincipal` into the extensions is never mistaken for a verified one.

use std::sync::Arc;

use axum::http::Extensions;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::services::auth::oidc::VerifyError;

/// Marker for types the middleware may attach to a request.
pub trait Principal: Send + Sync + 'static {}

struct Attached<P>(Arc<P>);

impl<P> Clone for Attached<P> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

pub(crate) fn attach_principal<P: Principal>(extensions: &mut Extensions, principal: P) {
    extensions.insert(Attached(Arc::new(principal)));
}

/// The principal attached by the middleware, if any.
///
/// Routes mounted without the middleware simply get `None`.
pub fn principal_from<P: Principal>(extensions: &Extensions) -> Option<&P> {
    extensions.get::<Attached<P>>().map(|a| a.0.as_ref())
}

pub(crate) fn shared_principal_from<P: Principal>(extensions: &Extensions) -> Option<Arc<P>> {
    extensions.get::<Attached<P>>().map(|a| Arc::clone(&a.0))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct StandardClaims {
    iss: String,
    sub: String,
    #[serde(default)]
    aud: Option<Audience>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default)]
    at_hash: Option<String>,
}

/// Claims of a verified ID token.
#[derive(Debug, Clone)]
pub struct TokenPrincipal {
    pub issuer: String,
    pub subject: String,
    pub audience: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub nonce: Option<String>,
    pub access_token_hash: Option<String>,
    algorithm: Algorithm,
    claims: Map<String, Value>,
}

impl Principal for TokenPrincipal {}

impl TokenPrincipal {
    pub(crate) fn from_claims(
        algorithm: Algorithm,
        claims: Map<String, Value>,
    ) -> Result<Self, VerifyError> {
        let std: StandardClaims = serde_json::from_value(Value::Object(claims.clone()))?;

        if std.sub.trim().is_empty() {
            return Err(VerifyError::MissingClaim("sub"));
        }

        let audience = match std.aud {
            Some(Audience::One(aud)) => vec![aud],
            Some(Audience::Many(aud)) => aud,
            None => Vec::new(),
        };

        Ok(Self {
            issuer: std.iss,
            subject: std.sub,
            audience,
            expiry: std.exp.and_then(|t| DateTime::from_timestamp(t, 0)),
            issued_at: std.iat.and_then(|t| DateTime::from_timestamp(t, 0)),
            nonce: std.nonce,
            access_token_hash: std.at_hash,
            algorithm,
            claims,
        })
    }

    /// Algorithm the token was signed with.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Decode the full claim set into a caller-defined type.
    pub fn claims<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.claims.clone()))
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn raw_claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Check an access token issued alongside this ID token against `at_hash`
    /// (OpenID Connect Core 1.0, section 3.1.3.6).
    pub fn verify_access_token(&self, access_token: &str) -> Result<(), VerifyError> {
        let expected = self
            .access_token_hash
            .as_deref()
            .ok_or(VerifyError::MissingClaim("at_hash"))?;

        let digest: Vec<u8> = match self.algorithm {
            Algorithm::RS256 | Algorithm::ES256 | Algorithm::PS256 | Algorithm::HS256 => {
                Sha256::digest(access_token.as_bytes()).to_vec()
            }
            Algorithm::RS384 | Algorithm::ES384 | Algorithm::PS384 | Algorithm::HS384 => {
                Sha384::digest(access_token.as_bytes()).to_vec()
            }
            Algorithm::RS512 | Algorithm::PS512 | Algorithm::HS512 | Algorithm::EdDSA => {
                Sha512::digest(access_token.as_bytes()).to_vec()
            }
        };

        let actual =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2]);
        if actual != expected {
            return Err(VerifyError::AccessTokenHashMismatch);
        }
        Ok(())
    }
}
