//! OpenID Connect provider discovery and ID token verification.
//!
//! Discovery fetches the issuer metadata and its JWK set once; afterwards the
//! verifier only reads that snapshot, so it can be shared across requests
//! without locking.

use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use base64::Engine as _;
use jsonwebtoken::{
    Algorithm, DecodingKey, Validation, decode, decode_header,
    errors::ErrorKind,
    jwk::{Jwk, JwkSet},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::services::auth::principal::TokenPrincipal;

const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("issuer did not match the issuer returned by provider, expected {expected:?} got {actual:?}")]
    IssuerMismatch { expected: String, actual: String },
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("malformed jwt: {0}")]
    Malformed(&'static str),
    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(Algorithm),
    #[error("no signing key matches kid {0:?}")]
    UnknownKey(String),
    #[error("invalid configuration, client_id must be provided or skip_client_id_check must be set")]
    MissingClientId,
    #[error("id token issued by a different provider, expected {expected:?} got {actual:?}")]
    IssuerMismatch { expected: String, actual: String },
    #[error("expected audience {expected:?} got {actual:?}")]
    AudienceMismatch {
        expected: String,
        actual: Vec<String>,
    },
    #[error("token is expired")]
    Expired,
    #[error("missing required claim: {0}")]
    MissingClaim(&'static str),
    #[error("invalid claims: {0}")]
    Claims(#[from] serde_json::Error),
    #[error("access token hash does not match at_hash")]
    AccessTokenHashMismatch,
    #[error("failed to verify id token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Verification seam used by the middleware.
///
/// `IdTokenVerifier` is the production implementation; tests and remote
/// introspection-style verifiers can plug in their own.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<TokenPrincipal, VerifyError>;
}

#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    issuer: String,
    jwks_uri: String,
    #[serde(default)]
    id_token_signing_alg_values_supported: Vec<String>,
}

/// A discovered OpenID Connect provider.
#[derive(Debug, Clone)]
pub struct Provider {
    issuer: String,
    keys: Arc<JwkSet>,
    algorithms: Vec<Algorithm>,
}

impl Provider {
    /// Fetch `{issuer}/.well-known/openid-configuration` and the JWK set it
    /// points to.
    pub async fn discover(http: &reqwest::Client, issuer: &str) -> Result<Self, DiscoveryError> {
        let well_known = format!("{}{}", issuer.trim_end_matches('/'), WELL_KNOWN_PATH);
        let metadata: ProviderMetadata = fetch_json(http, &well_known).await?;

        if metadata.issuer != issuer {
            return Err(DiscoveryError::IssuerMismatch {
                expected: issuer.to_string(),
                actual: metadata.issuer,
            });
        }

        let keys: JwkSet = fetch_json(http, &metadata.jwks_uri).await?;
        let algorithms = supported_algorithms(&metadata.id_token_signing_alg_values_supported);

        info!(
            issuer = %issuer,
            keys = keys.keys.len(),
            algorithms = ?algorithms,
            "oidc provider discovered"
        );

        Ok(Self::from_parts(issuer, keys, algorithms))
    }

    /// Build a provider from already known key material.
    pub fn from_parts(issuer: impl Into<String>, keys: JwkSet, algorithms: Vec<Algorithm>) -> Self {
        Self {
            issuer: issuer.into(),
            keys: Arc::new(keys),
            algorithms,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn verifier(&self, config: VerifierConfig) -> IdTokenVerifier {
        IdTokenVerifier {
            issuer: self.issuer.clone(),
            keys: Arc::clone(&self.keys),
            algorithms: self.algorithms.clone(),
            config,
        }
    }
}

async fn fetch_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
) -> Result<T, DiscoveryError> {
    let parsed = url::Url::parse(url).map_err(|source| DiscoveryError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    let resp = http
        .get(parsed)
        .send()
        .await
        .map_err(|source| DiscoveryError::Fetch {
            url: url.to_string(),
            source,
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(DiscoveryError::Status {
            url: url.to_string(),
            status,
        });
    }

    resp.json::<T>()
        .await
        .map_err(|source| DiscoveryError::Fetch {
            url: url.to_string(),
            source,
        })
}

// Providers that do not advertise algorithms are assumed to sign with RS256.
fn supported_algorithms(advertised: &[String]) -> Vec<Algorithm> {
    let algorithms: Vec<Algorithm> = advertised
        .iter()
        .filter_map(|name| match Algorithm::from_str(name) {
            Ok(alg) => Some(alg),
            Err(_) => {
                debug!(alg = %name, "ignoring unsupported signing algorithm");
                None
            }
        })
        .collect();

    if algorithms.is_empty() {
        vec![Algorithm::RS256]
    } else {
        algorithms
    }
}

/// Per-verifier checks.
#[derive(Debug, Clone, Default)]
pub struct VerifierConfig {
    /// Expected `aud` entry.
    pub client_id: String,
    pub skip_client_id_check: bool,
    pub skip_expiry_check: bool,
    /// Accept tokens without checking their signature.
    ///
    /// INSECURE. Only for tests and local debugging against captured tokens.
    pub insecure_skip_signature_check: bool,
    /// Allowed clock skew for `exp`/`nbf`, in seconds.
    pub leeway_seconds: u64,
}

/// Verifies ID tokens issued by one provider.
#[derive(Debug, Clone)]
pub struct IdTokenVerifier {
    issuer: String,
    keys: Arc<JwkSet>,
    algorithms: Vec<Algorithm>,
    config: VerifierConfig,
}

impl IdTokenVerifier {
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn verify_token(&self, token: &str) -> Result<TokenPrincipal, VerifyError> {
        if !self.config.skip_client_id_check && self.config.client_id.is_empty() {
            return Err(VerifyError::MissingClientId);
        }

        if self.config.insecure_skip_signature_check {
            return self.verify_unsigned(token);
        }

        let header = decode_header(token)?;
        if !self.algorithms.contains(&header.alg) {
            return Err(VerifyError::UnsupportedAlgorithm(header.alg));
        }

        let validation = self.validation(header.alg);

        let candidates: Vec<&Jwk> = match header.kid.as_deref() {
            Some(kid) => vec![
                self.keys
                    .find(kid)
                    .ok_or_else(|| VerifyError::UnknownKey(kid.to_string()))?,
            ],
            None => self.keys.keys.iter().collect(),
        };

        // Without a kid every published key is a candidate; a signature
        // failure on one of them only means "try the next".
        let mut last_err = VerifyError::UnknownKey(String::new());
        for jwk in candidates {
            let key = match DecodingKey::from_jwk(jwk) {
                Ok(key) => key,
                Err(e) => {
                    debug!(error = %e, kid = ?jwk.common.key_id, "skipping unusable jwk");
                    last_err = e.into();
                    continue;
                }
            };

            match decode::<Map<String, Value>>(token, &key, &validation) {
                Ok(data) => return TokenPrincipal::from_claims(header.alg, data.claims),
                Err(e) if is_key_mismatch(e.kind()) => last_err = e.into(),
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err)
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = self.config.leeway_seconds;
        validation.required_spec_claims.insert("iss".to_string());
        validation.required_spec_claims.insert("sub".to_string());

        if self.config.skip_client_id_check {
            validation.validate_aud = false;
        } else {
            // `Validation` only compares `aud` when the token carries one.
            validation.set_audience(&[&self.config.client_id]);
            validation.required_spec_claims.insert("aud".to_string());
        }

        if self.config.skip_expiry_check {
            validation.validate_exp = false;
            validation.required_spec_claims.remove("exp");
        }

        validation
    }

    // Claims are still checked; only the signature is not.
    fn verify_unsigned(&self, token: &str) -> Result<TokenPrincipal, VerifyError> {
        warn!("verifying id token WITHOUT signature check");

        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(_), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VerifyError::Malformed("expected three dot-separated segments"));
        };

        let engine = &base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let header: Value = engine
            .decode(header)
            .map_err(|_| VerifyError::Malformed("header is not base64url"))
            .and_then(|raw| serde_json::from_slice(&raw).map_err(VerifyError::from))?;
        let claims: Map<String, Value> = engine
            .decode(payload)
            .map_err(|_| VerifyError::Malformed("payload is not base64url"))
            .and_then(|raw| serde_json::from_slice(&raw).map_err(VerifyError::from))?;

        let alg = header
            .get("alg")
            .and_then(Value::as_str)
            .and_then(|name| Algorithm::from_str(name).ok())
            .unwrap_or(Algorithm::RS256);

        let principal = TokenPrincipal::from_claims(alg, claims)?;

        if principal.issuer != self.issuer {
            return Err(VerifyError::IssuerMismatch {
                expected: self.issuer.clone(),
                actual: principal.issuer,
            });
        }

        if !self.config.skip_client_id_check
            && !principal.audience.iter().any(|a| a == &self.config.client_id)
        {
            return Err(VerifyError::AudienceMismatch {
                expected: self.config.client_id.clone(),
                actual: principal.audience,
            });
        }

        if !self.config.skip_expiry_check {
            let expiry = principal.expiry.ok_or(VerifyError::MissingClaim("exp"))?;
            let leeway = chrono::Duration::seconds(self.config.leeway_seconds as i64);
            if expiry + leeway < chrono::Utc::now() {
                return Err(VerifyError::Expired);
            }
        }

        Ok(principal)
    }
}

fn is_key_mismatch(kind: &ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::InvalidSignature | ErrorKind::InvalidKeyFormat | ErrorKind::InvalidAlgorithm
    )
}

#[async_trait]
impl TokenVerifier for IdTokenVerifier {
    async fn verify(&self, token: &str) -> Result<TokenPrincipal, VerifyError> {
        self.verify_token(token)
    }
}
