//! Bearer ID token (OIDC) → `TokenPrincipal` in request extensions.
//!
//! Per request:
//! 1. extract the bearer token (`MissingCredential` / `MalformedCredential`)
//! 2. verify signature and standard claims (`Verification`)
//! 3. apply the email policy (`PolicyViolation` / `Configuration`)
//! 4. attach the principal and call the next handler
//!
//! Any failure goes to the failure router; the next handler never runs.

use std::{fmt, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::{self, Next},
    response::Response,
};
use tracing::{debug, error};

use crate::error::AuthFailure;
use crate::services::auth::{
    extract,
    failure::{FailureHandler, FailureRouter},
    oidc::{DiscoveryError, Provider, TokenVerifier, VerifierConfig},
    policy::EmailPolicy,
    principal::{TokenPrincipal, attach_principal},
};

/// Token middleware settings, fixed at construction.
#[derive(Clone, Default)]
pub struct MiddlewareConfig {
    /// Expected audience (`aud`) of incoming tokens.
    pub client_id: String,
    /// Accept tokens for any audience.
    pub skip_client_id_check: bool,
    /// Accept expired tokens.
    pub skip_expiry_check: bool,
    /// Do not verify token signatures.
    ///
    /// INSECURE: anyone can mint a token that passes. Tests and local
    /// debugging only; nothing in this crate turns it on.
    pub insecure_skip_signature_check: bool,
    /// Allowed clock skew, in seconds.
    pub leeway_seconds: u64,
    /// Required value of the `email` claim.
    pub email: String,
    /// Disable the email policy. When `false`, `email` must be set or every
    /// request fails with a configuration error.
    pub skip_email_check: bool,
    /// Custom failure handler. `None` keeps the default bare 401.
    pub auth_failed_handler: Option<FailureHandler>,
}

impl fmt::Debug for MiddlewareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareConfig")
            .field("client_id", &self.client_id)
            .field("skip_client_id_check", &self.skip_client_id_check)
            .field("skip_expiry_check", &self.skip_expiry_check)
            .field(
                "insecure_skip_signature_check",
                &self.insecure_skip_signature_check,
            )
            .field("leeway_seconds", &self.leeway_seconds)
            .field("email", &self.email)
            .field("skip_email_check", &self.skip_email_check)
            .field("auth_failed_handler", &self.auth_failed_handler.is_some())
            .finish()
    }
}

impl MiddlewareConfig {
    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            client_id: self.client_id.clone(),
            skip_client_id_check: self.skip_client_id_check,
            skip_expiry_check: self.skip_expiry_check,
            insecure_skip_signature_check: self.insecure_skip_signature_check,
            leeway_seconds: self.leeway_seconds,
        }
    }
}

#[derive(Clone)]
pub struct OidcMiddleware {
    inner: Arc<Inner>,
}

struct Inner {
    verifier: Arc<dyn TokenVerifier>,
    policy: EmailPolicy,
    failure: FailureRouter,
}

impl fmt::Debug for OidcMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcMiddleware")
            .field("policy", &self.inner.policy)
            .field("failure", &self.inner.failure)
            .finish()
    }
}

impl OidcMiddleware {
    /// Discover `issuer` and build the middleware on top of its keys.
    ///
    /// Fails if the provider cannot be reached or its metadata is invalid;
    /// there is nothing useful to do with requests in that case.
    pub async fn discover(
        http: &reqwest::Client,
        issuer: &str,
        config: MiddlewareConfig,
    ) -> Result<Self, DiscoveryError> {
        let provider = Provider::discover(http, issuer).await?;
        Ok(Self::from_provider(&provider, config))
    }

    pub fn from_provider(provider: &Provider, config: MiddlewareConfig) -> Self {
        let verifier = provider.verifier(config.verifier_config());
        Self::with_verifier(Arc::new(verifier), config)
    }

    pub fn with_verifier(verifier: Arc<dyn TokenVerifier>, config: MiddlewareConfig) -> Self {
        let policy = EmailPolicy::new(config.email, config.skip_email_check);
        if policy.is_misconfigured() {
            error!("email check enabled without an email; every authenticated request will be rejected");
        }
        if !config.skip_client_id_check && config.client_id.is_empty() {
            error!("client id check enabled without a client id; every token will be rejected");
        }

        Self {
            inner: Arc::new(Inner {
                verifier,
                policy,
                failure: FailureRouter::new(config.auth_failed_handler),
            }),
        }
    }

    /// Run extraction, verification and policy checks for one request.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<TokenPrincipal, AuthFailure> {
        let token = extract::bearer_token(headers)?;
        let principal = self.inner.verifier.verify(token).await?;
        self.inner.policy.check(&principal)?;
        Ok(principal)
    }

    /// Put every route of `router` behind this middleware.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(self, oidc_middleware))
    }
}

async fn oidc_middleware(
    State(mw): State<OidcMiddleware>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match mw.authenticate(req.headers()).await {
        Ok(principal) => {
            debug!(subject = %principal.subject, "bearer token verified");
            attach_principal(req.extensions_mut(), principal);
            next.run(req).await
        }
        Err(failure) => mw.inner.failure.route(failure),
    }
}
