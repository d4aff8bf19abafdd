/*
 * Responsibility
 * - Authentication failure taxonomy shared by every middleware in this crate
 * - Stable kind labels for logs, independent of what the client gets to see
 * - Conversion from verifier errors (configuration vs. verification)
 */
use serde::Serialize;
use thiserror::Error;
use tower::BoxError;

use crate::services::auth::oidc::VerifyError;

/// Body written by the verbose failure handler.
///
/// The default handler never writes a body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Coarse failure class, for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    MissingCredential,
    MalformedCredential,
    Verification,
    PolicyViolation,
    Configuration,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "MISSING_CREDENTIAL",
            Self::MalformedCredential => "MALFORMED_CREDENTIAL",
            Self::Verification => "VERIFICATION_ERROR",
            Self::PolicyViolation => "POLICY_VIOLATION",
            Self::Configuration => "CONFIGURATION_ERROR",
        }
    }
}

/// Why a request was not authenticated.
///
/// The cause strings are meant for the failure handler and for logs. The
/// default handler answers every variant with the same bare 401.
#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("credential is missing")]
    MissingCredential,
    #[error("credential is malformed: {0}")]
    MalformedCredential(&'static str),
    #[error("{0}")]
    Verification(#[source] BoxError),
    #[error("{0}")]
    PolicyViolation(String),
    #[error("invalid configuration, {0}")]
    Configuration(String),
}

impl AuthFailure {
    pub fn verification(cause: impl Into<BoxError>) -> Self {
        Self::Verification(cause.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingCredential => FailureKind::MissingCredential,
            Self::MalformedCredential(_) => FailureKind::MalformedCredential,
            Self::Verification(_) => FailureKind::Verification,
            Self::PolicyViolation(_) => FailureKind::PolicyViolation,
            Self::Configuration(_) => FailureKind::Configuration,
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorBody {
                code: self.kind().as_str(),
                message: self.to_string(),
            },
        }
    }
}

impl From<VerifyError> for AuthFailure {
    fn from(e: VerifyError) -> Self {
        match e {
            // The verifier was built without a client id and without opting
            // out of the audience check: no token can ever pass.
            VerifyError::MissingClientId => Self::Configuration(
                "client_id must be provided or skip_client_id_check must be set".into(),
            ),
            other => Self::verification(other),
        }
    }
}
