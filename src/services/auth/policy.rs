//! Claim checks layered on top of a cryptographically verified token.
//!
//! Policies never see unverified tokens: the middleware only calls them after
//! the verifier accepted the signature and standard claims.

use serde::Deserialize;

use crate::error::AuthFailure;
use crate::services::auth::principal::TokenPrincipal;

#[derive(Deserialize)]
struct EmailClaim {
    email: String,
}

/// Require the `email` claim to equal a configured address, ignoring case
/// (Unicode lowercase on both sides).
#[derive(Debug, Clone, Default)]
pub struct EmailPolicy {
    expected: String,
    enabled: bool,
}

impl EmailPolicy {
    pub fn new(expected: impl Into<String>, skip: bool) -> Self {
        Self {
            expected: expected.into(),
            enabled: !skip,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enabled without an address to compare against.
    pub fn is_misconfigured(&self) -> bool {
        self.enabled && self.expected.is_empty()
    }

    pub fn check(&self, principal: &TokenPrincipal) -> Result<(), AuthFailure> {
        if !self.enabled {
            return Ok(());
        }

        if self.expected.is_empty() {
            return Err(AuthFailure::Configuration(
                "email must be provided or skip_email_check must be set".into(),
            ));
        }

        let claim: EmailClaim = principal.claims().map_err(AuthFailure::verification)?;

        if self.expected.to_lowercase() != claim.email.to_lowercase() {
            return Err(AuthFailure::PolicyViolation(format!(
                "expected email {:?} got {:?}",
                self.expected, claim.email
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::Algorithm;
    use serde_json::{Value, json};

    use super::*;
    use crate::error::FailureKind;

    fn principal(claims: Value) -> TokenPrincipal {
        let Value::Object(map) = claims else {
            panic!("claims must be an object");
        };
        TokenPrincipal::from_claims(Algorithm::EdDSA, map).unwrap()
    }

    fn with_email(email: &str) -> TokenPrincipal {
        principal(json!({ "iss": "https://issuer.example", "sub": "u", "email": email }))
    }

    #[test]
    fn disabled_policy_admits_everything() {
        let p = principal(json!({ "iss": "https://issuer.example", "sub": "u" }));
        assert!(EmailPolicy::disabled().check(&p).is_ok());
        assert!(EmailPolicy::new("", true).check(&p).is_ok());
    }

    #[test]
    fn matching_email_is_case_insensitive() {
        let policy = EmailPolicy::new("A@X.com", false);
        assert!(policy.check(&with_email("a@x.COM")).is_ok());
    }

    #[test]
    fn matching_folds_non_ascii_case() {
        let policy = EmailPolicy::new("ÉLISE@EXÄMPLE.COM", false);
        assert!(policy.check(&with_email("élise@exämple.com")).is_ok());
        assert!(policy.check(&with_email("elise@example.com")).is_err());
    }

    #[test]
    fn mismatch_names_expected_and_actual() {
        let err = EmailPolicy::new("b@x.com", false)
            .check(&with_email("a@x.com"))
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::PolicyViolation);
        assert_eq!(err.to_string(), r#"expected email "b@x.com" got "a@x.com""#);
    }

    #[test]
    fn enabled_without_expected_email_is_a_configuration_error() {
        let policy = EmailPolicy::new("", false);
        assert!(policy.is_misconfigured());

        let err = policy.check(&with_email("a@x.com")).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Configuration);
    }

    #[test]
    fn absent_or_mistyped_email_is_a_verification_error() {
        let policy = EmailPolicy::new("a@x.com", false);

        let absent = principal(json!({ "iss": "https://issuer.example", "sub": "u" }));
        assert_eq!(
            policy.check(&absent).unwrap_err().kind(),
            FailureKind::Verification
        );

        let mistyped = principal(json!({ "iss": "https://issuer.example", "sub": "u", "email": 7 }));
        assert_eq!(
            policy.check(&mistyped).unwrap_err().kind(),
            FailureKind::Verification
        );
    }
}
