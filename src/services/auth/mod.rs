pub mod extract;
pub mod failure;
pub mod oidc;
pub mod policy;
pub mod principal;

#[cfg(test)]
pub(crate) mod testing;

pub use failure::{FailureHandler, FailureRouter, verbose_handler};
pub use oidc::{DiscoveryError, IdTokenVerifier, Provider, TokenVerifier, VerifierConfig, VerifyError};
pub use policy::EmailPolicy;
pub use principal::{Principal, TokenPrincipal, principal_from};
