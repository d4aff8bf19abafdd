/*
 * Responsibility
 * - Extractors handlers use to read the principal an auth middleware attached
 */
mod principal;

pub use principal::{Authenticated, MaybeAuthenticated};
