pub mod ory;
pub mod store;
pub mod validator;

pub use ory::OrySessionStore;
pub use store::{SessionIdentity, SessionPrincipal, SessionStore, SessionStoreError};
pub use validator::{SessionError, SessionValidator};
