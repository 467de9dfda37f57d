//! Authentication module for authdb.
//!
//! Password hashing, session tokens, reset notices and the service that ties
//! them to the stores.

mod notify;
mod password;
mod service;
mod session;

pub use notify::{reset_link, LogNotifier, MemoryNotifier, NotifyError, ResetNotice, ResetNotifier};
pub use password::{PasswordError, PasswordHasher};
pub use service::{AuthError, AuthResult, AuthService};
pub use session::{SessionClaims, SessionIssuer, SessionRejection, SessionToken};
