//! authdb - account signup, login, session tokens and password reset over SQLite.

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use auth::{
    AuthError, AuthResult, AuthService, LogNotifier, MemoryNotifier, PasswordHasher, ResetNotice,
    ResetNotifier, SessionIssuer, SessionRejection, SessionToken,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::{Account, AccountStatus, CredentialStore, Database, ResetToken, ResetTokenStore};
pub use error::{AuthDbError, Result};
