//! Authentication service.
//!
//! Orchestrates signup, login, session checks and the two-phase password
//! reset on top of the credential and reset-token stores.
//!
//! Each storage unit runs under [`Database::bounded`] and each mutation in
//! its own transaction that starts with a write. Argon2 work always happens
//! between transactions, never inside one.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::notify::{reset_link, ResetNotice, ResetNotifier};
use crate::auth::password::{PasswordError, PasswordHasher};
use crate::auth::session::{SessionIssuer, SessionRejection, SessionToken};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::{CredentialStore, ResetToken, ResetTokenStore};
use crate::{AuthDbError, Database};

/// Outcome of a rejected or failed auth operation.
#[derive(Error, Debug)]
pub enum AuthError {
    /// A required field was not supplied.
    #[error("missing credential")]
    MissingCredential,

    /// Unknown identifier, wrong password, or no usable credential.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Unknown, superseded or already used reset token.
    #[error("invalid reset token")]
    InvalidToken,

    /// The reset token is past its lifetime.
    #[error("reset token expired")]
    TokenExpired,

    /// The session token was refused.
    #[error("session rejected: {0}")]
    Session(#[from] SessionRejection),

    /// Backing store unreachable, failed or timed out.
    #[error("storage error: {0}")]
    Storage(#[from] AuthDbError),

    /// Password hashing failed.
    #[error("password error: {0}")]
    Password(#[from] PasswordError),

    /// Signing a session token failed.
    #[error("session signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl AuthError {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthError::Storage(e)
                if !matches!(e, AuthDbError::Config(_) | AuthDbError::Validation(_))
        )
    }
}

/// Result type for auth operations.
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Account, session and password-reset operations.
pub struct AuthService {
    db: Database,
    hasher: Arc<PasswordHasher>,
    sessions: SessionIssuer,
    notifier: Arc<dyn ResetNotifier>,
    clock: Arc<dyn Clock>,
    reset_lifetime: chrono::Duration,
    reset_link_base: String,
}

impl AuthService {
    /// Create a service on the wall clock.
    pub fn new(db: Database, config: &Config, notifier: Arc<dyn ResetNotifier>) -> AuthResult<Self> {
        Self::with_clock(db, config, notifier, Arc::new(SystemClock))
    }

    /// Create a service reading time from `clock`.
    pub fn with_clock(
        db: Database,
        config: &Config,
        notifier: Arc<dyn ResetNotifier>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        let hasher = PasswordHasher::new(&config.hashing)?;
        let sessions = SessionIssuer::new(&config.session, Arc::clone(&clock))?;

        Ok(Self {
            db,
            hasher: Arc::new(hasher),
            sessions,
            notifier,
            clock,
            reset_lifetime: config.reset.token_lifetime()?,
            reset_link_base: config.reset.link_base_url.clone(),
        })
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Register `identifier`, or log in if it is already registered.
    ///
    /// Signup for an existing account is treated as a login attempt with the
    /// supplied password. A signup that loses an insert race to a concurrent
    /// one is checked against the winner's stored hash.
    pub async fn signup(&self, identifier: &str, password: Option<&str>) -> AuthResult<SessionToken> {
        let Some(password) = password else {
            return Err(AuthError::MissingCredential);
        };

        if let Some(existing) = self.lookup_hash(identifier).await? {
            debug!(identifier, "Signup for registered identifier, treating as login");
            return self
                .login_with_hash(identifier, Some(password), Some(existing))
                .await;
        }

        let hash = self.hasher.hash_async(password).await?;

        let account_id = self
            .db
            .bounded(async {
                let mut tx = self.db.begin().await?;
                let id = CredentialStore::new(&mut tx)
                    .create_account(identifier, &hash)
                    .await?;
                tx.commit().await?;
                Ok::<_, AuthDbError>(id)
            })
            .await?;
        info!(identifier, account_id, "Signup stored account");

        self.login_with_hash(identifier, Some(password), None).await
    }

    /// Check a password and issue a session token.
    pub async fn login(&self, identifier: &str, password: Option<&str>) -> AuthResult<SessionToken> {
        self.login_with_hash(identifier, password, None).await
    }

    /// Login against `prefetched`, or the stored hash when `None`.
    async fn login_with_hash(
        &self,
        identifier: &str,
        password: Option<&str>,
        prefetched: Option<String>,
    ) -> AuthResult<SessionToken> {
        let Some(password) = password else {
            debug!(identifier, "Login without password");
            return Err(AuthError::InvalidCredentials);
        };

        let hash = match prefetched {
            Some(hash) => Some(hash),
            None => self.lookup_hash(identifier).await?,
        };
        let has_credential = hash.is_some();

        if !self.hasher.verify_async(hash, password).await? {
            if has_credential {
                debug!(identifier, "Login failed: wrong password");
            } else {
                debug!(identifier, "Login failed: no active credential");
            }
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.sessions.issue(identifier)?;
        info!(identifier, "Login succeeded");
        Ok(token)
    }

    /// Verify a session token and return the identifier it belongs to.
    pub fn check_session(&self, token: &str) -> AuthResult<String> {
        Ok(self.sessions.verify(token)?)
    }

    /// Start a password reset for `identifier`.
    ///
    /// Always succeeds for well-formed requests, whether or not the account
    /// exists. For a known account the current password stops working at
    /// once and a notice with a fresh token goes to the notifier.
    ///
    /// Both outcomes mint a token, build the link, write one upsert and
    /// commit. Only the notifier call differs.
    pub async fn request_password_reset(&self, identifier: &str) -> AuthResult<()> {
        let token = mint_reset_token();
        let issued_at = self.clock.unix_now();
        let link = reset_link(&self.reset_link_base, &token);

        let known = self
            .db
            .bounded(async {
                let mut tx = self.db.begin().await?;
                let known = CredentialStore::new(&mut tx)
                    .set_password_hash(identifier, None)
                    .await?;
                let mut tokens = ResetTokenStore::new(&mut tx);
                if known {
                    tokens.upsert_token(identifier, &token, issued_at).await?;
                } else {
                    tokens.record_unmatched(&token, issued_at).await?;
                }
                tx.commit().await?;
                Ok::<_, AuthDbError>(known)
            })
            .await?;

        if !known {
            debug!(identifier, "Reset requested for unknown identifier");
            return Ok(());
        }

        let notice = ResetNotice {
            identifier: identifier.to_string(),
            token,
            link,
        };
        if let Err(e) = self.notifier.deliver(&notice) {
            warn!(identifier, error = %e, "Reset notice was not delivered");
        }

        info!(identifier, "Password reset started");
        Ok(())
    }

    /// Finish a password reset with `token` and set `new_password`.
    ///
    /// The token is consumed, so a second confirmation with it fails.
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: Option<&str>,
    ) -> AuthResult<()> {
        let found = self
            .db
            .bounded(async {
                let mut conn = self.db.pool().acquire().await?;
                let Some(row) = ResetTokenStore::new(&mut conn).lookup_by_token(token).await? else {
                    return Ok(None);
                };
                let account = CredentialStore::new(&mut conn)
                    .get_account(&row.identifier)
                    .await?;
                Ok::<_, AuthDbError>(Some((row, account.is_some())))
            })
            .await?;

        let Some((row, account_exists)) = found else {
            debug!("Reset token not recognised");
            return Err(AuthError::InvalidToken);
        };
        let ResetToken {
            identifier,
            issued_at,
            ..
        } = row;

        if !account_exists {
            warn!(identifier = %identifier, "Reset token bound to a missing account");
            return Err(AuthError::InvalidToken);
        }

        let not_before = self.clock.unix_now() - self.reset_lifetime.num_seconds();
        if issued_at < not_before {
            info!(identifier = %identifier, "Reset token expired");
            return Err(AuthError::TokenExpired);
        }

        let Some(new_password) = new_password else {
            return Err(AuthError::MissingCredential);
        };
        let hash = self.hasher.hash_async(new_password).await?;

        let applied = self
            .db
            .bounded(async {
                let mut tx = self.db.begin().await?;
                if !CredentialStore::new(&mut tx)
                    .complete_reset(&identifier, token, &hash, not_before)
                    .await?
                {
                    tx.rollback().await?;
                    return Ok(false);
                }
                ResetTokenStore::new(&mut tx).delete_token(token).await?;
                tx.commit().await?;
                Ok::<_, AuthDbError>(true)
            })
            .await?;

        if !applied {
            debug!(identifier = %identifier, "Reset token superseded before confirmation");
            return Err(AuthError::InvalidToken);
        }

        info!(identifier = %identifier, "Password reset completed");
        Ok(())
    }

    /// Delete reset tokens past their lifetime. Returns how many were removed.
    ///
    /// Accounts they belonged to stay `ResetPending` until a new reset
    /// request succeeds.
    pub async fn purge_expired_reset_tokens(&self) -> AuthResult<u64> {
        let cutoff = self.clock.unix_now() - self.reset_lifetime.num_seconds();
        let removed = self
            .db
            .bounded(async {
                let mut conn = self.db.pool().acquire().await?;
                ResetTokenStore::new(&mut conn).delete_expired(cutoff).await
            })
            .await?;

        if removed > 0 {
            info!(removed, "Purged expired reset tokens");
        }
        Ok(removed)
    }

    async fn lookup_hash(&self, identifier: &str) -> AuthResult<Option<String>> {
        let hash = self
            .db
            .bounded(async {
                let mut conn = self.db.pool().acquire().await?;
                CredentialStore::new(&mut conn)
                    .get_password_hash(identifier)
                    .await
            })
            .await?;
        Ok(hash)
    }
}

/// A fresh reset token from the OS random source.
fn mint_reset_token() -> String {
    uuid::Uuid::new_v4().to_string()
}
