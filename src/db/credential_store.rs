//! Credential store: identifier to password hash.
//!
//! The store borrows a single connection, which is usually the inside of a
//! transaction (`&mut *tx`) and otherwise a plain pooled connection. It is
//! the caller that decides where the transaction boundary lies.

use sqlx::SqliteConnection;

use super::account::{Account, AccountStatus};
use crate::Result;

/// Store for account rows.
pub struct CredentialStore<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CredentialStore<'c> {
    /// Create a store over the given connection.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Insert an account, or return the id of the existing one.
    ///
    /// Uniqueness is resolved by the INSERT itself (`ON CONFLICT DO NOTHING`),
    /// so two racing signups for the same identifier cannot both insert.
    /// An existing row is left untouched, including its hash.
    pub async fn create_account(&mut self, identifier: &str, password_hash: &str) -> Result<i64> {
        let inserted: Option<i64> = sqlx::query_scalar(
            "INSERT INTO accounts (identifier, password_hash, status)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(identifier) DO NOTHING
             RETURNING id",
        )
        .bind(identifier)
        .bind(password_hash)
        .bind(AccountStatus::Active.as_str())
        .fetch_optional(&mut *self.conn)
        .await?;

        if let Some(id) = inserted {
            return Ok(id);
        }

        let id: i64 = sqlx::query_scalar("SELECT id FROM accounts WHERE identifier = ?1")
            .bind(identifier)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(id)
    }

    /// Get the hash a login may be checked against.
    ///
    /// Returns `None` both for unknown identifiers and for accounts with a
    /// pending reset.
    pub async fn get_password_hash(&mut self, identifier: &str) -> Result<Option<String>> {
        let account = self.get_account(identifier).await?;
        Ok(account.and_then(|a| a.active_hash().map(str::to_string)))
    }

    /// Get an account by identifier (exact, case-sensitive match).
    pub async fn get_account(&mut self, identifier: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, identifier, password_hash, status, created_at
             FROM accounts WHERE identifier = ?1",
        )
        .bind(identifier)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(account)
    }

    /// Overwrite the stored hash.
    ///
    /// `Some(hash)` makes the account `Active`, while `None` clears the hash
    /// and marks the account `ResetPending`. Returns `false` if no such
    /// account exists.
    pub async fn set_password_hash(
        &mut self,
        identifier: &str,
        password_hash: Option<&str>,
    ) -> Result<bool> {
        let status = match password_hash {
            Some(_) => AccountStatus::Active,
            None => AccountStatus::ResetPending,
        };

        let result = sqlx::query(
            "UPDATE accounts SET password_hash = ?1, status = ?2 WHERE identifier = ?3",
        )
        .bind(password_hash)
        .bind(status.as_str())
        .bind(identifier)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set a new hash only if `token` is still the account's current reset
    /// token and was issued no earlier than `not_before` (Unix seconds).
    ///
    /// Returns `false` if the token was replaced, expired or removed since it
    /// was checked.
    pub async fn complete_reset(
        &mut self,
        identifier: &str,
        token: &str,
        password_hash: &str,
        not_before: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE accounts SET password_hash = ?1, status = ?2
             WHERE identifier = ?3
               AND EXISTS (
                   SELECT 1 FROM pw_reset
                   WHERE pw_reset.identifier = accounts.identifier
                     AND pw_reset.token = ?4
                     AND pw_reset.issued_at >= ?5
               )",
        )
        .bind(password_hash)
        .bind(AccountStatus::Active.as_str())
        .bind(identifier)
        .bind(token)
        .bind(not_before)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of accounts.
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count)
    }
}
