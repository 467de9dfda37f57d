//! Reset token store: at most one live password-reset token per account.

use sqlx::SqliteConnection;

use crate::Result;

/// Password reset token row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ResetToken {
    /// Row ID.
    pub id: i64,
    /// Account identifier the token is bound to.
    pub identifier: String,
    /// Opaque token value.
    pub token: String,
    /// Issue time, Unix seconds.
    pub issued_at: i64,
}

/// Store for reset token rows.
pub struct ResetTokenStore<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ResetTokenStore<'c> {
    /// Create a store over the given connection.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Bind `token` to `identifier`, replacing any earlier token in place.
    ///
    /// A single statement, so concurrent requests for the same identifier
    /// leave exactly one row holding whichever token committed last.
    pub async fn upsert_token(&mut self, identifier: &str, token: &str, issued_at: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO pw_reset (identifier, token, issued_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(identifier) DO UPDATE SET
                 token = excluded.token,
                 issued_at = excluded.issued_at",
        )
        .bind(identifier)
        .bind(token)
        .bind(issued_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Record a reset request that matched no account.
    ///
    /// Overwrites the single row of `pw_reset_unmatched` with the same kind
    /// of upsert `upsert_token` performs, so both outcomes of a request write
    /// and commit. Nothing here can be looked up as a reset token.
    pub async fn record_unmatched(&mut self, token: &str, issued_at: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO pw_reset_unmatched (slot, token, issued_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(slot) DO UPDATE SET
                 token = excluded.token,
                 issued_at = excluded.issued_at",
        )
        .bind(token)
        .bind(issued_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Find the row holding `token`.
    pub async fn lookup_by_token(&mut self, token: &str) -> Result<Option<ResetToken>> {
        let row = sqlx::query_as::<_, ResetToken>(
            "SELECT id, identifier, token, issued_at FROM pw_reset WHERE token = ?1",
        )
        .bind(token)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row)
    }

    /// Find the current token for an account.
    pub async fn get_by_identifier(&mut self, identifier: &str) -> Result<Option<ResetToken>> {
        let row = sqlx::query_as::<_, ResetToken>(
            "SELECT id, identifier, token, issued_at FROM pw_reset WHERE identifier = ?1",
        )
        .bind(identifier)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row)
    }

    /// Remove a token once it has been used.
    pub async fn delete_token(&mut self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pw_reset WHERE token = ?1")
            .bind(token)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete tokens issued before `cutoff` (Unix seconds).
    ///
    /// Expired tokens are already rejected at confirmation time; this only
    /// reclaims space.
    pub async fn delete_expired(&mut self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM pw_reset WHERE issued_at < ?1")
            .bind(cutoff)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected())
    }
}
