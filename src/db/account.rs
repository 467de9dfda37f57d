//! Account model for authdb.

use std::fmt;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// Password lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountStatus {
    /// The stored hash is the live credential.
    #[default]
    Active,
    /// A reset was requested; no password is accepted until it is confirmed.
    ResetPending,
}

impl AccountStatus {
    /// Convert status to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::ResetPending => "reset_pending",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "reset_pending" => Ok(AccountStatus::ResetPending),
            _ => Err(format!("unknown account status: {s}")),
        }
    }
}

/// A registered account.
#[derive(Debug, Clone)]
pub struct Account {
    /// Row ID.
    pub id: i64,
    /// Login identifier (the email address), unique.
    pub identifier: String,
    /// Argon2 PHC hash, `None` while a reset is pending.
    pub password_hash: Option<String>,
    /// Password lifecycle state.
    pub status: AccountStatus,
    /// Creation timestamp (SQLite `datetime('now')`, UTC).
    pub created_at: String,
}

impl Account {
    /// The hash a login may be checked against.
    ///
    /// `None` for accounts with a pending reset, even if a hash were present.
    pub fn active_hash(&self) -> Option<&str> {
        match self.status {
            AccountStatus::Active => self.password_hash.as_deref(),
            AccountStatus::ResetPending => None,
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for Account {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status.parse().map_err(|e: String| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: e.into(),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            identifier: row.try_get("identifier")?,
            password_hash: row.try_get("password_hash")?,
            status,
            created_at: row.try_get("created_at")?,
        })
    }
}
