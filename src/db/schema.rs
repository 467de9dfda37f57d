//! Database schema and migrations for authdb.
//!
//! Migrations are applied in order when the database is opened. The
//! schema_version table records how many have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: accounts
    r#"
CREATE TABLE accounts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier      TEXT NOT NULL UNIQUE,    -- email, case-sensitive as given
    password_hash   TEXT,                    -- Argon2 PHC string, NULL while a reset is pending
    status          TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'reset_pending')),
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
    // v2: password reset tokens, at most one per account
    r#"
CREATE TABLE pw_reset (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier  TEXT NOT NULL UNIQUE REFERENCES accounts(identifier),
    token       TEXT NOT NULL UNIQUE,
    issued_at   INTEGER NOT NULL         -- Unix seconds
);
"#,
    // v3: housekeeping scans by age
    r#"
CREATE INDEX idx_pw_reset_issued_at ON pw_reset(issued_at);
"#,
    // v4: single slot written by reset requests that match no account
    r#"
CREATE TABLE pw_reset_unmatched (
    slot        INTEGER PRIMARY KEY CHECK (slot = 1),
    token       TEXT NOT NULL UNIQUE,
    issued_at   INTEGER NOT NULL
);
CREATE INDEX idx_pw_reset_unmatched_issued_at ON pw_reset_unmatched(issued_at);
"#,
];
