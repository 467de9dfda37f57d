//! Test helpers for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use authdb::config::{DatabaseConfig, HashingConfig};
use authdb::{AuthService, Config, Database, ManualClock, MemoryNotifier};

/// Service plus the handles tests need to observe and steer it.
pub struct TestEnv {
    pub service: Arc<AuthService>,
    pub notifier: Arc<MemoryNotifier>,
    pub clock: Arc<ManualClock>,
}

/// Configuration with cheap hashing and a fixed secret.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.session.secret = "integration-test-secret".to_string();
    config.hashing = HashingConfig {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
    };
    config
}

fn build(db: Database, config: &Config) -> TestEnv {
    let notifier = Arc::new(MemoryNotifier::new());
    let clock = Arc::new(ManualClock::starting_now());
    let service = AuthService::with_clock(db, config, notifier.clone(), clock.clone())
        .expect("service should build");
    TestEnv {
        service: Arc::new(service),
        notifier,
        clock,
    }
}

/// Environment over an in-memory database.
pub async fn setup_in_memory() -> TestEnv {
    let db = Database::open_in_memory()
        .await
        .expect("in-memory database should open");
    build(db, &test_config())
}

/// Environment over a WAL database file inside `dir`, with a real pool.
pub async fn setup_on_disk(dir: &Path) -> TestEnv {
    let mut config = test_config();
    config.database = DatabaseConfig {
        path: dir.join("auth.db").to_string_lossy().into_owned(),
        max_connections: 8,
        ..DatabaseConfig::default()
    };
    let db = Database::open(&config.database)
        .await
        .expect("file database should open");
    build(db, &config)
}

/// Number of account rows for `identifier`.
pub async fn account_rows(env: &TestEnv, identifier: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE identifier = ?")
        .bind(identifier)
        .fetch_one(env.service.database().pool())
        .await
        .unwrap()
}

/// Number of reset token rows for `identifier`.
pub async fn reset_rows(env: &TestEnv, identifier: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM pw_reset WHERE identifier = ?")
        .bind(identifier)
        .fetch_one(env.service.database().pool())
        .await
        .unwrap()
}
