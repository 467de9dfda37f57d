use std::sync::Arc;

use tracing::{error, info};

use authdb::{AuthService, Config, Database, LogNotifier};

#[tokio::main]
async fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = match Config::load_with_env(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = authdb::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        authdb::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("{e}");
        std::process::exit(1);
    }

    let db = match Database::open(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to open database");
            std::process::exit(1);
        }
    };

    let service = match AuthService::new(db, &config, Arc::new(LogNotifier)) {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, "Failed to build auth service");
            std::process::exit(1);
        }
    };

    match service.purge_expired_reset_tokens().await {
        Ok(removed) => info!(removed, "Startup housekeeping done"),
        Err(e) => error!(error = %e, "Startup housekeeping failed"),
    }

    info!(
        database = %config.database.path,
        session_lifetime_days = config.session.lifetime_days,
        reset_lifetime_hours = config.reset.token_lifetime_hours,
        "authdb ready"
    );

    service.database().close().await;
}
