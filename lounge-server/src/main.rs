use std::env;

use log::{error, info};

use lounge_core::{Config, Coordinator, PgDatabase};
use lounge_server::{logging, run_server};

#[tokio::main]
async fn main() {
    logging::init_logger();

    let database_url = env::var("LOUNGE_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .unwrap_or_else(|_| {
            error!("LOUNGE_DATABASE_URL is not set");
            std::process::exit(1);
        });

    let config = config_from_env();

    info!("Connecting to database...");

    let database = match PgDatabase::new(&database_url).await {
        Ok(database) => database,
        Err(e) => {
            error!("Could not connect to database: {e}");
            error!("Make sure the postgres instance is running and the connection string is correct, then try again.");
            std::process::exit(1);
        }
    };

    info!("Initialized successfully.");

    run_server(Coordinator::new(database, config)).await
}

/// Builds the coordinator config from the environment. Only the metadata
/// providers are overridable; everything else uses the defaults.
fn config_from_env() -> Config {
    let mut config = Config::default();

    if let Ok(providers) = env::var("LOUNGE_INVIDIOUS_URLS") {
        let providers: Vec<_> = providers
            .split(',')
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .collect();

        if !providers.is_empty() {
            config.lookup_providers = providers;
        }
    }

    config
}
