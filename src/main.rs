use tracing::{error, info};

use dataroom::{Config, Database, WebServer};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    // Initialize logging
    if let Err(e) = dataroom::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        dataroom::logging::init_console_only(&config.logging.level);
    }

    info!("Data room upload service");
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );

    if let Err(e) = run(config).await {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> dataroom::Result<()> {
    let db = Database::open(&config.database.path).await?;
    info!("Database opened at {}", config.database.path);

    let server = WebServer::new(&config, db)?;
    server.run().await?;
    Ok(())
}
