use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use microblog::configuration::{Cli, Command, Config};
use microblog::error_handling::StorageError;
use microblog::storage::DatabaseFile;
use microblog::WebServer;

/// Creates the database file if needed and resets its tables.
async fn init_db(config: &Config) -> Result<(), StorageError> {
    DatabaseFile::new(&config.database).init_schema().await
}

#[tokio::main]
async fn main() {
    // RUST_LOG overrides the default level, e.g. RUST_LOG=microblog=debug
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let cli = Cli::parse();

    info!("Importing configuration");
    let config = match cli.resolve() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::InitDb => {
            if let Err(e) = init_db(&config).await {
                error!("Unable to initialise the database: {}", e);
                std::process::exit(1);
            }
        }
        Command::Serve { .. } => {
            let server = WebServer::new(config);
            if let Err(e) = server.start().await {
                error!("Web server stopped: {}, exiting...", e);
                std::process::exit(1);
            }
        }
    }
}
