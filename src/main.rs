use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use nexa::config::{AppConfig, CliArgs, Command};
use nexa::db::bootstrap::{ensure_schema, seed_demo_data};
use nexa::db::db_pool::build_pool;
use nexa::ingest::csv::DirectoryCsvLoader;
use nexa::llm::{CompletionService, LlmManager};
use nexa::util::logging::init_tracing;
use nexa::web;
use nexa::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.prompts.validate() {
        error!("Invalid prompt configuration: {}", e);
        return Err(e.into());
    }

    info!("Initializing DuckDB connection pool");
    let pool = match build_pool(&config.database) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    match args.command.clone().unwrap_or(Command::Serve) {
        Command::Seed => {
            let report = seed_demo_data(&pool)?;
            info!(
                "Seeded {} areas, {} patients, {} directory entries and {} units into {}",
                report.areas,
                report.pacientes,
                report.directorio,
                report.unidades,
                config.database.connection_string
            );
        }
        Command::LoadDirectory { path } => {
            let loader = DirectoryCsvLoader::new(pool);
            let report = loader.load_path(&path)?;
            info!(
                "Phone directory replaced: {} entries loaded, {} skipped",
                report.loaded, report.skipped
            );
        }
        Command::Serve => {
            ensure_schema(&*pool.get()?)?;

            // Initialize LLM manager
            info!("Initializing LLM manager with backend: {}", config.llm.backend);
            let completion: Arc<dyn CompletionService> = Arc::new(LlmManager::new(&config.llm)?);

            let web_config = config.web.clone();
            let app_state = Arc::new(AppState::new(config, pool, completion)?);

            // Start the web server
            info!("Starting Nexa server on {}:{}", web_config.host, web_config.port);
            match web::run_server(web_config, app_state).await {
                Ok(_) => info!("Server stopped gracefully"),
                Err(e) => {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
