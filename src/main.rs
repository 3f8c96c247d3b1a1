use anyhow::Result;
use clap::Parser;
use photo_ocr_keeper::cli::{self, Cli};
use photo_ocr_keeper::config::AppConfig;
use photo_ocr_keeper::observability;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env().map_err(|e| {
        anyhow::anyhow!("Configuration validation failed: {}. Please check your KEEPER_* and OCR_* variables.", e)
    })?;
    if let Some(dir) = &cli.data_dir {
        config.store.data_dir = dir.clone();
    }

    observability::init_observability_with_config(&config.observability)?;

    info!(
        data_dir = %config.store.data_dir.display(),
        max_pages = config.store.capacity.max_pages,
        slots_per_page = config.store.capacity.slots_per_page,
        language = %config.language,
        "Configuration loaded"
    );

    cli::run(cli, config).await
}
