use chanvault::config::Config;
use chanvault::source::DiscordSource;
use chanvault::Archiver;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Archiving into {}", config.archive_root.display());

    let source = DiscordSource::connect(&config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open session: {}", e))?;

    let result = Archiver::new(&source, &config).run().await;
    source.close().await;

    match result {
        Ok(report) => {
            report.log_summary();
            Ok(())
        }
        Err(e) => {
            error!("Archive run aborted: {}", e);
            Err(e.into())
        }
    }
}
