use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mbg_policy::{config::Config, policy::is_rejected_input, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let config = Config::load()?;
    tracing::debug!(?config, "Configuration loaded");

    let report = match cli.run(config).await {
        Ok(report) => report,
        Err(e) => {
            if is_rejected_input(&e) {
                tracing::warn!("Nothing dispatched: {}", e);
            }
            return Err(e.into());
        }
    };
    tracing::info!(
        gateway = %report.gateway,
        pod = %report.pod,
        "Policy command completed"
    );

    Ok(())
}
