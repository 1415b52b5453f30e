use anyhow::{Context, Result};
use popularity_eval::config::Config;
use popularity_eval::jobs::ComparisonBatchJob;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Load configuration first so the configured level can back the filter
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting popularity-eval");

    config
        .validate()
        .context("Configuration validation failed")?;
    info!("Configuration loaded and validated");

    let outcome = ComparisonBatchJob::new(config)
        .run()
        .context("Comparison run failed")?;

    println!("{}", outcome.rendered);

    Ok(())
}
