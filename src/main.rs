use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use sub_aggregator::{Aggregator, Config, DEFAULT_MANIFEST_URL, DEFAULT_OUTPUT_PATH};
use tracing_subscriber::EnvFilter;

/// Aggregates VLESS subscriptions into one geo-tagged subscription file
#[derive(Parser)]
#[command(name = "sub-aggregator")]
#[command(about = "Aggregates VLESS subscriptions into one geo-tagged subscription file")]
struct Cli {
    /// Manifest listing the subscription sources
    #[arg(long, default_value = DEFAULT_MANIFEST_URL)]
    manifest_url: String,

    /// Output file for the subscription document
    #[arg(short, long, default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config {
        manifest_url: cli.manifest_url,
        output_path: cli.output,
        ..Config::default()
    };

    tracing::info!(manifest = %config.manifest_url, "Starting subscription aggregator");

    let aggregator = Aggregator::with_config(config.aggregator.clone())?;
    let result = match aggregator.run(&config.manifest_url).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(outcome = %e, "Aggregation produced no output");
            return Ok(ExitCode::FAILURE);
        }
    };

    let document = config.document.render(&result, Utc::now());
    sub_aggregator::output::write_document(&config.output_path, &document)?;

    tracing::info!(
        count = result.len(),
        sources = result.sources_contributed,
        stop = ?result.stop_reason,
        path = %config.output_path.display(),
        "Subscription generated"
    );

    Ok(ExitCode::SUCCESS)
}
