mod cli;
mod config;
mod error;
mod metrics;
mod model;
mod service;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};

use cli::{Args, OutputFormat};
use service::{count_distinct, count_file};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Args::parse().merge_with_config()?;

    // Initialize logging; stdout is reserved for the result
    tracing_subscriber::fmt()
        .with_max_level(if settings.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("IP Counter starting");
    info!(
        "Config: input={}, workers={}, buffer={}, batch={}, queue={}, malformed={:?}",
        settings.input,
        settings.pipeline.workers,
        settings.pipeline.buffer_size,
        settings.pipeline.batch_size,
        settings.pipeline.queue_capacity,
        settings.pipeline.malformed
    );

    let summary = if settings.input == "-" {
        count_distinct(tokio::io::stdin(), &settings.pipeline).await?
    } else {
        count_file(&settings.input, &settings.pipeline).await?
    };

    info!(
        "Distinct: {}, Malformed: {}, Oversized: {}, Memory: {:.2} MB",
        summary.distinct,
        summary.malformed,
        summary.oversized,
        summary.memory_bytes as f64 / 1024.0 / 1024.0
    );

    match settings.format {
        OutputFormat::Text => println!("Count is: {}", summary.distinct),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }

    Ok(())
}
