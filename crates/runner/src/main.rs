use anyhow::{Context, Result};
use bench_core::{
    BatchSender, Config, Dispatcher, HttpBatchSender, MockBatchSender, PayloadGenerator, RunReport,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "runner")]
#[command(about = "API payload benchmark - measures how much data an endpoint absorbs per run")]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config/example.toml")]
    config: PathBuf,

    /// Send mode: mock or http
    #[arg(long, default_value = "mock")]
    mode: String,

    /// Override run.total_batches
    #[arg(long)]
    total_batches: Option<u32>,

    /// Override run.batch_size
    #[arg(long)]
    batch_size: Option<u32>,

    /// Override run.max_concurrent
    #[arg(long)]
    parallel: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    if let Some(n) = args.total_batches {
        config.run.total_batches = n;
    }
    if let Some(n) = args.batch_size {
        config.run.batch_size = n;
    }
    if let Some(n) = args.parallel {
        config.run.max_concurrent = n;
    }

    let sender: Arc<dyn BatchSender> = match args.mode.as_str() {
        "mock" => Arc::new(MockBatchSender::new(5)), // 5ms simulated latency
        "http" => Arc::new(
            HttpBatchSender::new(config.target.uri.clone(), config.target.timeout_ms)
                .context("Failed to create HTTP sender")?,
        ),
        _ => anyhow::bail!("Invalid mode: {}, must be 'mock' or 'http'", args.mode),
    };

    info!(
        "Starting run against {} using sender: {}",
        config.target.uri,
        sender.name()
    );
    info!("Seed: {}", config.scenario.seed);
    info!(
        "Batches: {} x {} records, max {} in flight",
        config.run.total_batches, config.run.batch_size, config.run.max_concurrent
    );

    let mut generator = PayloadGenerator::new(config.scenario.seed);
    let dispatcher = Dispatcher::new(config, sender);
    let report = dispatcher.run(&mut generator).await?;

    info!("total size sent: {:.2} kilobytes", report.total_kilobytes());

    // Write the run summary to file
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let output_path = format!("results/run_{}.json", timestamp);

    std::fs::create_dir_all("results").ok();
    let report_json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&output_path, report_json)?;

    info!("Report written to {}", output_path);
    print_summary(&report);

    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("\n=== Run Summary ===");
    println!("Total sent: {:.2} kilobytes", report.total_kilobytes());
    println!("Batch size: {}", report.batch_size);
    println!("Total batches: {}", report.total_batches);
    println!("Total items: {}", report.total_items());
    println!("Successes: {}", report.successes);
    println!("Failures: {}", report.failures);
    println!("Executed in {:.2} seconds", report.elapsed_secs());
    println!();
}
