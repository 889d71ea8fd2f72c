use std::process::exit;

use anyhow::{Context, Result};
use pktstat_capture::{CaptureExit, PcapSource, Pipeline};
use pktstat_cli::{logging, signals, CaptureArgs, Cli};
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("pktstat error: {err:?}");
        exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    capture(cli.capture).await
}

async fn capture(args: CaptureArgs) -> Result<()> {
    let pipeline = Pipeline::new(args.pipeline_config()).context("invalid pipeline settings")?;

    info!(interface = %args.interface, snaplen = args.snaplen, "Starting packet capture");
    // No filter flag; capture everything
    let source = PcapSource::open(&args.interface, "", &args.capture_config())
        .with_context(|| format!("failed to start capture on {}", args.interface))?;

    signals::install(pipeline.cancellation_token())
        .context("failed to install signal handlers")?;

    let report = pipeline
        .run(source)
        .await
        .with_context(|| format!("capture on {} failed", args.interface))?;

    match report.exit {
        CaptureExit::Cancelled => info!("Capture stopped by signal"),
        CaptureExit::EndOfSource => info!("Capture source exhausted"),
        CaptureExit::QueueClosed => info!("Aggregation stopped before capture"),
    }
    info!("{}", report.capture.format());

    Ok(())
}
