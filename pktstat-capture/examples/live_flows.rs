//! Example: per-flow counters for a fixed time window
//!
//! Captures on the given interface for a few seconds, then prints every flow
//! seen. Needs capture privileges.
//!
//! Run with: sudo cargo run -p pktstat-capture --example live_flows -- eth0 5

use std::time::Duration;

use pktstat_capture::{CaptureConfig, PcapSource, Pipeline, PipelineConfig};
use pktstat_flow::format_line;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let interface = args.next().unwrap_or_else(|| "eth0".to_string());
    let seconds: u64 = match args.next() {
        Some(value) => value.parse()?,
        None => 5,
    };

    println!("Capturing on {} for {}s...", interface, seconds);

    let source = PcapSource::open(&interface, "", &CaptureConfig::default())?;
    let pipeline = Pipeline::new(
        PipelineConfig::default().with_report_interval(Duration::from_secs(seconds.max(1))),
    )?;

    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        cancel.cancel();
    });

    let report = pipeline.run(source).await?;

    println!("\n=== Flows ({}) ===", report.flows.len());
    for (key, counters) in report.flows.iter() {
        println!("{}", format_line(key, counters));
    }

    let total = report.flows.total();
    println!("\nTotal: {} packets, {} bytes", total.packets, total.bytes);
    println!("{}", report.capture.format());

    Ok(())
}
