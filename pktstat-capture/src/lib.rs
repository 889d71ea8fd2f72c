//! Live packet capture for pktstat
//!
//! This crate owns everything between the network interface and the flow
//! table: the pcap-backed [`FrameSource`], the blocking [`CaptureLoop`] that
//! classifies frames and queues records, and the [`Pipeline`] that wires the
//! capture thread, the aggregation sink and the reporter together under one
//! cancellation token.
//!
//! ## Example
//!
//! ```no_run
//! use pktstat_capture::{CaptureConfig, PcapSource, Pipeline, PipelineConfig};
//!
//! # async fn run() -> pktstat_core::Result<()> {
//! let source = PcapSource::open("eth0", "", &CaptureConfig::default())?;
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//!
//! let cancel = pipeline.cancellation_token();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     cancel.cancel();
//! });
//!
//! let report = pipeline.run(source).await?;
//! println!("{} flows", report.flows.len());
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod pipeline;
pub mod source;
pub mod stats;

pub use capture::{CaptureExit, CaptureLoop};
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport};
pub use source::{CaptureConfig, FrameSource, PcapSource, ReplaySource, SourceEvent};
pub use stats::{CaptureCounters, CaptureStats, SourceStats};
