//! Capture pipeline
//!
//! Wires the three execution contexts together: the capture loop on a
//! blocking thread, the aggregation sink and the reporter as tokio tasks.
//! They share one cancellation token and one bounded record queue.

use std::time::Duration;

use pktstat_core::{Error, Result};
use pktstat_flow::{
    AggregationSink, Classifier, FlowSnapshot, FlowTableWriter, LayerSet, Reporter,
    DEFAULT_REPORT_INTERVAL,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::capture::{CaptureExit, CaptureLoop, DEFAULT_MAX_CONSECUTIVE_READ_ERRORS};
use crate::source::FrameSource;
use crate::stats::CaptureStats;

/// Default capacity of the record queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Tuning for the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Records buffered between capture and aggregation
    pub queue_capacity: usize,
    /// Time between two reports
    pub report_interval: Duration,
    /// Consecutive failed reads before the source is given up on
    pub max_consecutive_read_errors: u32,
    /// Layers the classifier decodes
    pub layers: LayerSet,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            report_interval: DEFAULT_REPORT_INTERVAL,
            max_consecutive_read_errors: DEFAULT_MAX_CONSECUTIVE_READ_ERRORS,
            layers: LayerSet::all(),
        }
    }
}

impl PipelineConfig {
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_max_consecutive_read_errors(mut self, max: u32) -> Self {
        self.max_consecutive_read_errors = max;
        self
    }

    pub fn with_layers(mut self, layers: LayerSet) -> Self {
        self.layers = layers;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::invalid_config(
                "queue_capacity",
                "must be greater than zero",
            ));
        }
        if self.report_interval.is_zero() {
            return Err(Error::invalid_config(
                "report_interval",
                "must be greater than zero",
            ));
        }
        if self.max_consecutive_read_errors == 0 {
            return Err(Error::invalid_config(
                "max_consecutive_read_errors",
                "must be greater than zero",
            ));
        }
        if self.layers.is_empty() {
            return Err(Error::invalid_config("layers", "must not be empty"));
        }
        Ok(())
    }
}

/// Outcome of a completed pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Why the capture loop stopped
    pub exit: CaptureExit,
    /// Final capture loop counters
    pub capture: CaptureStats,
    /// Records the sink applied to the table
    pub records_applied: u64,
    /// Final contents of the flow table
    pub flows: FlowSnapshot,
}

pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Token that stops the pipeline when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline over `source` until it stops
    ///
    /// Returns when the capture loop has stopped and the sink and reporter
    /// have been joined. A final report is logged before returning, also
    /// when the source failed.
    pub async fn run<S>(self, source: S) -> Result<PipelineReport>
    where
        S: FrameSource + 'static,
    {
        let Pipeline { config, cancel } = self;
        debug!(
            queue_capacity = config.queue_capacity,
            report_interval = ?config.report_interval,
            max_consecutive_read_errors = config.max_consecutive_read_errors,
            "Starting pipeline"
        );

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let table = FlowTableWriter::new();
        let reader = table.reader();

        let capture = CaptureLoop::new(
            source,
            Classifier::with_layers(config.layers),
            sender,
            cancel.clone(),
        )
        .with_max_consecutive_read_errors(config.max_consecutive_read_errors);
        let counters = capture.counters();

        let summary_counters = counters.clone();
        let reporter = Reporter::new(reader, cancel.clone())
            .with_interval(config.report_interval)
            .with_summary(move || summary_counters.snapshot().format());

        let sink = tokio::spawn(AggregationSink::new(receiver, table, cancel.clone()).run());
        let reporter = tokio::spawn(async move {
            reporter.run().await;
            reporter
        });
        let capture = tokio::task::spawn_blocking(move || capture.run());
        info!("Pipeline running");

        let capture_result = capture.await.map_err(join_error).and_then(|result| result);

        // The capture loop dropped its sender, so the sink stops once the
        // queue is drained, or right away if cancellation was requested.
        let sink_summary = sink.await.map_err(join_error);
        cancel.cancel();
        let reporter = reporter.await.map_err(join_error)?;

        let flows = reporter.report();
        let sink_summary = sink_summary?;
        let exit = capture_result?;

        info!(
            exit = ?exit,
            flows = flows.len(),
            records = sink_summary.records_applied,
            "Pipeline stopped"
        );

        Ok(PipelineReport {
            exit,
            capture: counters.snapshot(),
            records_applied: sink_summary.records_applied,
            flows,
        })
    }
}

fn join_error(err: tokio::task::JoinError) -> Error {
    Error::Join(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ReplaySource, SourceEvent};
    use pktstat_core::{FlowCounters, FlowKey, LayerType};
    use pktstat_packet::ethernet::{EtherType, EthernetHeader, MacAddress};
    use pktstat_packet::tcp::TcpFlags;
    use pktstat_packet::PacketBuilder;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;

    const MAC_A: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x01]);
    const MAC_B: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x02]);

    fn tcp_frame(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16, payload: usize) -> Vec<u8> {
        PacketBuilder::new()
            .ethernet(MAC_A, MAC_B, EtherType::IPv4)
            .ipv4(Ipv4Addr::from(src), Ipv4Addr::from(dst))
            .tcp(sport, dport, 1, 0, TcpFlags::PSH_ACK)
            .payload(vec![0u8; payload])
            .build()
            .unwrap()
    }

    fn udp6_frame(payload: usize) -> Vec<u8> {
        PacketBuilder::new()
            .ethernet(MAC_A, MAC_B, EtherType::IPv6)
            .ipv6(Ipv6Addr::LOCALHOST, "::2".parse().unwrap())
            .udp(53, 9999)
            .payload(vec![0u8; payload])
            .build()
            .unwrap()
    }

    fn tcp_key() -> FlowKey {
        FlowKey::new(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            LayerType::TCP,
            1234,
            80,
        )
    }

    /// Yields timeouts until told to stop, like an idle interface
    struct IdleSource {
        reads: Arc<AtomicBool>,
    }

    impl FrameSource for IdleSource {
        fn next_frame(&mut self) -> Result<SourceEvent> {
            self.reads.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            Ok(SourceEvent::Timeout)
        }
    }

    /// Alternates between the two directions of one connection without pause
    struct FloodSource {
        reads: Arc<AtomicU64>,
    }

    impl FrameSource for FloodSource {
        fn next_frame(&mut self) -> Result<SourceEvent> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            let data = if n % 2 == 0 {
                tcp_frame([10, 0, 0, 1], 1234, [10, 0, 0, 2], 80, 10)
            } else {
                tcp_frame([10, 0, 0, 2], 80, [10, 0, 0, 1], 1234, 0)
            };
            Ok(SourceEvent::Frame(pktstat_core::Frame::new(data)))
        }
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.report_interval, Duration::from_secs(10));
        assert_eq!(config.max_consecutive_read_errors, 100);
        assert_eq!(config.layers, LayerSet::all());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_config_validate() {
        assert!(PipelineConfig::default()
            .with_queue_capacity(0)
            .validate()
            .is_err());
        assert!(PipelineConfig::default()
            .with_report_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(PipelineConfig::default()
            .with_max_consecutive_read_errors(0)
            .validate()
            .is_err());
        assert!(PipelineConfig::default()
            .with_layers(LayerSet::empty())
            .validate()
            .is_err());
        assert!(Pipeline::new(PipelineConfig::default().with_queue_capacity(0)).is_err());
    }

    #[tokio::test]
    async fn test_end_of_source_accounts_every_frame() {
        let first = tcp_frame([10, 0, 0, 1], 1234, [10, 0, 0, 2], 80, 46);
        let second = tcp_frame([10, 0, 0, 1], 1234, [10, 0, 0, 2], 80, 0);
        let arp = EthernetHeader::new(MacAddress::BROADCAST, MAC_A, EtherType::ARP)
            .to_bytes(&[0u8; 28]);

        let source = ReplaySource::new()
            .frame(first.clone())
            .frame(udp6_frame(20))
            .frame(arp)
            .frame(tcp_frame([10, 0, 0, 2], 80, [10, 0, 0, 1], 1234, 0))
            .frame(second.clone());

        let pipeline = Pipeline::new(PipelineConfig::default().with_queue_capacity(2)).unwrap();
        let report = pipeline.run(source).await.unwrap();

        assert_eq!(report.exit, CaptureExit::EndOfSource);
        assert_eq!(report.records_applied, 4);
        assert_eq!(report.capture.frames_read, 5);
        assert_eq!(report.capture.unclassified, 1);
        assert_eq!(report.flows.len(), 3);

        assert_eq!(
            report.flows.get(&tcp_key()),
            Some(FlowCounters {
                packets: 2,
                bytes: (first.len() + second.len()) as u64
            })
        );
        assert_eq!(report.flows.get(&tcp_key().reversed()).unwrap().packets, 1);

        let udp_key = FlowKey::new(
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            "::2".parse().unwrap(),
            LayerType::UDP,
            53,
            9999,
        );
        assert_eq!(
            report.flows.get(&udp_key),
            Some(FlowCounters {
                packets: 1,
                bytes: udp6_frame(20).len() as u64
            })
        );
    }

    #[tokio::test]
    async fn test_cancel_stops_idle_pipeline() {
        let reads = Arc::new(AtomicBool::new(false));
        let source = IdleSource {
            reads: Arc::clone(&reads),
        };

        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let cancel = pipeline.cancellation_token();
        let handle = tokio::spawn(pipeline.run(source));

        while !reads.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        cancel.cancel();

        let report = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(report.exit, CaptureExit::Cancelled);
        assert!(report.flows.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_during_traffic_keeps_table_consistent() {
        let reads = Arc::new(AtomicU64::new(0));
        let source = FloodSource {
            reads: Arc::clone(&reads),
        };

        let pipeline = Pipeline::new(PipelineConfig::default().with_queue_capacity(8)).unwrap();
        let cancel = pipeline.cancellation_token();
        let handle = tokio::spawn(pipeline.run(source));

        while reads.load(Ordering::SeqCst) < 200 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        cancel.cancel();

        let report = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(report.exit, CaptureExit::Cancelled);
        assert!(report.records_applied > 0);
        assert!(report.records_applied <= report.capture.records_sent);
        assert_eq!(report.flows.total().packets, report.records_applied);
        assert!(report.flows.len() <= 2);
        assert!(report.flows.iter().all(|(_, counters)| counters.packets > 0));
    }

    #[tokio::test]
    async fn test_source_failure_is_returned() {
        let source = ReplaySource::new()
            .frame(tcp_frame([10, 0, 0, 1], 1234, [10, 0, 0, 2], 80, 0))
            .read_error("interface down")
            .read_error("interface down");

        let config = PipelineConfig::default().with_max_consecutive_read_errors(2);
        let err = Pipeline::new(config).unwrap().run(source).await.unwrap_err();

        assert!(matches!(err, Error::SourceFailed(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_cancelled_before_run() {
        let source =
            ReplaySource::from_frames(vec![tcp_frame([10, 0, 0, 1], 1, [10, 0, 0, 2], 2, 0)]);
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        pipeline.cancellation_token().cancel();

        let report = pipeline.run(source).await.unwrap();
        assert_eq!(report.exit, CaptureExit::Cancelled);
        assert_eq!(report.records_applied, 0);
        assert!(report.flows.is_empty());
    }
}
