//! Periodic statistics reporting

use std::fmt;
use std::time::Duration;

use pktstat_core::{FlowCounters, FlowKey};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::table::{FlowSnapshot, FlowTableReader};

/// Default time between two reports
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Shortest interval a reporter accepts
pub const MIN_REPORT_INTERVAL: Duration = Duration::from_millis(1);

type SummaryFn = Box<dyn Fn() -> String + Send + Sync>;

/// Logs the flow table at a fixed interval
pub struct Reporter {
    table: FlowTableReader,
    interval: Duration,
    summary: Option<SummaryFn>,
    cancel: CancellationToken,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("interval", &self.interval)
            .field("flows", &self.table.len())
            .finish()
    }
}

impl Reporter {
    pub fn new(table: FlowTableReader, cancel: CancellationToken) -> Self {
        Self {
            table,
            interval: DEFAULT_REPORT_INTERVAL,
            summary: None,
            cancel,
        }
    }

    /// Set the report interval, raised to [`MIN_REPORT_INTERVAL`] if shorter
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_REPORT_INTERVAL {
            warn!(interval = ?interval, "Report interval too short, using minimum");
        }
        self.interval = interval.max(MIN_REPORT_INTERVAL);
        self
    }

    /// Append an extra line to every report, e.g. capture counters
    pub fn with_summary<F>(mut self, summary: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.summary = Some(Box::new(summary));
        self
    }

    /// Log one report and return the snapshot it was built from
    pub fn report(&self) -> FlowSnapshot {
        let snapshot = self.table.snapshot();
        info!("Current statistics:");
        for line in render(&snapshot) {
            info!("{}", line);
        }
        if let Some(summary) = &self.summary {
            info!("{}", summary());
        }
        snapshot
    }

    /// Report every interval until cancelled
    ///
    /// The first report is logged one full interval after start.
    pub async fn run(&self) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval = ?self.interval, "Reporter started");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.report();
                }
            }
        }

        debug!("Reporter stopped");
    }
}

/// One report line for a flow
pub fn format_line(key: &FlowKey, counters: &FlowCounters) -> String {
    format!("{} - {}", key, counters)
}

/// Report lines for a snapshot, in key order
pub fn render(snapshot: &FlowSnapshot) -> Vec<String> {
    snapshot
        .iter()
        .map(|(key, counters)| format_line(key, counters))
        .collect()
}
