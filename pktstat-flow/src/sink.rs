//! Aggregation sink
//!
//! Consumes records from the capture queue and applies them to the flow
//! table. It is the only writer of the table.

use pktstat_core::Record;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::table::FlowTableWriter;

/// What the sink did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkSummary {
    /// Records applied to the table
    pub records_applied: u64,
    /// Whether the sink stopped because of cancellation rather than a closed queue
    pub cancelled: bool,
}

pub struct AggregationSink {
    receiver: mpsc::Receiver<Record>,
    table: FlowTableWriter,
    cancel: CancellationToken,
}

impl AggregationSink {
    pub fn new(
        receiver: mpsc::Receiver<Record>,
        table: FlowTableWriter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            table,
            cancel,
        }
    }

    /// Apply records until cancelled or until every sender is gone
    ///
    /// On cancellation, records still queued are left unapplied. Dropping
    /// the receiver on return wakes any producer blocked on a full queue.
    pub async fn run(mut self) -> SinkSummary {
        let mut summary = SinkSummary::default();
        debug!("Aggregation sink started");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Aggregation sink cancelled");
                    summary.cancelled = true;
                    break;
                }
                record = self.receiver.recv() => match record {
                    Some(record) => {
                        self.table.apply(&record);
                        summary.records_applied += 1;
                    }
                    None => {
                        debug!("Record queue closed");
                        break;
                    }
                },
            }
        }

        info!(
            records = summary.records_applied,
            flows = self.table.reader().len(),
            "Aggregation sink stopped"
        );
        summary
    }
}
