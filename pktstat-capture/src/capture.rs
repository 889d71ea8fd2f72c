//! The capture loop
//!
//! Runs on a dedicated blocking thread: pull a frame, classify it, queue a
//! record. Per-frame failures are logged and counted but never stop the
//! loop. It stops on cancellation, at the end of the source, when the queue
//! has no receiver, or when the source keeps failing.

use pktstat_core::{Error, Frame, Record, Result};
use pktstat_flow::{Classification, Classifier, Unclassifiable};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::source::{FrameSource, SourceEvent};
use crate::stats::CaptureCounters;

/// Consecutive failed reads after which the source is given up on
pub const DEFAULT_MAX_CONSECUTIVE_READ_ERRORS: u32 = 100;

/// Why a capture loop stopped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureExit {
    /// Cancellation was requested
    Cancelled,
    /// The source ran out of frames
    EndOfSource,
    /// Nobody is receiving records any more
    QueueClosed,
}

pub struct CaptureLoop<S> {
    source: S,
    classifier: Classifier,
    sender: mpsc::Sender<Record>,
    cancel: CancellationToken,
    counters: CaptureCounters,
    max_consecutive_read_errors: u32,
}

impl<S: FrameSource> CaptureLoop<S> {
    /// Create a loop over an already opened source
    pub fn new(
        source: S,
        classifier: Classifier,
        sender: mpsc::Sender<Record>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            classifier,
            sender,
            cancel,
            counters: CaptureCounters::new(),
            max_consecutive_read_errors: DEFAULT_MAX_CONSECUTIVE_READ_ERRORS,
        }
    }

    pub fn with_max_consecutive_read_errors(mut self, max: u32) -> Self {
        self.max_consecutive_read_errors = max.max(1);
        self
    }

    /// Handle to the loop counters, usable from other threads
    pub fn counters(&self) -> CaptureCounters {
        self.counters.clone()
    }

    /// Run until stopped. Blocks the calling thread.
    ///
    /// Must not be called from an async context: queueing uses a blocking
    /// send so that a slow sink throttles the capture.
    pub fn run(mut self) -> Result<CaptureExit> {
        info!("Capture loop running");
        let mut consecutive_errors: u32 = 0;

        let result = loop {
            if self.cancel.is_cancelled() {
                break Ok(CaptureExit::Cancelled);
            }

            match self.source.next_frame() {
                Ok(SourceEvent::Frame(frame)) => {
                    consecutive_errors = 0;
                    self.counters.record_frame(frame.len());
                    if let Some(exit) = self.handle_frame(frame) {
                        break Ok(exit);
                    }
                }
                Ok(SourceEvent::Timeout) => {
                    consecutive_errors = 0;
                }
                Ok(SourceEvent::EndOfSource) => {
                    debug!("End of source");
                    break Ok(CaptureExit::EndOfSource);
                }
                Err(e) => {
                    consecutive_errors += 1;
                    self.counters.record_read_error();
                    warn!(error = %e, consecutive = consecutive_errors, "Error reading packet data");

                    if consecutive_errors >= self.max_consecutive_read_errors {
                        break Err(Error::SourceFailed(format!(
                            "{} consecutive read errors, last: {}",
                            consecutive_errors, e
                        )));
                    }
                }
            }
        };

        if let Some(stats) = self.source.stats() {
            info!(
                received = stats.received,
                dropped = stats.dropped,
                if_dropped = stats.if_dropped,
                "Capture source statistics"
            );
            self.counters.record_source_stats(stats);
        }

        match &result {
            Ok(exit) => info!(exit = ?exit, "Capture loop stopped"),
            Err(e) => error!(error = %e, "Capture loop failed"),
        }
        result
    }

    /// Classify one frame and queue its record
    ///
    /// Returns an exit reason when the queue is gone.
    fn handle_frame(&mut self, frame: Frame) -> Option<CaptureExit> {
        match self.classifier.classify(frame.data()) {
            Classification::Classified(key) => {
                let record = Record::new(key, frame.len() as u64);
                if self.sender.blocking_send(record).is_err() {
                    // The sink drops its receiver when cancelled
                    if self.cancel.is_cancelled() {
                        return Some(CaptureExit::Cancelled);
                    }
                    return Some(CaptureExit::QueueClosed);
                }
                self.counters.record_sent();
            }
            Classification::Unclassifiable(Unclassifiable::Decode(e)) => {
                self.counters.record_decode_error();
                warn!(error = %e, len = frame.len(), "Error decoding packet");
            }
            Classification::Unclassifiable(reason) => {
                self.counters.record_unclassified();
                trace!(reason = %reason, len = frame.len(), "Skipping frame");
            }
        }
        None
    }
}
