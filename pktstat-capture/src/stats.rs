//! Capture statistics and metrics

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters reported by the capture source itself (libpcap)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Packets received by the filter
    pub received: u64,
    /// Packets dropped by the kernel for lack of buffer space
    pub dropped: u64,
    /// Packets dropped by the network interface
    pub if_dropped: u64,
}

impl SourceStats {
    pub fn from_pcap_stats(stats: pcap::Stat) -> Self {
        Self {
            received: stats.received as u64,
            dropped: stats.dropped as u64,
            if_dropped: stats.if_dropped as u64,
        }
    }

    /// Kernel drop rate as percentage
    pub fn drop_rate(&self) -> f64 {
        if self.received == 0 {
            return 0.0;
        }
        (self.dropped as f64 / self.received as f64) * 100.0
    }
}

/// Point-in-time view of the capture loop counters
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    /// Frames read from the source
    pub frames_read: u64,
    /// Captured bytes read from the source
    pub bytes_read: u64,
    /// Failed reads
    pub read_errors: u64,
    /// Frames dropped because a header failed to decode
    pub decode_errors: u64,
    /// Frames without a network layer
    pub unclassified: u64,
    /// Records handed to the aggregation queue
    pub records_sent: u64,
    /// Source counters, once the source has been stopped
    pub source: Option<SourceStats>,
    /// Time since the counters were created
    pub duration: Duration,
    /// Frames per second
    pub frames_per_second: f64,
    /// Bytes per second
    pub bytes_per_second: f64,
}

impl CaptureStats {
    /// Frames that produced no record
    pub fn frames_skipped(&self) -> u64 {
        self.decode_errors + self.unclassified
    }

    /// Format statistics as a single log line
    pub fn format(&self) -> String {
        let mut line = format!(
            "Capture: {} frames ({} bytes), {} records, {} read errors, \
             {} decode errors, {} unclassified, {:.2} pps, {:.2} KB/s",
            self.frames_read,
            self.bytes_read,
            self.records_sent,
            self.read_errors,
            self.decode_errors,
            self.unclassified,
            self.frames_per_second,
            self.bytes_per_second / 1024.0
        );
        if let Some(source) = &self.source {
            line.push_str(&format!(
                ", pcap received {} dropped {} ({:.2}%) if_dropped {}",
                source.received,
                source.dropped,
                source.drop_rate(),
                source.if_dropped
            ));
        }
        line
    }
}

/// Thread-safe counters shared between the capture thread and observers
#[derive(Debug, Clone)]
pub struct CaptureCounters {
    frames_read: Arc<AtomicU64>,
    bytes_read: Arc<AtomicU64>,
    read_errors: Arc<AtomicU64>,
    decode_errors: Arc<AtomicU64>,
    unclassified: Arc<AtomicU64>,
    records_sent: Arc<AtomicU64>,
    source_received: Arc<AtomicU64>,
    source_dropped: Arc<AtomicU64>,
    source_if_dropped: Arc<AtomicU64>,
    has_source_stats: Arc<AtomicBool>,
    start_time: Instant,
}

impl CaptureCounters {
    pub fn new() -> Self {
        Self {
            frames_read: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
            read_errors: Arc::new(AtomicU64::new(0)),
            decode_errors: Arc::new(AtomicU64::new(0)),
            unclassified: Arc::new(AtomicU64::new(0)),
            records_sent: Arc::new(AtomicU64::new(0)),
            source_received: Arc::new(AtomicU64::new(0)),
            source_dropped: Arc::new(AtomicU64::new(0)),
            source_if_dropped: Arc::new(AtomicU64::new(0)),
            has_source_stats: Arc::new(AtomicBool::new(false)),
            start_time: Instant::now(),
        }
    }

    /// Record a frame read from the source
    pub fn record_frame(&self, size: usize) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unclassified(&self) {
        self.unclassified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.records_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Store the latest counters reported by the source
    pub fn record_source_stats(&self, stats: SourceStats) {
        self.source_received.store(stats.received, Ordering::Relaxed);
        self.source_dropped.store(stats.dropped, Ordering::Relaxed);
        self.source_if_dropped.store(stats.if_dropped, Ordering::Relaxed);
        self.has_source_stats.store(true, Ordering::Release);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> CaptureStats {
        let frames_read = self.frames_read.load(Ordering::Relaxed);
        let bytes_read = self.bytes_read.load(Ordering::Relaxed);
        let duration = self.start_time.elapsed();

        let secs = duration.as_secs_f64();
        let (frames_per_second, bytes_per_second) = if secs > 0.0 {
            (frames_read as f64 / secs, bytes_read as f64 / secs)
        } else {
            (0.0, 0.0)
        };

        let source = self
            .has_source_stats
            .load(Ordering::Acquire)
            .then(|| SourceStats {
                received: self.source_received.load(Ordering::Relaxed),
                dropped: self.source_dropped.load(Ordering::Relaxed),
                if_dropped: self.source_if_dropped.load(Ordering::Relaxed),
            });

        CaptureStats {
            frames_read,
            bytes_read,
            read_errors: self.read_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            unclassified: self.unclassified.load(Ordering::Relaxed),
            records_sent: self.records_sent.load(Ordering::Relaxed),
            source,
            duration,
            frames_per_second,
            bytes_per_second,
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read.load(Ordering::Relaxed)
    }

    pub fn records_sent(&self) -> u64 {
        self.records_sent.load(Ordering::Relaxed)
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for CaptureCounters {
    fn default() -> Self {
        Self::new()
    }
}
