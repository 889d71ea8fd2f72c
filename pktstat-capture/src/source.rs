//! Frame sources
//!
//! A [`FrameSource`] hands out one frame per call and blocks for at most its
//! read timeout. [`PcapSource`] reads from a live interface through libpcap;
//! [`ReplaySource`] replays a fixed script of events and is what the capture
//! loop and pipeline are exercised with when no interface is available.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pcap::{Active, Capture, Device, Linktype};
use pktstat_core::{Error, Frame, Result};
use tracing::{debug, info, warn};

use crate::stats::SourceStats;

/// Default snapshot length (maximum bytes per packet)
pub const DEFAULT_SNAPLEN: i32 = 65535;

/// Default read timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: i32 = 1000;

/// Configuration for a live capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Maximum bytes to capture per packet
    pub snaplen: i32,
    /// Read timeout in milliseconds; bounds how long cancellation can go unnoticed
    pub timeout_ms: i32,
    /// Enable promiscuous mode
    pub promiscuous: bool,
    /// Kernel buffer size (0 = libpcap default)
    pub buffer_size: i32,
    /// Deliver packets as soon as they arrive
    pub immediate_mode: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            promiscuous: true,
            buffer_size: 0,
            immediate_mode: true,
        }
    }
}

impl CaptureConfig {
    pub fn with_snaplen(mut self, snaplen: i32) -> Self {
        self.snaplen = snaplen;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: i32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_promiscuous(mut self, promiscuous: bool) -> Self {
        self.promiscuous = promiscuous;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: i32) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_immediate_mode(mut self, immediate_mode: bool) -> Self {
        self.immediate_mode = immediate_mode;
        self
    }

    /// Reject values libpcap would refuse or misinterpret
    pub fn validate(&self) -> Result<()> {
        if self.snaplen <= 0 {
            return Err(Error::invalid_config("snaplen", "must be greater than zero"));
        }
        if self.timeout_ms <= 0 {
            return Err(Error::invalid_config(
                "timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.buffer_size < 0 {
            return Err(Error::invalid_config("buffer_size", "must not be negative"));
        }
        Ok(())
    }
}

/// Result of one read from a frame source
#[derive(Debug)]
pub enum SourceEvent {
    /// A captured frame
    Frame(Frame),
    /// The read timeout expired without a frame
    Timeout,
    /// The source has no more frames and never will
    EndOfSource,
}

/// Anything the capture loop can pull frames from
pub trait FrameSource: Send {
    /// Read the next frame, blocking for at most the source's read timeout
    ///
    /// Errors are per-read failures; the caller decides whether to retry.
    fn next_frame(&mut self) -> Result<SourceEvent>;

    /// Source-level counters, if the source keeps any
    fn stats(&mut self) -> Option<SourceStats> {
        None
    }
}

/// Live capture on a network interface
pub struct PcapSource {
    interface: String,
    capture: Capture<Active>,
}

impl PcapSource {
    /// Open `interface` and apply `filter`
    ///
    /// An empty filter captures everything. Both a device that cannot be
    /// opened and a filter that does not compile are fatal.
    pub fn open(interface: &str, filter: &str, config: &CaptureConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            interface,
            snaplen = config.snaplen,
            timeout_ms = config.timeout_ms,
            promiscuous = config.promiscuous,
            "Opening capture"
        );

        let mut capture = Capture::from_device(Device::from(interface))
            .map_err(|e| Error::Open(format!("{}: {}", interface, e)))?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.timeout_ms)
            .immediate_mode(config.immediate_mode);

        if config.buffer_size > 0 {
            capture = capture.buffer_size(config.buffer_size);
        }

        let mut capture = capture
            .open()
            .map_err(|e| Error::Open(format!("{}: {}", interface, e)))?;

        if !filter.is_empty() {
            capture
                .filter(filter, true)
                .map_err(|e| Error::Filter(format!("'{}': {}", filter, e)))?;
            debug!(filter, "Applied BPF filter");
        }

        let datalink = capture.get_datalink();
        if datalink != Linktype::ETHERNET {
            warn!(
                interface,
                datalink = ?datalink,
                "Link type is not Ethernet, frames will not classify"
            );
        }

        info!(interface, "Capture opened");
        Ok(Self {
            interface: interface.to_string(),
            capture,
        })
    }
}

impl FrameSource for PcapSource {
    fn next_frame(&mut self) -> Result<SourceEvent> {
        match self.capture.next_packet() {
            Ok(packet) => {
                let ts = packet.header.ts;
                let timestamp = u64::try_from(ts.tv_sec)
                    .ok()
                    .zip(u64::try_from(ts.tv_usec).ok())
                    .and_then(|(secs, micros)| {
                        Duration::from_secs(secs).checked_add(Duration::from_micros(micros))
                    })
                    .and_then(|since_epoch| UNIX_EPOCH.checked_add(since_epoch))
                    .unwrap_or_else(SystemTime::now);

                Ok(SourceEvent::Frame(Frame::with_metadata(
                    packet.data.to_vec(),
                    packet.header.len as usize,
                    timestamp,
                )))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(SourceEvent::Timeout),
            Err(pcap::Error::NoMorePackets) => Ok(SourceEvent::EndOfSource),
            Err(e) => Err(Error::FrameRead(e.to_string())),
        }
    }

    fn stats(&mut self) -> Option<SourceStats> {
        match self.capture.stats() {
            Ok(stats) => Some(SourceStats::from_pcap_stats(stats)),
            Err(e) => {
                debug!(interface = %self.interface, error = %e, "No capture statistics");
                None
            }
        }
    }
}

/// Source that replays a scripted sequence of reads
///
/// Once the script is exhausted every read reports end of source.
#[derive(Debug, Default)]
pub struct ReplaySource {
    events: VecDeque<Result<SourceEvent>>,
    stats: Option<SourceStats>,
}

impl ReplaySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay the given frames, in order
    pub fn from_frames<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        frames
            .into_iter()
            .fold(Self::new(), |source, data| source.frame(data))
    }

    pub fn frame(self, data: Vec<u8>) -> Self {
        self.event(Ok(SourceEvent::Frame(Frame::new(data))))
    }

    pub fn timeout(self) -> Self {
        self.event(Ok(SourceEvent::Timeout))
    }

    pub fn read_error<S: Into<String>>(self, msg: S) -> Self {
        self.event(Err(Error::FrameRead(msg.into())))
    }

    pub fn event(mut self, event: Result<SourceEvent>) -> Self {
        self.events.push_back(event);
        self
    }

    /// Counters to report from `stats()`
    pub fn with_stats(mut self, stats: SourceStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Reads left in the script
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Result<SourceEvent> {
        self.events
            .pop_front()
            .unwrap_or(Ok(SourceEvent::EndOfSource))
    }

    fn stats(&mut self) -> Option<SourceStats> {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_config_default() {
        let config = CaptureConfig::default();
        assert_eq!(config.snaplen, DEFAULT_SNAPLEN);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(config.promiscuous);
        assert!(config.immediate_mode);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_capture_config_builders() {
        let config = CaptureConfig::default()
            .with_snaplen(128)
            .with_timeout_ms(250)
            .with_promiscuous(false)
            .with_buffer_size(4 * 1024 * 1024)
            .with_immediate_mode(false);

        assert_eq!(config.snaplen, 128);
        assert_eq!(config.timeout_ms, 250);
        assert!(!config.promiscuous);
        assert_eq!(config.buffer_size, 4 * 1024 * 1024);
        assert!(!config.immediate_mode);
    }

    #[test]
    fn test_capture_config_validate() {
        let err = CaptureConfig::default().with_snaplen(0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { ref name, .. } if name == "snaplen"));

        assert!(CaptureConfig::default().with_timeout_ms(0).validate().is_err());
        assert!(CaptureConfig::default().with_buffer_size(-1).validate().is_err());
    }

    #[test]
    fn test_open_rejects_invalid_config_before_touching_device() {
        let config = CaptureConfig::default().with_snaplen(-5);
        let err = PcapSource::open("does-not-matter", "", &config).err().unwrap();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_open_unknown_interface_fails() {
        let result = PcapSource::open("pktstat-no-such-if0", "", &CaptureConfig::default());
        match result {
            Err(Error::Open(msg)) => assert!(msg.contains("pktstat-no-such-if0")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("opened a device that does not exist"),
        }
    }

    #[test]
    fn test_replay_source() {
        let mut source = ReplaySource::new()
            .frame(vec![1, 2, 3])
            .timeout()
            .read_error("boom")
            .with_stats(SourceStats {
                received: 3,
                dropped: 0,
                if_dropped: 0,
            });
        assert_eq!(source.remaining(), 3);

        match source.next_frame().unwrap() {
            SourceEvent::Frame(frame) => assert_eq!(frame.data(), &[1, 2, 3]),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(source.next_frame().unwrap(), SourceEvent::Timeout));
        assert!(matches!(source.next_frame(), Err(Error::FrameRead(_))));
        assert!(matches!(source.next_frame().unwrap(), SourceEvent::EndOfSource));
        assert!(matches!(source.next_frame().unwrap(), SourceEvent::EndOfSource));
        assert_eq!(source.stats().map(|s| s.received), Some(3));
    }

    #[test]
    fn test_replay_from_frames() {
        let mut source = ReplaySource::from_frames(vec![vec![0u8; 60], vec![0u8; 42]]);
        assert_eq!(source.remaining(), 2);
        assert!(source.stats().is_none());
    }
}
