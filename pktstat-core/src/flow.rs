//! Flow identity and per-flow counters

use std::fmt;
use std::net::IpAddr;

/// Protocol layer types recognized by the classifier
///
/// The variant order follows the decode order: link, network, transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerType {
    /// Ethernet II
    Ethernet,
    /// Internet Protocol version 4
    IPv4,
    /// Internet Protocol version 6
    IPv6,
    /// Transmission Control Protocol
    TCP,
    /// User Datagram Protocol
    UDP,
    /// ICMP for IPv4
    ICMPv4,
    /// ICMP for IPv6
    ICMPv6,
}

impl LayerType {
    /// All layer types, in decode order
    pub const ALL: [LayerType; 7] = [
        LayerType::Ethernet,
        LayerType::IPv4,
        LayerType::IPv6,
        LayerType::TCP,
        LayerType::UDP,
        LayerType::ICMPv4,
        LayerType::ICMPv6,
    ];

    /// Stable bit index, used by layer sets
    pub fn bit(self) -> u8 {
        match self {
            LayerType::Ethernet => 0,
            LayerType::IPv4 => 1,
            LayerType::IPv6 => 2,
            LayerType::TCP => 3,
            LayerType::UDP => 4,
            LayerType::ICMPv4 => 5,
            LayerType::ICMPv6 => 6,
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerType::Ethernet => write!(f, "Ethernet"),
            LayerType::IPv4 => write!(f, "IPv4"),
            LayerType::IPv6 => write!(f, "IPv6"),
            LayerType::TCP => write!(f, "TCP"),
            LayerType::UDP => write!(f, "UDP"),
            LayerType::ICMPv4 => write!(f, "ICMPv4"),
            LayerType::ICMPv6 => write!(f, "ICMPv6"),
        }
    }
}

/// Identity of a unidirectional flow
///
/// Equality and hashing cover all five fields. Direction is significant:
/// swapping source and destination gives a different key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowKey {
    /// Source address
    pub src_ip: IpAddr,
    /// Destination address
    pub dst_ip: IpAddr,
    /// Last successfully decoded layer
    pub proto: LayerType,
    /// Source port (0 unless TCP/UDP)
    pub src_port: u16,
    /// Destination port (0 unless TCP/UDP)
    pub dst_port: u16,
}

impl FlowKey {
    /// Create a new flow key
    pub fn new(
        src_ip: IpAddr,
        dst_ip: IpAddr,
        proto: LayerType,
        src_port: u16,
        dst_port: u16,
    ) -> Self {
        Self {
            src_ip,
            dst_ip,
            proto,
            src_port,
            dst_port,
        }
    }

    /// The key of the opposite direction
    pub fn reversed(&self) -> Self {
        Self {
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            proto: self.proto,
            src_port: self.dst_port,
            dst_port: self.src_port,
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} [{}]",
            self.src_ip, self.src_port, self.dst_ip, self.dst_port, self.proto
        )
    }
}

/// A classified frame on its way to the aggregation table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Flow the frame belongs to
    pub key: FlowKey,
    /// Captured byte length of the frame
    pub len: u64,
}

impl Record {
    pub fn new(key: FlowKey, len: u64) -> Self {
        Self { key, len }
    }
}

/// Running counters for one flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowCounters {
    /// Packets seen
    pub packets: u64,
    /// Bytes seen
    pub bytes: u64,
}

impl FlowCounters {
    /// Account one packet of `len` bytes. Saturates instead of wrapping.
    pub fn record(&mut self, len: u64) {
        self.packets = self.packets.saturating_add(1);
        self.bytes = self.bytes.saturating_add(len);
    }
}

impl fmt::Display for FlowCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Packets: {}, Bytes: {}", self.packets, self.bytes)
    }
}
