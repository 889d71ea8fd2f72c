//! Synthetic frames for tests and demos
//!
//! [`PacketBuilder`] stacks Ethernet, an IP header and an optional transport
//! header, then fills in lengths and checksums on `build`.

use crate::checksum::{internet_checksum, transport_checksum, transport_checksum_v6};
use crate::ethernet::{EtherType, EthernetHeader, MacAddress};
use crate::icmp::{Icmpv4Header, Icmpv6Header};
use crate::ip::{IpProtocol, Ipv4Header};
use crate::ipv6::Ipv6Header;
use crate::tcp::{TcpFlags, TcpHeader};
use crate::udp::UdpHeader;
use pktstat_core::{Error, Result};
use std::net::{Ipv4Addr, Ipv6Addr};

#[derive(Debug, Clone)]
enum Network {
    V4(Ipv4Header),
    V6(Ipv6Header),
}

#[derive(Debug, Clone, Copy)]
enum Transport {
    Udp(UdpHeader),
    Tcp(TcpHeader),
    Icmpv4(Icmpv4Header),
    Icmpv6(Icmpv6Header),
}

impl Transport {
    fn protocol(&self) -> IpProtocol {
        match self {
            Transport::Udp(_) => IpProtocol::UDP,
            Transport::Tcp(_) => IpProtocol::TCP,
            Transport::Icmpv4(_) => IpProtocol::ICMP,
            Transport::Icmpv6(_) => IpProtocol::ICMPv6,
        }
    }

    /// Serialized segment and the offset of its checksum field
    fn encode(&self, payload: &[u8]) -> (Vec<u8>, usize) {
        match self {
            Transport::Udp(udp) => (udp.to_bytes(payload), UdpHeader::CHECKSUM_OFFSET),
            Transport::Tcp(tcp) => (tcp.to_bytes(payload), TcpHeader::CHECKSUM_OFFSET),
            Transport::Icmpv4(icmp) => (icmp.to_bytes(payload), 2),
            Transport::Icmpv6(icmp) => (icmp.to_bytes(payload), 2),
        }
    }
}

/// Fluent frame builder
///
/// ```
/// use std::net::Ipv6Addr;
/// use pktstat_packet::PacketBuilder;
/// use pktstat_packet::ethernet::{MacAddress, EtherType};
///
/// let frame = PacketBuilder::new()
///     .ethernet(MacAddress::ZERO, MacAddress::BROADCAST, EtherType::IPv6)
///     .ipv6(Ipv6Addr::LOCALHOST, "::2".parse().unwrap())
///     .udp(53, 9999)
///     .payload(vec![0u8; 4])
///     .build()
///     .unwrap();
/// assert_eq!(frame.len(), 14 + 40 + 8 + 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PacketBuilder {
    link: Option<EthernetHeader>,
    network: Option<Network>,
    transport: Option<Transport>,
    carried: Option<IpProtocol>,
    payload: Vec<u8>,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ethernet(mut self, src: MacAddress, dst: MacAddress, ethertype: EtherType) -> Self {
        self.link = Some(EthernetHeader::new(dst, src, ethertype));
        self
    }

    pub fn ipv4(mut self, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        self.network = Some(Network::V4(Ipv4Header::new(src, dst, IpProtocol::Other(255))));
        self
    }

    pub fn ipv6(mut self, src: Ipv6Addr, dst: Ipv6Addr) -> Self {
        self.network = Some(Network::V6(Ipv6Header::new(src, dst, IpProtocol::Other(255))));
        self
    }

    /// TTL or hop limit of the network layer set so far
    pub fn ttl(mut self, ttl: u8) -> Self {
        match &mut self.network {
            Some(Network::V4(ip)) => ip.ttl = ttl,
            Some(Network::V6(ip)) => ip.hop_limit = ttl,
            None => {}
        }
        self
    }

    pub fn identification(self, id: u16) -> Self {
        self.map_v4(|ip| ip.with_identification(id))
    }

    /// Fragment offset in 8-byte units; IPv4 only
    pub fn fragment_offset(self, offset: u16) -> Self {
        self.map_v4(|ip| ip.with_fragment_offset(offset))
    }

    /// Set MF, making this the first fragment of a datagram; IPv4 only
    pub fn more_fragments(self) -> Self {
        self.map_v4(Ipv4Header::with_more_fragments)
    }

    /// Protocol number to carry when no transport header is added
    ///
    /// Tunnelled frames use this with an inner packet as payload.
    pub fn protocol(mut self, protocol: IpProtocol) -> Self {
        self.carried = Some(protocol);
        self
    }

    pub fn udp(mut self, src_port: u16, dst_port: u16) -> Self {
        self.transport = Some(Transport::Udp(UdpHeader::new(src_port, dst_port)));
        self
    }

    pub fn tcp(mut self, src_port: u16, dst_port: u16, seq: u32, ack: u32, flags: TcpFlags) -> Self {
        let header = TcpHeader::new(src_port, dst_port, seq, ack, flags, 65535);
        self.transport = Some(Transport::Tcp(header));
        self
    }

    pub fn icmpv4(mut self, icmp_type: u8, code: u8) -> Self {
        self.transport = Some(Transport::Icmpv4(Icmpv4Header::new(icmp_type, code)));
        self
    }

    pub fn icmpv6(mut self, icmp_type: u8, code: u8) -> Self {
        self.transport = Some(Transport::Icmpv6(Icmpv6Header::new(icmp_type, code)));
        self
    }

    pub fn payload(mut self, data: Vec<u8>) -> Self {
        self.payload = data;
        self
    }

    fn map_v4(mut self, f: impl FnOnce(Ipv4Header) -> Ipv4Header) -> Self {
        if let Some(Network::V4(ip)) = self.network.take() {
            self.network = Some(Network::V4(f(ip)));
        }
        self
    }

    /// Build from the IP header on, without a link layer
    ///
    /// # Errors
    ///
    /// Fails without a network layer, or when the ICMP version does not match
    /// the IP version.
    pub fn build_ip(&self) -> Result<Vec<u8>> {
        let network = self
            .network
            .as_ref()
            .ok_or_else(|| Error::PacketConstruction("Layer 3 is required".into()))?;

        let (inner, protocol) = match &self.transport {
            Some(transport) => (
                encode_transport(network, transport, &self.payload)?,
                transport.protocol(),
            ),
            None => (
                self.payload.clone(),
                self.carried.unwrap_or(IpProtocol::Other(255)),
            ),
        };

        let packet = match network {
            Network::V4(ip) => {
                let mut ip = ip.clone();
                ip.protocol = protocol;
                ip.to_bytes(&inner)
            }
            Network::V6(ip) => {
                let mut ip = ip.clone();
                ip.next_header = protocol;
                ip.to_bytes(&inner)
            }
        };
        Ok(packet)
    }

    /// Build the complete frame
    ///
    /// # Errors
    ///
    /// Fails without a link layer, or with a transport header but no network
    /// layer.
    pub fn build(self) -> Result<Vec<u8>> {
        let link = self
            .link
            .ok_or_else(|| Error::PacketConstruction("Layer 2 is required".into()))?;

        let body = if self.network.is_some() {
            self.build_ip()?
        } else if self.transport.is_some() {
            return Err(Error::PacketConstruction("Layer 4 requires Layer 3".into()));
        } else {
            self.payload
        };

        Ok(link.to_bytes(&body))
    }
}

fn encode_transport(network: &Network, transport: &Transport, payload: &[u8]) -> Result<Vec<u8>> {
    match (network, transport) {
        (Network::V6(_), Transport::Icmpv4(_)) => {
            return Err(Error::PacketConstruction("ICMPv4 requires IPv4".into()))
        }
        (Network::V4(_), Transport::Icmpv6(_)) => {
            return Err(Error::PacketConstruction("ICMPv6 requires IPv6".into()))
        }
        _ => {}
    }

    let (mut segment, at) = transport.encode(payload);
    let protocol = u8::from(transport.protocol());
    let mut checksum = match (network, transport) {
        (_, Transport::Icmpv4(_)) => internet_checksum(&segment),
        (Network::V4(ip), _) => transport_checksum(
            &ip.source.octets(),
            &ip.destination.octets(),
            protocol,
            &segment,
        ),
        (Network::V6(ip), _) => {
            transport_checksum_v6(&ip.source, &ip.destination, protocol, &segment)
        }
    };

    // UDP sends a computed zero as all ones
    if checksum == 0 && matches!(transport, Transport::Udp(_)) {
        checksum = 0xFFFF;
    }

    segment[at..at + 2].copy_from_slice(&checksum.to_be_bytes());
    Ok(segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::validate_checksum;

    const SRC_MAC: MacAddress = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    const DST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    #[test]
    fn test_builder_ethernet_only() {
        let packet = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC, EtherType::ARP)
            .payload(vec![0x00, 0x01, 0x08, 0x00])
            .build()
            .unwrap();

        let (eth, payload) = EthernetHeader::parse(&packet).unwrap();
        assert_eq!(eth.source, SRC_MAC);
        assert_eq!(eth.destination, DST_MAC);
        assert_eq!(eth.ethertype, EtherType::ARP);
        assert_eq!(&payload[..4], &[0x00, 0x01, 0x08, 0x00]);
    }

    #[test]
    fn test_builder_ethernet_ipv4_tcp() {
        let packet = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC, EtherType::IPv4)
            .ipv4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
            .tcp(1234, 80, 1000, 2000, TcpFlags::SYN)
            .payload(vec![0x01, 0x02, 0x03, 0x04])
            .build()
            .unwrap();

        let (_, rest) = EthernetHeader::parse(&packet).unwrap();
        let (ip, rest) = Ipv4Header::parse(rest).unwrap();
        assert_eq!(ip.source, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(ip.protocol, IpProtocol::TCP);

        let checksum = transport_checksum(&ip.source.octets(), &ip.destination.octets(), 6, rest);
        assert_eq!(checksum, 0);

        let (tcp, payload) = TcpHeader::parse(rest).unwrap();
        assert_eq!(tcp.source_port, 1234);
        assert_eq!(tcp.destination_port, 80);
        assert_eq!(tcp.flags, TcpFlags::SYN);
        assert_eq!(payload, &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_builder_ipv6_udp_checksum() {
        let src: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let dst: Ipv6Addr = "2001:db8::2".parse().unwrap();
        let packet = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC, EtherType::IPv6)
            .ipv6(src, dst)
            .udp(5353, 5353)
            .payload(vec![0xAB; 12])
            .build()
            .unwrap();

        let (_, rest) = EthernetHeader::parse(&packet).unwrap();
        let (ip6, rest) = Ipv6Header::parse(rest).unwrap();
        assert_eq!(ip6.next_header, IpProtocol::UDP);
        assert_eq!(ip6.payload_length, 20);
        assert_eq!(transport_checksum_v6(&src, &dst, 17, rest), 0);
    }

    #[test]
    fn test_builder_icmp() {
        let packet = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC, EtherType::IPv4)
            .ipv4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
            .icmpv4(Icmpv4Header::ECHO_REQUEST, 0)
            .payload(vec![0u8; 16])
            .build()
            .unwrap();

        let (_, rest) = EthernetHeader::parse(&packet).unwrap();
        let (ip, rest) = Ipv4Header::parse(rest).unwrap();
        assert_eq!(ip.protocol, IpProtocol::ICMP);
        assert!(validate_checksum(rest));
    }

    #[test]
    fn test_builder_icmp_family_mismatch() {
        let result = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC, EtherType::IPv6)
            .ipv6(Ipv6Addr::LOCALHOST, Ipv6Addr::LOCALHOST)
            .icmpv4(Icmpv4Header::ECHO_REQUEST, 0)
            .build();
        assert!(result.is_err());

        let result = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC, EtherType::IPv4)
            .ipv4(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST)
            .icmpv6(Icmpv6Header::ECHO_REQUEST, 0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_protocol_override() {
        let packet = PacketBuilder::new()
            .ipv4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
            .protocol(IpProtocol::GRE)
            .payload(vec![0u8; 4])
            .build_ip()
            .unwrap();

        let (ip, payload) = Ipv4Header::parse(&packet).unwrap();
        assert_eq!(ip.protocol, IpProtocol::GRE);
        assert_eq!(payload.len(), 4);
    }

    #[test]
    fn test_builder_ipv4_header_fields() {
        let packet = PacketBuilder::new()
            .ipv4(Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2))
            .ttl(128)
            .identification(0x1234)
            .more_fragments()
            .build_ip()
            .unwrap();

        let (ip, _) = Ipv4Header::parse(&packet).unwrap();
        assert_eq!(ip.ttl, 128);
        assert_eq!(ip.identification, 0x1234);
        assert!(ip.more_fragments);
        assert!(ip.is_fragment());
    }

    #[test]
    fn test_builder_hop_limit() {
        let packet = PacketBuilder::new()
            .ipv6(Ipv6Addr::LOCALHOST, Ipv6Addr::LOCALHOST)
            .ttl(7)
            .build_ip()
            .unwrap();

        let (ip6, _) = Ipv6Header::parse(&packet).unwrap();
        assert_eq!(ip6.hop_limit, 7);
    }

    #[test]
    fn test_builder_missing_layer2() {
        let result = PacketBuilder::new().payload(vec![0x01, 0x02]).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_layer4_without_layer3() {
        let result = PacketBuilder::new()
            .ethernet(SRC_MAC, DST_MAC, EtherType::IPv4)
            .udp(12345, 53)
            .build();
        assert!(result.is_err());

        assert!(PacketBuilder::new().udp(1, 2).build_ip().is_err());
    }
}
