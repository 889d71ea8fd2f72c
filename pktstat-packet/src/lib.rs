//! Header decoding and frame construction for pktstat
//!
//! This crate decodes the protocol headers the flow classifier needs, from
//! layer 2 (Ethernet) to layer 4 (TCP/UDP/ICMP), and builds well-formed frames
//! for tests and tooling.
//!
//! - **Ethernet II** frames with common EtherTypes
//! - **IPv4** headers, including fragment information
//! - **IPv6** fixed headers
//! - **TCP**, **UDP**, **ICMPv4** and **ICMPv6** headers
//!
//! # Decoding
//!
//! Every header type has a `parse` function that takes the bytes starting at
//! that header and returns the decoded header together with the payload slice
//! that follows it. Parsing never copies the payload.
//!
//! ```rust
//! use pktstat_packet::ethernet::{EthernetHeader, EtherType};
//!
//! let data = [
//!     0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, // dst
//!     0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src
//!     0x08, 0x06, // ARP
//!     0x00, 0x01,
//! ];
//! let (eth, payload) = EthernetHeader::parse(&data).unwrap();
//! assert_eq!(eth.ethertype, EtherType::ARP);
//! assert_eq!(payload, &[0x00, 0x01]);
//! ```
//!
//! # Building
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use pktstat_packet::PacketBuilder;
//! use pktstat_packet::ethernet::{MacAddress, EtherType};
//! use pktstat_packet::tcp::TcpFlags;
//!
//! let packet = PacketBuilder::new()
//!     .ethernet(MacAddress::ZERO, MacAddress::BROADCAST, EtherType::IPv4)
//!     .ipv4(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
//!     .tcp(1234, 80, 1000, 0, TcpFlags::SYN)
//!     .build()
//!     .unwrap();
//! assert!(packet.len() >= 54);
//! ```

pub mod builder;
pub mod checksum;
pub mod ethernet;
pub mod icmp;
pub mod ip;
pub mod ipv6;
pub mod tcp;
pub mod udp;

// Re-export commonly used types for convenience
pub use builder::PacketBuilder;
pub use checksum::{internet_checksum, transport_checksum, transport_checksum_v6};
pub use ethernet::{EtherType, EthernetHeader, MacAddress};
pub use icmp::{Icmpv4Header, Icmpv6Header};
pub use ip::{IpProtocol, Ipv4Header};
pub use ipv6::Ipv6Header;
pub use tcp::{TcpFlags, TcpHeader};
pub use udp::UdpHeader;
