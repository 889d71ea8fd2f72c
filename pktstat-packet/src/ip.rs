//! IPv4, plus the protocol numbers IPv4 and IPv6 share

use crate::checksum::internet_checksum;
use bytes::{BufMut, BytesMut};
use pktstat_core::{Error, Result};
use std::net::Ipv4Addr;

/// Value of the IPv4 protocol field or IPv6 next-header field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProtocol {
    ICMP,
    /// IP-in-IP
    IPv4,
    TCP,
    UDP,
    /// 6in4
    IPv6,
    GRE,
    ICMPv6,
    Other(u8),
}

impl From<u8> for IpProtocol {
    fn from(value: u8) -> Self {
        match value {
            1 => IpProtocol::ICMP,
            4 => IpProtocol::IPv4,
            6 => IpProtocol::TCP,
            17 => IpProtocol::UDP,
            41 => IpProtocol::IPv6,
            47 => IpProtocol::GRE,
            58 => IpProtocol::ICMPv6,
            other => IpProtocol::Other(other),
        }
    }
}

impl From<IpProtocol> for u8 {
    fn from(protocol: IpProtocol) -> Self {
        match protocol {
            IpProtocol::ICMP => 1,
            IpProtocol::IPv4 => 4,
            IpProtocol::TCP => 6,
            IpProtocol::UDP => 17,
            IpProtocol::IPv6 => 41,
            IpProtocol::GRE => 47,
            IpProtocol::ICMPv6 => 58,
            IpProtocol::Other(value) => value,
        }
    }
}

const FLAG_DONT_FRAGMENT: u16 = 0x4000;
const FLAG_MORE_FRAGMENTS: u16 = 0x2000;
const OFFSET_MASK: u16 = 0x1FFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Header length in 32-bit words
    pub ihl: u8,
    pub tos: u8,
    pub total_length: u16,
    pub identification: u16,
    pub dont_fragment: bool,
    pub more_fragments: bool,
    /// In 8-byte units
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: IpProtocol,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl Ipv4Header {
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Unfragmented datagram with DF set and a TTL of 64
    pub fn new(source: Ipv4Addr, destination: Ipv4Addr, protocol: IpProtocol) -> Self {
        Ipv4Header {
            ihl: 5,
            tos: 0,
            total_length: Self::MIN_HEADER_SIZE as u16,
            identification: 0,
            dont_fragment: true,
            more_fragments: false,
            fragment_offset: 0,
            ttl: 64,
            protocol,
            checksum: 0,
            source,
            destination,
        }
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_identification(mut self, id: u16) -> Self {
        self.identification = id;
        self
    }

    /// Mark this as a non-first fragment; clears DF
    pub fn with_fragment_offset(mut self, offset: u16) -> Self {
        self.fragment_offset = offset & OFFSET_MASK;
        self.dont_fragment &= self.fragment_offset == 0;
        self
    }

    pub fn with_more_fragments(mut self) -> Self {
        self.more_fragments = true;
        self.dont_fragment = false;
        self
    }

    pub fn header_len(&self) -> usize {
        usize::from(self.ihl) * 4
    }

    /// Any piece of a fragmented datagram, first piece included
    pub fn is_fragment(&self) -> bool {
        self.more_fragments || self.fragment_offset != 0
    }

    /// Decode a packet into its header and payload
    ///
    /// The payload ends where the total-length field says, dropping link
    /// padding. A total length of zero (segmentation offload) or one past the
    /// captured bytes yields whatever was captured.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8])> {
        let fixed = data.get(..Self::MIN_HEADER_SIZE).ok_or_else(|| {
            Error::parsing(format!(
                "IPv4 header truncated: {} of {} bytes",
                data.len(),
                Self::MIN_HEADER_SIZE
            ))
        })?;

        let version = fixed[0] >> 4;
        if version != 4 {
            return Err(Error::parsing(format!("IPv4 header has version {}", version)));
        }

        let word = |at: usize| u16::from_be_bytes([fixed[at], fixed[at + 1]]);
        let fragment = word(6);
        let header = Ipv4Header {
            ihl: fixed[0] & 0x0F,
            tos: fixed[1],
            total_length: word(2),
            identification: word(4),
            dont_fragment: fragment & FLAG_DONT_FRAGMENT != 0,
            more_fragments: fragment & FLAG_MORE_FRAGMENTS != 0,
            fragment_offset: fragment & OFFSET_MASK,
            ttl: fixed[8],
            protocol: IpProtocol::from(fixed[9]),
            checksum: word(10),
            source: Ipv4Addr::new(fixed[12], fixed[13], fixed[14], fixed[15]),
            destination: Ipv4Addr::new(fixed[16], fixed[17], fixed[18], fixed[19]),
        };

        let header_len = header.header_len();
        if header_len < Self::MIN_HEADER_SIZE {
            return Err(Error::parsing(format!("IPv4 header length {} too small", header_len)));
        }
        if data.len() < header_len {
            return Err(Error::parsing(format!(
                "IPv4 options truncated: {} of {} bytes",
                data.len(),
                header_len
            )));
        }

        let end = match usize::from(header.total_length) {
            0 => data.len(),
            len if len < header_len => {
                return Err(Error::parsing(format!(
                    "IPv4 total length {} smaller than header length {}",
                    len, header_len
                )))
            }
            len => len.min(data.len()),
        };

        Ok((header, &data[header_len..end]))
    }

    /// Option-less header and payload with length and checksum filled in
    pub fn to_bytes(&self, payload: &[u8]) -> Vec<u8> {
        let total_length = Self::MIN_HEADER_SIZE + payload.len();
        let mut fragment = self.fragment_offset & OFFSET_MASK;
        if self.dont_fragment {
            fragment |= FLAG_DONT_FRAGMENT;
        }
        if self.more_fragments {
            fragment |= FLAG_MORE_FRAGMENTS;
        }

        let mut packet = BytesMut::with_capacity(total_length);
        packet.put_u8(0x45);
        packet.put_u8(self.tos);
        packet.put_u16(total_length as u16);
        packet.put_u16(self.identification);
        packet.put_u16(fragment);
        packet.put_u8(self.ttl);
        packet.put_u8(self.protocol.into());
        packet.put_u16(0);
        packet.put_slice(&self.source.octets());
        packet.put_slice(&self.destination.octets());

        let checksum = internet_checksum(&packet);
        packet[10..12].copy_from_slice(&checksum.to_be_bytes());

        packet.put_slice(payload);
        packet.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::validate_checksum;

    fn sample() -> Ipv4Header {
        Ipv4Header::new(
            Ipv4Addr::new(192, 168, 1, 1),
            Ipv4Addr::new(192, 168, 1, 2),
            IpProtocol::UDP,
        )
    }

    #[test]
    fn test_ip_protocol_numbers() {
        assert_eq!(u8::from(IpProtocol::TCP), 6);
        assert_eq!(u8::from(IpProtocol::ICMPv6), 58);
        assert_eq!(IpProtocol::from(41), IpProtocol::IPv6);
        assert_eq!(IpProtocol::from(132), IpProtocol::Other(132));
        assert_eq!(u8::from(IpProtocol::Other(132)), 132);
    }

    #[test]
    fn test_to_bytes_layout() {
        let bytes = sample().to_bytes(&[0x01, 0x02, 0x03, 0x04]);

        assert_eq!(bytes[0], 0x45);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 24);
        assert_eq!(u16::from_be_bytes([bytes[6], bytes[7]]), 0x4000);
        assert_eq!(bytes[9], 17);
        assert_eq!(&bytes[12..16], &[192, 168, 1, 1]);
        assert_eq!(&bytes[16..20], &[192, 168, 1, 2]);
        assert!(validate_checksum(&bytes[..20]));
    }

    #[test]
    fn test_parse_strips_trailing_padding() {
        let mut bytes = sample().to_bytes(&[0xAA; 8]);
        bytes.extend_from_slice(&[0u8; 10]);

        let (header, payload) = Ipv4Header::parse(&bytes).unwrap();
        assert_eq!(header.source, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(header.destination, Ipv4Addr::new(192, 168, 1, 2));
        assert_eq!(header.protocol, IpProtocol::UDP);
        assert_eq!(payload, &[0xAA; 8]);
    }

    #[test]
    fn test_parse_truncated_capture_keeps_available_payload() {
        let bytes = sample().to_bytes(&[0xAA; 100]);
        let (_, payload) = Ipv4Header::parse(&bytes[..40]).unwrap();
        assert_eq!(payload.len(), 20);
    }

    #[test]
    fn test_parse_zero_total_length_takes_rest() {
        let mut bytes = sample().to_bytes(&[0xAA; 12]);
        bytes[2..4].copy_from_slice(&[0, 0]);
        let (_, payload) = Ipv4Header::parse(&bytes).unwrap();
        assert_eq!(payload.len(), 12);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Ipv4Header::parse(&[0x45; 19]).is_err());

        let mut bytes = sample().to_bytes(&[]);
        bytes[0] = 0x65;
        assert!(Ipv4Header::parse(&bytes).unwrap_err().to_string().contains("version 6"));

        let mut bytes = sample().to_bytes(&[]);
        bytes[0] = 0x44;
        assert!(Ipv4Header::parse(&bytes).is_err());

        let mut bytes = sample().to_bytes(&[]);
        bytes[0] = 0x46;
        assert!(Ipv4Header::parse(&bytes).unwrap_err().to_string().contains("options truncated"));

        let mut bytes = sample().to_bytes(&[]);
        bytes[2..4].copy_from_slice(&10u16.to_be_bytes());
        assert!(Ipv4Header::parse(&bytes).is_err());
    }

    #[test]
    fn test_fragment_offset() {
        let bytes = sample().with_fragment_offset(185).to_bytes(&[0u8; 8]);
        let (header, _) = Ipv4Header::parse(&bytes).unwrap();
        assert_eq!(header.fragment_offset, 185);
        assert!(header.is_fragment());
        assert!(!header.dont_fragment);
    }

    #[test]
    fn test_first_fragment() {
        let bytes = sample().with_more_fragments().to_bytes(&[0u8; 8]);
        let (header, _) = Ipv4Header::parse(&bytes).unwrap();
        assert_eq!(header.fragment_offset, 0);
        assert!(header.more_fragments);
        assert!(header.is_fragment());
    }

    #[test]
    fn test_unfragmented_is_not_fragment() {
        let bytes = sample().to_bytes(&[0u8; 8]);
        let (header, _) = Ipv4Header::parse(&bytes).unwrap();
        assert!(!header.is_fragment());
        assert!(header.dont_fragment);
    }

    #[test]
    fn test_ttl_and_identification() {
        let bytes = sample().with_ttl(128).with_identification(0x1234).to_bytes(&[]);
        let (header, payload) = Ipv4Header::parse(&bytes).unwrap();
        assert_eq!(header.ttl, 128);
        assert_eq!(header.identification, 0x1234);
        assert!(payload.is_empty());
    }
}
