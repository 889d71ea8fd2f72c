//! IPv6 fixed header decoding and construction

use crate::ip::IpProtocol;
use bytes::{BufMut, BytesMut};
use pktstat_core::{Error, Result};
use std::net::Ipv6Addr;

/// IPv6 fixed header (RFC 8200)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6Header {
    /// Traffic class
    pub traffic_class: u8,
    /// Flow label (20 bits)
    pub flow_label: u32,
    /// Length of the payload after this header
    pub payload_length: u16,
    /// Type of the header that follows
    pub next_header: IpProtocol,
    /// Hop limit
    pub hop_limit: u8,
    /// Source address
    pub source: Ipv6Addr,
    /// Destination address
    pub destination: Ipv6Addr,
}

impl Ipv6Header {
    /// Fixed header size
    pub const HEADER_SIZE: usize = 40;

    pub fn new(source: Ipv6Addr, destination: Ipv6Addr, next_header: IpProtocol) -> Self {
        Ipv6Header {
            traffic_class: 0,
            flow_label: 0,
            payload_length: 0,
            next_header,
            hop_limit: 64,
            source,
            destination,
        }
    }

    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    /// Decode an IPv6 fixed header, returning it and its payload
    ///
    /// The payload is bounded by the payload-length field when the buffer
    /// holds that much; a zero length (jumbogram) or a truncated capture
    /// yields the rest of the buffer.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < Self::HEADER_SIZE {
            return Err(Error::parsing(format!(
                "IPv6 header truncated: {} of {} bytes",
                data.len(),
                Self::HEADER_SIZE
            )));
        }

        let version = data[0] >> 4;
        if version != 6 {
            return Err(Error::parsing(format!("IPv6 header has version {}", version)));
        }

        let word = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let payload_length = u16::from_be_bytes([data[4], data[5]]);

        let mut source = [0u8; 16];
        source.copy_from_slice(&data[8..24]);
        let mut destination = [0u8; 16];
        destination.copy_from_slice(&data[24..40]);

        let rest = &data[Self::HEADER_SIZE..];
        let payload = match payload_length as usize {
            0 => rest,
            len => &rest[..len.min(rest.len())],
        };

        Ok((
            Ipv6Header {
                traffic_class: ((word >> 20) & 0xFF) as u8,
                flow_label: word & 0x000F_FFFF,
                payload_length,
                next_header: IpProtocol::from(data[6]),
                hop_limit: data[7],
                source: Ipv6Addr::from(source),
                destination: Ipv6Addr::from(destination),
            },
            payload,
        ))
    }

    /// Serialize header and payload, computing the payload length
    pub fn to_bytes(&self, payload: &[u8]) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE + payload.len());

        let word = (6u32 << 28) | ((self.traffic_class as u32) << 20) | (self.flow_label & 0x000F_FFFF);
        buffer.put_u32(word);
        buffer.put_u16(payload.len() as u16);
        buffer.put_u8(self.next_header.into());
        buffer.put_u8(self.hop_limit);
        buffer.put_slice(&self.source.octets());
        buffer.put_slice(&self.destination.octets());
        buffer.put_slice(payload);

        buffer.to_vec()
    }
}
