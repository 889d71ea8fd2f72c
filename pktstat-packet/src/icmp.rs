//! ICMPv4 and ICMPv6 header decoding and construction

use bytes::{BufMut, BytesMut};
use pktstat_core::{Error, Result};

/// ICMPv4 header: type, code, checksum and the 4-byte rest-of-header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Icmpv4Header {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    /// Identifier/sequence for echo, unused or gateway for others
    pub rest_of_header: u32,
}

impl Icmpv4Header {
    pub const HEADER_SIZE: usize = 8;

    pub const ECHO_REPLY: u8 = 0;
    pub const DESTINATION_UNREACHABLE: u8 = 3;
    pub const ECHO_REQUEST: u8 = 8;

    pub fn new(icmp_type: u8, code: u8) -> Self {
        Icmpv4Header {
            icmp_type,
            code,
            checksum: 0,
            rest_of_header: 0,
        }
    }

    pub fn parse(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < Self::HEADER_SIZE {
            return Err(Error::parsing(format!(
                "ICMPv4 header truncated: {} of {} bytes",
                data.len(),
                Self::HEADER_SIZE
            )));
        }

        let header = Icmpv4Header {
            icmp_type: data[0],
            code: data[1],
            checksum: u16::from_be_bytes([data[2], data[3]]),
            rest_of_header: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
        };

        Ok((header, &data[Self::HEADER_SIZE..]))
    }

    /// Serialize header and payload; the checksum field is written as stored
    pub fn to_bytes(&self, payload: &[u8]) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE + payload.len());

        buffer.put_u8(self.icmp_type);
        buffer.put_u8(self.code);
        buffer.put_u16(self.checksum);
        buffer.put_u32(self.rest_of_header);
        buffer.put_slice(payload);

        buffer.to_vec()
    }
}

/// ICMPv6 header: type, code and checksum. The message body follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Icmpv6Header {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
}

impl Icmpv6Header {
    pub const HEADER_SIZE: usize = 4;

    pub const ECHO_REQUEST: u8 = 128;
    pub const ECHO_REPLY: u8 = 129;
    pub const NEIGHBOR_SOLICITATION: u8 = 135;

    pub fn new(icmp_type: u8, code: u8) -> Self {
        Icmpv6Header {
            icmp_type,
            code,
            checksum: 0,
        }
    }

    pub fn parse(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < Self::HEADER_SIZE {
            return Err(Error::parsing(format!(
                "ICMPv6 header truncated: {} of {} bytes",
                data.len(),
                Self::HEADER_SIZE
            )));
        }

        let header = Icmpv6Header {
            icmp_type: data[0],
            code: data[1],
            checksum: u16::from_be_bytes([data[2], data[3]]),
        };

        Ok((header, &data[Self::HEADER_SIZE..]))
    }

    pub fn to_bytes(&self, payload: &[u8]) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(Self::HEADER_SIZE + payload.len());

        buffer.put_u8(self.icmp_type);
        buffer.put_u8(self.code);
        buffer.put_u16(self.checksum);
        buffer.put_slice(payload);

        buffer.to_vec()
    }
}
