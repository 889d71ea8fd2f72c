//! UDP header decoding and construction

use bytes::{BufMut, BytesMut};
use pktstat_core::{Error, Result};

/// UDP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    /// Source port
    pub source_port: u16,
    /// Destination port
    pub destination_port: u16,
    /// Length (header + data)
    pub length: u16,
    /// Checksum
    pub checksum: u16,
}

impl UdpHeader {
    /// UDP header size in bytes
    pub const HEADER_SIZE: usize = 8;

    /// Offset of the checksum field within the header
    pub const CHECKSUM_OFFSET: usize = 6;

    pub fn new(source_port: u16, destination_port: u16) -> Self {
        UdpHeader {
            source_port,
            destination_port,
            length: Self::HEADER_SIZE as u16,
            checksum: 0,
        }
    }

    /// Decode a UDP header, returning it and the datagram payload
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < Self::HEADER_SIZE {
            return Err(Error::parsing(format!(
                "UDP header truncated: {} of {} bytes",
                data.len(),
                Self::HEADER_SIZE
            )));
        }

        let header = UdpHeader {
            source_port: u16::from_be_bytes([data[0], data[1]]),
            destination_port: u16::from_be_bytes([data[2], data[3]]),
            length: u16::from_be_bytes([data[4], data[5]]),
            checksum: u16::from_be_bytes([data[6], data[7]]),
        };

        Ok((header, &data[Self::HEADER_SIZE..]))
    }

    /// Serialize header and payload, computing the length field
    pub fn to_bytes(&self, payload: &[u8]) -> Vec<u8> {
        let length = (Self::HEADER_SIZE + payload.len()) as u16;
        let mut buffer = BytesMut::with_capacity(length as usize);

        buffer.put_u16(self.source_port);
        buffer.put_u16(self.destination_port);
        buffer.put_u16(length);
        buffer.put_u16(self.checksum);
        buffer.put_slice(payload);

        buffer.to_vec()
    }
}
