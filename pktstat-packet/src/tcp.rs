//! TCP

use bytes::{BufMut, BytesMut};
use pktstat_core::{Error, Result};
use std::ops::BitOr;

/// Control bits from byte 13 of the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TcpFlags(u8);

impl TcpFlags {
    pub const FIN: TcpFlags = TcpFlags(0x01);
    pub const SYN: TcpFlags = TcpFlags(0x02);
    pub const RST: TcpFlags = TcpFlags(0x04);
    pub const PSH: TcpFlags = TcpFlags(0x08);
    pub const ACK: TcpFlags = TcpFlags(0x10);
    pub const PSH_ACK: TcpFlags = TcpFlags(0x18);

    pub const fn from_bits(bits: u8) -> Self {
        TcpFlags(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when every bit of `other` is set
    pub const fn contains(self, other: TcpFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for TcpFlags {
    type Output = TcpFlags;

    fn bitor(self, rhs: TcpFlags) -> TcpFlags {
        TcpFlags(self.0 | rhs.0)
    }
}

/// Fixed part of a TCP header
///
/// Options are stepped over using the data offset but never decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub seq: u32,
    pub ack: u32,
    /// Header length in 32-bit words
    pub data_offset: u8,
    pub flags: TcpFlags,
    pub window: u16,
    pub checksum: u16,
    pub urgent: u16,
}

impl TcpHeader {
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Where the checksum sits, for callers that patch it after serializing
    pub const CHECKSUM_OFFSET: usize = 16;

    pub fn new(
        source_port: u16,
        destination_port: u16,
        seq: u32,
        ack: u32,
        flags: TcpFlags,
        window: u16,
    ) -> Self {
        TcpHeader {
            source_port,
            destination_port,
            seq,
            ack,
            data_offset: 5,
            flags,
            window,
            checksum: 0,
            urgent: 0,
        }
    }

    pub fn header_len(&self) -> usize {
        usize::from(self.data_offset) * 4
    }

    /// Decode a segment into its header and payload
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8])> {
        let fixed: &[u8; Self::MIN_HEADER_SIZE] = data
            .get(..Self::MIN_HEADER_SIZE)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| {
                Error::parsing(format!(
                    "TCP header truncated: {} of {} bytes",
                    data.len(),
                    Self::MIN_HEADER_SIZE
                ))
            })?;

        let word = |at: usize| u16::from_be_bytes([fixed[at], fixed[at + 1]]);
        let dword = |at: usize| {
            u32::from_be_bytes([fixed[at], fixed[at + 1], fixed[at + 2], fixed[at + 3]])
        };

        let header = TcpHeader {
            source_port: word(0),
            destination_port: word(2),
            seq: dword(4),
            ack: dword(8),
            data_offset: fixed[12] >> 4,
            flags: TcpFlags::from_bits(fixed[13]),
            window: word(14),
            checksum: word(16),
            urgent: word(18),
        };

        let header_len = header.header_len();
        if header_len < Self::MIN_HEADER_SIZE {
            return Err(Error::parsing(format!(
                "TCP data offset {} too small",
                header.data_offset
            )));
        }
        let payload = data.get(header_len..).ok_or_else(|| {
            Error::parsing(format!(
                "TCP options truncated: {} of {} bytes",
                data.len(),
                header_len
            ))
        })?;

        Ok((header, payload))
    }

    /// Option-less header followed by `payload`, checksum written as stored
    pub fn to_bytes(&self, payload: &[u8]) -> Vec<u8> {
        let mut segment = BytesMut::with_capacity(Self::MIN_HEADER_SIZE + payload.len());

        segment.put_u16(self.source_port);
        segment.put_u16(self.destination_port);
        segment.put_u32(self.seq);
        segment.put_u32(self.ack);
        segment.put_u8(5 << 4);
        segment.put_u8(self.flags.bits());
        segment.put_u16(self.window);
        segment.put_u16(self.checksum);
        segment.put_u16(self.urgent);
        segment.put_slice(payload);

        segment.to_vec()
    }
}
