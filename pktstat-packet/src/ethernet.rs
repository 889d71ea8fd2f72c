//! Ethernet II

use bytes::{BufMut, BytesMut};
use pktstat_core::{Error, Result};
use std::fmt;

/// EtherType field of an Ethernet II frame
///
/// Only IPv4 and IPv6 lead anywhere in classification; the other named
/// values exist so that logs and tests can say what was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    IPv4,
    ARP,
    /// 802.1Q tag; tagged frames are not followed
    VLAN,
    IPv6,
    /// Values up to 1500 are 802.3 lengths, not types
    Length(u16),
    Other(u16),
}

impl From<u16> for EtherType {
    fn from(value: u16) -> Self {
        match value {
            0x0800 => EtherType::IPv4,
            0x0806 => EtherType::ARP,
            0x8100 => EtherType::VLAN,
            0x86DD => EtherType::IPv6,
            len @ 0..=1500 => EtherType::Length(len),
            other => EtherType::Other(other),
        }
    }
}

impl From<EtherType> for u16 {
    fn from(ethertype: EtherType) -> Self {
        match ethertype {
            EtherType::IPv4 => 0x0800,
            EtherType::ARP => 0x0806,
            EtherType::VLAN => 0x8100,
            EtherType::IPv6 => 0x86DD,
            EtherType::Length(value) | EtherType::Other(value) => value,
        }
    }
}

/// Hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);
    pub const ZERO: MacAddress = MacAddress([0x00; 6]);

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    fn read(data: &[u8]) -> Self {
        let mut octets = [0u8; 6];
        octets.copy_from_slice(&data[..6]);
        MacAddress(octets)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, octet) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", octet)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: MacAddress,
    pub source: MacAddress,
    pub ethertype: EtherType,
}

impl EthernetHeader {
    /// Destination, source and type
    pub const HEADER_SIZE: usize = 14;

    /// Shortest frame on the wire, FCS excluded
    pub const MIN_FRAME_SIZE: usize = 60;

    pub fn new(destination: MacAddress, source: MacAddress, ethertype: EtherType) -> Self {
        Self {
            destination,
            source,
            ethertype,
        }
    }

    /// Decode the header at the start of `data`
    ///
    /// The returned payload may include trailing padding; the network layer
    /// trims it using its own length field.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < Self::HEADER_SIZE {
            return Err(Error::parsing(format!(
                "Ethernet header truncated: {} of {} bytes",
                data.len(),
                Self::HEADER_SIZE
            )));
        }

        let header = Self {
            destination: MacAddress::read(&data[0..]),
            source: MacAddress::read(&data[6..]),
            ethertype: u16::from_be_bytes([data[12], data[13]]).into(),
        };
        Ok((header, &data[Self::HEADER_SIZE..]))
    }

    /// Header plus `payload`, zero-padded up to [`Self::MIN_FRAME_SIZE`]
    pub fn to_bytes(&self, payload: &[u8]) -> Vec<u8> {
        let len = (Self::HEADER_SIZE + payload.len()).max(Self::MIN_FRAME_SIZE);
        let mut frame = BytesMut::with_capacity(len);

        frame.put_slice(self.destination.as_bytes());
        frame.put_slice(self.source.as_bytes());
        frame.put_u16(self.ethertype.into());
        frame.put_slice(payload);
        frame.resize(len, 0);

        frame.to_vec()
    }
}
