//! Internet checksum (RFC 1071) helpers used when building frames

use std::net::Ipv6Addr;

/// Calculates the Internet Checksum as defined in RFC 1071.
///
/// The data is summed as big-endian 16-bit words, the carries are folded
/// back in, and the one's complement of the result is returned.
///
/// ```
/// use pktstat_packet::checksum::internet_checksum;
///
/// let checksum = internet_checksum(&[0x45, 0x00, 0x00, 0x3c]);
/// assert_ne!(checksum, 0);
/// ```
pub fn internet_checksum(data: &[u8]) -> u16 {
    !fold(accumulate(0, data))
}

/// Checksum of a TCP/UDP segment with the IPv4 pseudo-header
pub fn transport_checksum(src_ip: &[u8; 4], dst_ip: &[u8; 4], protocol: u8, data: &[u8]) -> u16 {
    let mut pseudo_header = [0u8; 12];
    pseudo_header[0..4].copy_from_slice(src_ip);
    pseudo_header[4..8].copy_from_slice(dst_ip);
    pseudo_header[9] = protocol;
    pseudo_header[10..12].copy_from_slice(&(data.len() as u16).to_be_bytes());

    let sum = accumulate(accumulate(0, &pseudo_header), data);
    !fold(sum)
}

/// Checksum of an upper-layer packet with the IPv6 pseudo-header (RFC 8200 §8.1)
pub fn transport_checksum_v6(src_ip: &Ipv6Addr, dst_ip: &Ipv6Addr, next_header: u8, data: &[u8]) -> u16 {
    let mut pseudo_header = [0u8; 40];
    pseudo_header[0..16].copy_from_slice(&src_ip.octets());
    pseudo_header[16..32].copy_from_slice(&dst_ip.octets());
    pseudo_header[32..36].copy_from_slice(&(data.len() as u32).to_be_bytes());
    pseudo_header[39] = next_header;

    let sum = accumulate(accumulate(0, &pseudo_header), data);
    !fold(sum)
}

/// Validates data that already contains its checksum field
pub fn validate_checksum(data: &[u8]) -> bool {
    let result = internet_checksum(data);
    result == 0 || result == 0xFFFF
}

fn accumulate(mut sum: u32, data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum = sum.wrapping_add(u16::from_be_bytes([chunk[0], chunk[1]]) as u32);
    }

    // Odd trailing byte is padded with zero
    if let Some(&byte) = chunks.remainder().first() {
        sum = sum.wrapping_add((byte as u32) << 8);
    }

    sum
}

fn fold(mut sum: u32) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internet_checksum_empty() {
        assert_eq!(internet_checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_internet_checksum_rfc1071_example() {
        // RFC 1071 section 3: the folded sum of these words is 0xddf2
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(internet_checksum(&data), !0xddf2u16);
    }

    #[test]
    fn test_internet_checksum_odd_length() {
        assert_eq!(internet_checksum(&[0x00, 0x01, 0x02]), !0x0201u16);
    }

    #[test]
    fn test_validate_checksum() {
        let data = [0x45, 0x00, 0x00, 0x3c];
        let checksum = internet_checksum(&data);

        let mut data_with_checksum = data.to_vec();
        data_with_checksum.extend_from_slice(&checksum.to_be_bytes());

        assert!(validate_checksum(&data_with_checksum));
    }

    #[test]
    fn test_transport_checksum_verifies() {
        let src_ip = [192, 168, 1, 1];
        let dst_ip = [192, 168, 1, 2];

        let mut segment = vec![0x00, 0x35, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00];
        let checksum = transport_checksum(&src_ip, &dst_ip, 17, &segment);
        segment[6..8].copy_from_slice(&checksum.to_be_bytes());

        // Summing again with the checksum in place gives zero
        assert_eq!(transport_checksum(&src_ip, &dst_ip, 17, &segment), 0);
    }

    #[test]
    fn test_transport_checksum_v6_verifies() {
        let src: Ipv6Addr = "fe80::1".parse().unwrap();
        let dst: Ipv6Addr = "fe80::2".parse().unwrap();

        let mut message = vec![128, 0, 0, 0, 0x12, 0x34, 0x00, 0x01];
        let checksum = transport_checksum_v6(&src, &dst, 58, &message);
        message[2..4].copy_from_slice(&checksum.to_be_bytes());

        assert_eq!(transport_checksum_v6(&src, &dst, 58, &message), 0);
    }
}
