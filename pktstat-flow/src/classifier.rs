//! Frame classification
//!
//! A frame is decoded into an ordered list of [`Layer`]s, outermost first.
//! The flow key is then built by walking that list: every layer overwrites
//! the protocol marker, network layers overwrite the addresses and transport
//! layers overwrite the ports. Tunnelled frames therefore end up keyed on
//! their innermost headers.

use std::fmt;
use std::net::IpAddr;

use pktstat_core::{Error, FlowKey, LayerType, Result};
use pktstat_packet::ethernet::{EtherType, EthernetHeader};
use pktstat_packet::icmp::{Icmpv4Header, Icmpv6Header};
use pktstat_packet::ip::{IpProtocol, Ipv4Header};
use pktstat_packet::ipv6::Ipv6Header;
use pktstat_packet::tcp::TcpHeader;
use pktstat_packet::udp::UdpHeader;

/// Upper bound on decoded layers per frame
pub const MAX_LAYERS: usize = 8;

/// Set of layer types the classifier is allowed to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSet(u8);

impl LayerSet {
    /// No layers at all
    pub const fn empty() -> Self {
        LayerSet(0)
    }

    /// Every layer type the classifier knows
    pub fn all() -> Self {
        LayerType::ALL.into_iter().collect()
    }

    pub fn with(self, layer: LayerType) -> Self {
        LayerSet(self.0 | (1 << layer.bit()))
    }

    pub fn without(self, layer: LayerType) -> Self {
        LayerSet(self.0 & !(1 << layer.bit()))
    }

    pub fn contains(&self, layer: LayerType) -> bool {
        self.0 & (1 << layer.bit()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl Default for LayerSet {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<LayerType> for LayerSet {
    fn from_iter<I: IntoIterator<Item = LayerType>>(iter: I) -> Self {
        iter.into_iter().fold(LayerSet::empty(), LayerSet::with)
    }
}

/// One decoded protocol header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layer {
    Ethernet(EthernetHeader),
    Ipv4(Ipv4Header),
    Ipv6(Ipv6Header),
    Tcp(TcpHeader),
    Udp(UdpHeader),
    Icmpv4(Icmpv4Header),
    Icmpv6(Icmpv6Header),
}

impl Layer {
    pub fn layer_type(&self) -> LayerType {
        match self {
            Layer::Ethernet(_) => LayerType::Ethernet,
            Layer::Ipv4(_) => LayerType::IPv4,
            Layer::Ipv6(_) => LayerType::IPv6,
            Layer::Tcp(_) => LayerType::TCP,
            Layer::Udp(_) => LayerType::UDP,
            Layer::Icmpv4(_) => LayerType::ICMPv4,
            Layer::Icmpv6(_) => LayerType::ICMPv6,
        }
    }
}

/// Why a frame produced no flow key
#[derive(Debug)]
pub enum Unclassifiable {
    /// A header that should have decoded was malformed or truncated
    Decode(Error),
    /// Decoding stopped before any IPv4 or IPv6 header
    NoNetworkLayer { last: LayerType },
    /// Not even the link layer was decoded
    Empty,
}

impl fmt::Display for Unclassifiable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unclassifiable::Decode(err) => write!(f, "{}", err),
            Unclassifiable::NoNetworkLayer { last } => {
                write!(f, "no network layer after {}", last)
            }
            Unclassifiable::Empty => write!(f, "no layer decoded"),
        }
    }
}

/// Outcome of classifying one frame
#[derive(Debug)]
pub enum Classification {
    Classified(FlowKey),
    Unclassifiable(Unclassifiable),
}

/// Stateless frame classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    layers: LayerSet,
}

impl Classifier {
    /// Classifier that decodes every supported layer
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifier restricted to the given layers
    pub fn with_layers(layers: LayerSet) -> Self {
        Self { layers }
    }

    pub fn layers(&self) -> LayerSet {
        self.layers
    }

    /// Decode as many layers as possible, outermost first
    ///
    /// Decoding stops without error at the first layer that is unsupported,
    /// not enabled, or after [`MAX_LAYERS`]. A header that is enabled but
    /// malformed fails the whole frame.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<Layer>> {
        let mut layers = Vec::with_capacity(4);
        let mut next = Some(LayerType::Ethernet);
        let mut rest = data;

        while let Some(layer_type) = next {
            if layers.len() >= MAX_LAYERS || !self.layers.contains(layer_type) {
                break;
            }

            let (layer, payload, following) = match layer_type {
                LayerType::Ethernet => {
                    let (header, payload) = EthernetHeader::parse(rest)?;
                    let following = match header.ethertype {
                        EtherType::IPv4 => Some(LayerType::IPv4),
                        EtherType::IPv6 => Some(LayerType::IPv6),
                        _ => None,
                    };
                    (Layer::Ethernet(header), payload, following)
                }
                LayerType::IPv4 => {
                    let (header, payload) = Ipv4Header::parse(rest)?;
                    let following = if header.is_fragment() {
                        None
                    } else {
                        next_for_protocol(header.protocol)
                    };
                    (Layer::Ipv4(header), payload, following)
                }
                LayerType::IPv6 => {
                    let (header, payload) = Ipv6Header::parse(rest)?;
                    let following = next_for_protocol(header.next_header);
                    (Layer::Ipv6(header), payload, following)
                }
                LayerType::TCP => {
                    let (header, payload) = TcpHeader::parse(rest)?;
                    (Layer::Tcp(header), payload, None)
                }
                LayerType::UDP => {
                    let (header, payload) = UdpHeader::parse(rest)?;
                    (Layer::Udp(header), payload, None)
                }
                LayerType::ICMPv4 => {
                    let (header, payload) = Icmpv4Header::parse(rest)?;
                    (Layer::Icmpv4(header), payload, None)
                }
                LayerType::ICMPv6 => {
                    let (header, payload) = Icmpv6Header::parse(rest)?;
                    (Layer::Icmpv6(header), payload, None)
                }
            };

            layers.push(layer);
            rest = payload;
            next = following;
        }

        Ok(layers)
    }

    /// Classify a raw frame
    pub fn classify(&self, data: &[u8]) -> Classification {
        let layers = match self.decode(data) {
            Ok(layers) => layers,
            Err(err) => return Classification::Unclassifiable(Unclassifiable::Decode(err)),
        };

        match flow_key(&layers) {
            Some(key) => Classification::Classified(key),
            None => match layers.last() {
                Some(layer) => Classification::Unclassifiable(Unclassifiable::NoNetworkLayer {
                    last: layer.layer_type(),
                }),
                None => Classification::Unclassifiable(Unclassifiable::Empty),
            },
        }
    }
}

fn next_for_protocol(protocol: IpProtocol) -> Option<LayerType> {
    match protocol {
        IpProtocol::TCP => Some(LayerType::TCP),
        IpProtocol::UDP => Some(LayerType::UDP),
        IpProtocol::ICMP => Some(LayerType::ICMPv4),
        IpProtocol::ICMPv6 => Some(LayerType::ICMPv6),
        IpProtocol::IPv4 => Some(LayerType::IPv4),
        IpProtocol::IPv6 => Some(LayerType::IPv6),
        _ => None,
    }
}

/// Build a flow key from decoded layers, last writer wins
///
/// Returns `None` unless both addresses and a protocol marker were set.
pub fn flow_key(layers: &[Layer]) -> Option<FlowKey> {
    let mut src_ip: Option<IpAddr> = None;
    let mut dst_ip: Option<IpAddr> = None;
    let mut proto = None;
    let mut src_port = 0;
    let mut dst_port = 0;

    for layer in layers {
        proto = Some(layer.layer_type());
        match layer {
            Layer::Ipv4(header) => {
                src_ip = Some(header.source.into());
                dst_ip = Some(header.destination.into());
            }
            Layer::Ipv6(header) => {
                src_ip = Some(header.source.into());
                dst_ip = Some(header.destination.into());
            }
            Layer::Tcp(header) => {
                src_port = header.source_port;
                dst_port = header.destination_port;
            }
            Layer::Udp(header) => {
                src_port = header.source_port;
                dst_port = header.destination_port;
            }
            Layer::Ethernet(_) | Layer::Icmpv4(_) | Layer::Icmpv6(_) => {}
        }
    }

    Some(FlowKey::new(src_ip?, dst_ip?, proto?, src_port, dst_port))
}
