// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Network and transport protocol numbers.

use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

pub const ETHER_TYPE_IPV4: u16 = 0x0800;
pub const ETHER_TYPE_ARP: u16 = 0x0806;
pub const ETHER_TYPE_IPV6: u16 = 0x86DD;

/// A network-layer protocol, identified by its EtherType.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum NetworkProtocol {
    Ipv4,
    Ipv6,
    Arp,
    Unknown(u16),
}

impl Display for NetworkProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Ipv4 => write!(f, "IPv4"),
            Self::Ipv6 => write!(f, "IPv6"),
            Self::Arp => write!(f, "ARP"),
            Self::Unknown(val) => write!(f, "0x{val:04X}"),
        }
    }
}

impl From<u16> for NetworkProtocol {
    fn from(val: u16) -> Self {
        match val {
            ETHER_TYPE_IPV4 => Self::Ipv4,
            ETHER_TYPE_IPV6 => Self::Ipv6,
            ETHER_TYPE_ARP => Self::Arp,
            _ => Self::Unknown(val),
        }
    }
}

impl From<NetworkProtocol> for u16 {
    fn from(proto: NetworkProtocol) -> u16 {
        match proto {
            NetworkProtocol::Ipv4 => ETHER_TYPE_IPV4,
            NetworkProtocol::Ipv6 => ETHER_TYPE_IPV6,
            NetworkProtocol::Arp => ETHER_TYPE_ARP,
            NetworkProtocol::Unknown(val) => val,
        }
    }
}

impl From<smoltcp::wire::EthernetProtocol> for NetworkProtocol {
    fn from(proto: smoltcp::wire::EthernetProtocol) -> Self {
        Self::from(u16::from(proto))
    }
}

impl From<NetworkProtocol> for smoltcp::wire::EthernetProtocol {
    fn from(proto: NetworkProtocol) -> Self {
        Self::from(u16::from(proto))
    }
}

pub const PROTO_ICMP: u8 = 0x1;
pub const PROTO_TCP: u8 = 0x6;
pub const PROTO_UDP: u8 = 0x11;
pub const PROTO_ICMPV6: u8 = 0x3A;

/// A transport-layer protocol, identified by its IP protocol number.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum TransportProtocol {
    ICMP,
    TCP,
    UDP,
    ICMPv6,
    Unknown(u8),
}

impl TransportProtocol {
    /// Connectionless datagram protocols whose broadcast and
    /// multicast traffic fans out to every interested listener.
    pub const fn is_udp_like(&self) -> bool {
        matches!(self, Self::UDP)
    }

    /// Connection-oriented protocols which are strictly point to
    /// point and never accept non-unicast traffic.
    pub const fn is_tcp_like(&self) -> bool {
        matches!(self, Self::TCP)
    }
}

impl Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ICMP => write!(f, "ICMP"),
            Self::TCP => write!(f, "TCP"),
            Self::UDP => write!(f, "UDP"),
            Self::ICMPv6 => write!(f, "ICMPv6"),
            Self::Unknown(val) => write!(f, "Unknown({val})"),
        }
    }
}

impl From<u8> for TransportProtocol {
    fn from(proto: u8) -> Self {
        match proto {
            PROTO_ICMP => Self::ICMP,
            PROTO_TCP => Self::TCP,
            PROTO_UDP => Self::UDP,
            PROTO_ICMPV6 => Self::ICMPv6,
            _ => Self::Unknown(proto),
        }
    }
}

impl From<TransportProtocol> for u8 {
    fn from(proto: TransportProtocol) -> u8 {
        match proto {
            TransportProtocol::ICMP => PROTO_ICMP,
            TransportProtocol::TCP => PROTO_TCP,
            TransportProtocol::UDP => PROTO_UDP,
            TransportProtocol::ICMPv6 => PROTO_ICMPV6,
            TransportProtocol::Unknown(v) => v,
        }
    }
}

impl From<smoltcp::wire::IpProtocol> for TransportProtocol {
    fn from(proto: smoltcp::wire::IpProtocol) -> Self {
        Self::from(u8::from(proto))
    }
}

impl From<TransportProtocol> for smoltcp::wire::IpProtocol {
    fn from(proto: TransportProtocol) -> smoltcp::wire::IpProtocol {
        smoltcp::wire::IpProtocol::from(u8::from(proto))
    }
}

/// The key selecting one isolated endpoint registry.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct ProtocolPair {
    pub net: NetworkProtocol,
    pub transport: TransportProtocol,
}

impl ProtocolPair {
    pub const fn new(net: NetworkProtocol, transport: TransportProtocol) -> Self {
        Self { net, transport }
    }
}

impl Display for ProtocolPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.net, self.transport)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn proto_numbers() {
        assert_eq!(TransportProtocol::from(17), TransportProtocol::UDP);
        assert_eq!(u8::from(TransportProtocol::TCP), 6);
        assert_eq!(TransportProtocol::from(132), TransportProtocol::Unknown(132));
        assert_eq!(NetworkProtocol::from(0x86DD), NetworkProtocol::Ipv6);
        assert_eq!(u16::from(NetworkProtocol::Ipv4), 0x0800);
    }

    #[test]
    fn proto_classes() {
        assert!(TransportProtocol::UDP.is_udp_like());
        assert!(!TransportProtocol::UDP.is_tcp_like());
        assert!(TransportProtocol::TCP.is_tcp_like());
        assert!(!TransportProtocol::ICMP.is_udp_like());
    }

    #[test]
    fn pair_display() {
        let pair =
            ProtocolPair::new(NetworkProtocol::Ipv4, TransportProtocol::UDP);
        assert_eq!(format!("{pair}"), "IPv4/UDP");
    }
}
