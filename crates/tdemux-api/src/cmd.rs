// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use super::endpoint::EndpointId;
use super::endpoint::NicId;
use super::proto::NetworkProtocol;
use super::proto::ProtocolPair;
use super::proto::TransportProtocol;
use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;
use serde::Deserialize;
use serde::Serialize;

/// Errors surfaced by the demuxer to the network stack.
///
/// None of these are retried internally.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, thiserror::Error)]
pub enum DemuxError {
    /// No registry exists for this protocol pair.
    #[error("unknown protocol pair {net}/{transport}")]
    UnknownProtocol { net: NetworkProtocol, transport: TransportProtocol },

    /// The binding is held by another endpoint and at least one of
    /// the two did not consent to port reuse.
    #[error("port in use")]
    PortInUse,

    /// Raw endpoints are not supported for this protocol pair.
    #[error("raw endpoints not supported for {net}/{transport}")]
    NotSupported { net: NetworkProtocol, transport: TransportProtocol },

    #[error("bad demuxer config: {0}")]
    BadConfig(String),
}

/// The set of protocols a demuxer serves.
///
/// One registry is created for every pair in the cross product of
/// `network_protocols` and `transport_protocols`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DemuxCfg {
    pub network_protocols: Vec<NetworkProtocol>,
    pub transport_protocols: Vec<TransportProtocol>,
}

impl DemuxCfg {
    pub fn validate(&self) -> Result<(), DemuxError> {
        if self.network_protocols.is_empty() {
            return Err(DemuxError::BadConfig(String::from(
                "no network protocols",
            )));
        }

        if self.transport_protocols.is_empty() {
            return Err(DemuxError::BadConfig(String::from(
                "no transport protocols",
            )));
        }

        let mut nets = BTreeSet::new();
        for net in &self.network_protocols {
            if !nets.insert(net) {
                return Err(DemuxError::BadConfig(format!(
                    "duplicate network protocol: {net}"
                )));
            }
        }

        let mut transports = BTreeSet::new();
        for transport in &self.transport_protocols {
            if !transports.insert(transport) {
                return Err(DemuxError::BadConfig(format!(
                    "duplicate transport protocol: {transport}"
                )));
            }
        }

        Ok(())
    }

    /// Every protocol pair this config describes.
    pub fn pairs(&self) -> Vec<ProtocolPair> {
        let mut pairs = Vec::with_capacity(
            self.network_protocols.len() * self.transport_protocols.len(),
        );
        for net in &self.network_protocols {
            for transport in &self.transport_protocols {
                pairs.push(ProtocolPair::new(*net, *transport));
            }
        }
        pairs
    }
}

impl Default for DemuxCfg {
    /// A dual-stack TCP/UDP/ICMP configuration.
    fn default() -> Self {
        Self {
            network_protocols: vec![
                NetworkProtocol::Ipv4,
                NetworkProtocol::Ipv6,
            ],
            transport_protocols: vec![
                TransportProtocol::TCP,
                TransportProtocol::UDP,
                TransportProtocol::ICMP,
                TransportProtocol::ICMPv6,
            ],
        }
    }
}

/// How packets reach the endpoints of a protocol pair.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum DeliveryKind {
    Direct,
    Queued,
}

/// A protocol pair served by a demuxer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProtocolDesc {
    pub pair: ProtocolPair,
    pub delivery: DeliveryKind,
}

/// Dump of one `(EndpointId, NIC)` binding.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BindingDump {
    pub id: EndpointId,
    pub nic: NicId,
    pub reuse: bool,
    /// The unique ids of the members, in selection order.
    pub members: Vec<u64>,
}

/// Dump of every registration for one protocol pair.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DumpEndpointsResp {
    pub pair: ProtocolPair,
    pub delivery: DeliveryKind,
    pub bindings: Vec<BindingDump>,
    pub raw_endpoints: u64,
}

/// A point-in-time copy of the stack counters the demuxer updates.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct StackStatsSnap {
    pub udp_unknown_port_errors: u64,
    pub tcp_invalid_segments_received: u64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cfg_pairs() {
        let cfg = DemuxCfg {
            network_protocols: vec![NetworkProtocol::Ipv4],
            transport_protocols: vec![
                TransportProtocol::TCP,
                TransportProtocol::UDP,
            ],
        };
        assert!(cfg.validate().is_ok());
        assert_eq!(
            cfg.pairs(),
            vec![
                ProtocolPair::new(NetworkProtocol::Ipv4, TransportProtocol::TCP),
                ProtocolPair::new(NetworkProtocol::Ipv4, TransportProtocol::UDP),
            ]
        );
    }

    #[test]
    fn cfg_rejects_empty_and_dups() {
        let mut cfg = DemuxCfg::default();
        cfg.transport_protocols.clear();
        assert!(matches!(cfg.validate(), Err(DemuxError::BadConfig(_))));

        let mut cfg = DemuxCfg::default();
        cfg.network_protocols.push(NetworkProtocol::Ipv4);
        assert!(matches!(cfg.validate(), Err(DemuxError::BadConfig(_))));
    }

    #[test]
    fn cfg_from_toml() {
        let cfg: DemuxCfg = toml::from_str(
            r#"
            network_protocols = ["Ipv4", "Ipv6"]
            transport_protocols = ["TCP", "UDP", { Unknown = 132 }]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.network_protocols.len(), 2);
        assert_eq!(
            cfg.transport_protocols[2],
            TransportProtocol::Unknown(132)
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn error_round_trips_as_json() {
        let err = DemuxError::UnknownProtocol {
            net: NetworkProtocol::Arp,
            transport: TransportProtocol::UDP,
        };
        let ser = serde_json::to_string(&err).unwrap();
        let de: DemuxError = serde_json::from_str(&ser).unwrap();
        assert_eq!(de, err);
        assert_eq!(format!("{err}"), "unknown protocol pair ARP/UDP");
    }
}
