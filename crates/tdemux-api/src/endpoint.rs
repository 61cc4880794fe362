// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use super::ip::IpAddr;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// A network interface identifier.
///
/// [`NicId::ANY`] (zero) binds to every interface.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct NicId(pub u32);

impl NicId {
    pub const ANY: Self = Self(0);

    pub const fn is_any(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for NicId {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

impl Display for NicId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_any() { write!(f, "any") } else { write!(f, "{}", self.0) }
    }
}

/// The identity of a transport endpoint binding.
///
/// On registration an address of `None` or a port of zero is a
/// wildcard. The ids the network layer builds from packet headers
/// are fully specified.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct EndpointId {
    pub local_port: u16,
    pub local_addr: Option<IpAddr>,
    pub remote_port: u16,
    pub remote_addr: Option<IpAddr>,
}

impl EndpointId {
    /// A listening binding on `port`, any local address.
    pub const fn listen(port: u16) -> Self {
        Self {
            local_port: port,
            local_addr: None,
            remote_port: 0,
            remote_addr: None,
        }
    }

    /// A listening binding on `addr:port`.
    pub const fn bound(addr: IpAddr, port: u16) -> Self {
        Self {
            local_port: port,
            local_addr: Some(addr),
            remote_port: 0,
            remote_addr: None,
        }
    }

    /// A fully specified (connected) id.
    pub const fn connected(
        local: (IpAddr, u16),
        remote: (IpAddr, u16),
    ) -> Self {
        Self {
            local_port: local.1,
            local_addr: Some(local.0),
            remote_port: remote.1,
            remote_addr: Some(remote.0),
        }
    }

    /// This id with the local address wildcarded.
    pub const fn without_local_addr(mut self) -> Self {
        self.local_addr = None;
        self
    }

    /// This id with the remote address and port wildcarded.
    pub const fn without_remote(mut self) -> Self {
        self.remote_addr = None;
        self.remote_port = 0;
        self
    }
}

impl Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.local_addr {
            Some(addr) => write!(f, "{addr}:{}", self.local_port)?,
            None => write!(f, "*:{}", self.local_port)?,
        }

        match self.remote_addr {
            Some(addr) => write!(f, " <- {addr}:{}", self.remote_port),
            None if self.remote_port != 0 => {
                write!(f, " <- *:{}", self.remote_port)
            }
            None => Ok(()),
        }
    }
}

/// The kind of control message (e.g., from ICMP) being delivered to
/// an endpoint.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ControlType {
    PacketTooBig,
    PortUnreachable,
    Unknown,
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn wildcarding() {
        let local: IpAddr = "10.0.0.5".parse().unwrap();
        let remote: IpAddr = "10.0.0.9".parse().unwrap();
        let id = EndpointId::connected((local, 53), (remote, 4000));

        let no_local = id.without_local_addr();
        assert_eq!(no_local.local_addr, None);
        assert_eq!(no_local.remote_addr, Some(remote));

        assert_eq!(id.without_remote(), EndpointId::bound(local, 53));
        assert_eq!(
            id.without_remote().without_local_addr(),
            EndpointId::listen(53)
        );
    }

    #[test]
    fn display() {
        let local: IpAddr = "10.0.0.5".parse().unwrap();
        assert_eq!(EndpointId::listen(80).to_string(), "*:80");
        assert_eq!(EndpointId::bound(local, 80).to_string(), "10.0.0.5:80");
        assert_eq!(NicId::ANY.to_string(), "any");
        assert_eq!(NicId(3).to_string(), "3");
    }
}
