// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The packet buffer handed through the demuxer, and the route it
//! arrived on.

use crate::api::IpAddr;
use crate::api::NetworkProtocol;
use crate::api::NicId;
use core::fmt;

/// A single-owner packet buffer.
///
/// Delivery transfers ownership to exactly one recipient. There is no
/// `Clone`; each extra recipient gets a [`PacketBuffer::duplicate()`].
pub struct PacketBuffer {
    data: Vec<u8>,
}

impl PacketBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Allocate a new buffer holding a copy of `bytes`.
    pub fn copy(bytes: impl AsRef<[u8]>) -> Self {
        Self { data: bytes.as_ref().to_vec() }
    }

    /// Make an independent copy of this buffer for another recipient.
    pub fn duplicate(&self) -> Self {
        Self { data: self.data.clone() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PacketBuffer").field("len", &self.data.len()).finish()
    }
}

/// The route an inbound packet arrived on, as resolved by the network
/// layer.
///
/// The addresses are those of the packet's network header: `local`
/// is the destination and `remote` the source.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Route {
    pub net_proto: NetworkProtocol,
    pub nic: NicId,
    pub local_addr: IpAddr,
    pub remote_addr: IpAddr,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn duplicate_is_independent() {
        let mut orig = PacketBuffer::copy(b"datagram");
        let dup = orig.duplicate();
        orig.as_bytes_mut()[0] = b'D';
        assert_eq!(dup.as_bytes(), b"datagram");
        assert_eq!(orig.as_bytes(), b"Datagram");
        assert_ne!(orig.as_bytes().as_ptr(), dup.as_bytes().as_ptr());
    }
}
