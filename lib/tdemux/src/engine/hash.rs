// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Flow hashing for reuse group member selection.

use crate::api::EndpointId;
use core::hash::Hasher;

/// Bob Jenkins' one-at-a-time hash, 32 bits, with a seeded initial
/// state.
///
/// This is an incremental mixing hash: the result depends on the
/// order of the bytes written, not on how they were split across
/// calls to `write()`.
#[derive(Clone, Copy, Debug)]
pub struct Jenkins32 {
    state: u32,
}

impl Jenkins32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Finalize and return the 32-bit hash.
    pub fn sum32(&self) -> u32 {
        let mut hash = self.state;
        hash = hash.wrapping_add(hash << 3);
        hash ^= hash >> 11;
        hash = hash.wrapping_add(hash << 15);
        hash
    }
}

impl Hasher for Jenkins32 {
    fn write(&mut self, bytes: &[u8]) {
        let mut hash = self.state;
        for b in bytes {
            hash = hash.wrapping_add(u32::from(*b));
            hash = hash.wrapping_add(hash << 10);
            hash ^= hash >> 6;
        }
        self.state = hash;
    }

    fn finish(&self) -> u64 {
        u64::from(self.sum32())
    }
}

/// Scale `val` into the range `[0, n)`.
///
/// This is a multiply and shift in place of `val % n`; it spreads a
/// uniform 32-bit `val` uniformly without a division.
#[inline]
pub fn reciprocal_scale(val: u32, n: u32) -> u32 {
    ((u64::from(val) * u64::from(n)) >> 32) as u32
}

/// Hash the flow described by `id`, in the order: local port, remote
/// port, local address, remote address. Ports are written low byte
/// first; a wildcard address contributes no bytes.
pub fn flow_hash(id: &EndpointId, seed: u32) -> u32 {
    let lport = id.local_port.to_le_bytes();
    let rport = id.remote_port.to_le_bytes();
    let mut h = Jenkins32::new(seed);
    h.write(&[lport[0], lport[1], rport[0], rport[1]]);
    if let Some(addr) = id.local_addr {
        h.write(addr.as_bytes());
    }
    if let Some(addr) = id.remote_addr {
        h.write(addr.as_bytes());
    }
    h.sum32()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::IpAddr;

    #[test]
    fn one_at_a_time_vectors() {
        let mut h = Jenkins32::new(0);
        h.write(b"a");
        assert_eq!(h.sum32(), 0xca2e9442);

        let mut h = Jenkins32::new(0);
        h.write(b"The quick brown fox jumps over the lazy dog");
        assert_eq!(h.sum32(), 0x519e91f5);

        assert_eq!(Jenkins32::new(0).sum32(), 0);
    }

    #[test]
    fn seed_changes_hash() {
        let mut h = Jenkins32::new(7);
        h.write(b"a");
        assert_eq!(h.sum32(), 0x7003dfea);
    }

    #[test]
    fn incremental() {
        let mut whole = Jenkins32::new(42);
        whole.write(b"abcdef");
        let mut parts = Jenkins32::new(42);
        parts.write(b"ab");
        parts.write(b"");
        parts.write(b"cdef");
        assert_eq!(whole.sum32(), parts.sum32());
        assert_eq!(whole.finish(), u64::from(whole.sum32()));
    }

    #[test]
    fn scale() {
        assert_eq!(reciprocal_scale(0, 5), 0);
        assert_eq!(reciprocal_scale(u32::MAX, 4), 3);
        assert_eq!(reciprocal_scale(0x8000_0000, 4), 2);
        for n in 1..64 {
            assert!(reciprocal_scale(u32::MAX, n) < n);
        }
    }

    #[test]
    fn flow_hash_covers_ports_then_addresses() {
        let a: IpAddr = "10.0.0.5".parse().unwrap();
        let b: IpAddr = "10.0.0.9".parse().unwrap();
        let id = EndpointId::connected((a, 53), (b, 4000));

        let mut h = Jenkins32::new(9);
        h.write(&[53, 0, 0xa0, 0x0f]);
        h.write(&[10, 0, 0, 5]);
        h.write(&[10, 0, 0, 9]);
        assert_eq!(flow_hash(&id, 9), h.sum32());

        // Swapping the addresses is a different flow.
        let swapped = EndpointId::connected((b, 53), (a, 4000));
        assert_ne!(flow_hash(&id, 9), flow_hash(&swapped, 9));
    }
}
