// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Stack counters bumped by the demuxer on the delivery path.

use crate::api::StackStatsSnap;
use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering;

/// A monotonically increasing counter, safe to bump from any thread.
#[derive(Debug, Default)]
pub struct StatCounter(AtomicU64);

impl StatCounter {
    #[inline]
    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn val(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct UdpStats {
    /// Datagrams which matched no endpoint.
    pub unknown_port_errors: StatCounter,
}

#[derive(Debug, Default)]
pub struct TcpStats {
    /// Segments dropped for a non-unicast source or destination.
    pub invalid_segments_received: StatCounter,
}

/// The counters a demuxer updates. The stack owns these and may share
/// them with its other layers.
#[derive(Debug, Default)]
pub struct StackStats {
    pub udp: UdpStats,
    pub tcp: TcpStats,
}

impl StackStats {
    pub fn snapshot(&self) -> StackStatsSnap {
        StackStatsSnap {
            udp_unknown_port_errors: self.udp.unknown_port_errors.val(),
            tcp_invalid_segments_received: self
                .tcp
                .invalid_segments_received
                .val(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_across_threads() {
        let stats = Arc::new(StackStats::default());
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        stats.udp.unknown_port_errors.incr();
                    }
                });
            }
        });
        stats.tcp.invalid_segments_received.incr();

        let snap = stats.snapshot();
        assert_eq!(snap.udp_unknown_port_errors, 4000);
        assert_eq!(snap.tcp_invalid_segments_received, 1);
    }
}
