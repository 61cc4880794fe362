// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Print dumps in a human-friendly manner.

use crate::api::DeliveryKind;
use crate::api::DumpEndpointsResp;
use crate::api::IpAddr;
use crate::api::ProtocolDesc;
use crate::api::StackStatsSnap;
use std::io::Write;
use tabwriter::TabWriter;

/// Print a [`DumpEndpointsResp`].
pub fn print_endpoints(resp: &DumpEndpointsResp) -> std::io::Result<()> {
    print_endpoints_into(&mut std::io::stdout(), resp)
}

/// Print a [`DumpEndpointsResp`] into a given writer.
pub fn print_endpoints_into(
    writer: &mut impl Write,
    resp: &DumpEndpointsResp,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(
        t,
        "Endpoints {} ({})",
        resp.pair,
        delivery_str(resp.delivery)
    )?;
    write_hrb(&mut t)?;
    writeln!(t, "LOCAL\tREMOTE\tNIC\tREUSE\tMEMBERS")?;
    for b in &resp.bindings {
        let members: Vec<String> =
            b.members.iter().map(|m| m.to_string()).collect();
        writeln!(
            t,
            "{}\t{}\t{}\t{}\t{}",
            addr_port(b.id.local_addr, b.id.local_port),
            addr_port(b.id.remote_addr, b.id.remote_port),
            b.nic,
            if b.reuse { "yes" } else { "no" },
            members.join(","),
        )?;
    }
    write_hr(&mut t)?;
    writeln!(t, "Raw endpoints: {}", resp.raw_endpoints)?;
    t.flush()
}

/// Print the protocol pairs a demuxer serves into a given writer.
pub fn print_protocols_into(
    writer: &mut impl Write,
    protos: &[ProtocolDesc],
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(t, "NETWORK\tTRANSPORT\tDELIVERY")?;
    for p in protos {
        writeln!(
            t,
            "{}\t{}\t{}",
            p.pair.net,
            p.pair.transport,
            delivery_str(p.delivery)
        )?;
    }
    t.flush()
}

/// Print a [`StackStatsSnap`] into a given writer.
pub fn print_stats_into(
    writer: &mut impl Write,
    stats: &StackStatsSnap,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);
    writeln!(t, "COUNTER\tVALUE")?;
    writeln!(t, "udp.unknown_port_errors\t{}", stats.udp_unknown_port_errors)?;
    writeln!(
        t,
        "tcp.invalid_segments_received\t{}",
        stats.tcp_invalid_segments_received
    )?;
    t.flush()
}

fn delivery_str(kind: DeliveryKind) -> &'static str {
    match kind {
        DeliveryKind::Direct => "direct",
        DeliveryKind::Queued => "queued",
    }
}

fn addr_port(addr: Option<IpAddr>, port: u16) -> String {
    let port = if port == 0 { "*".to_string() } else { port.to_string() };
    match addr {
        Some(IpAddr::Ip4(ip)) => format!("{ip}:{port}"),
        Some(IpAddr::Ip6(ip)) => format!("[{ip}]:{port}"),
        None => format!("*:{port}"),
    }
}

/// Output a horizontal rule in bold to the given writer.
pub fn write_hrb(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:=<70}", "=")
}

/// Output a horizontal rule to the given writer.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<70}", "-")
}
