// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! The per-packet exception path: account for the frame, learn its source,
//! resolve its destination, and hand it back to the hardware.
//!
//! This path never blocks and never fails: every degenerate case (unknown
//! ingress port, runt frame, unknown destination, exhausted flood budget) is
//! resolved inline by dropping or flooding, so it composes with whatever
//! concurrency model the I/O layer uses to deliver frames.

use slog::debug;

use crate::fdb;
use crate::packet::Packet;
use crate::packet::PKT_DST_HARDWARE;
use crate::packet::PKT_SRC_SOFTWARE;
use crate::Switch;

/// Handle one frame delivered by the dataplane.
pub fn process_packet(switch: &Switch, pkt: Packet) {
    if !switch.get_running() {
        return;
    }

    let ports = switch.config.lock().unwrap().ports;
    if pkt.ingress >= ports {
        debug!(switch.log, "dropping frame from unknown port {}", pkt.ingress);
        return;
    }
    switch.table.lock().unwrap().note_recv(pkt.ingress, pkt.len());

    if !pkt.has_ether_addrs() {
        debug!(switch.log, "dropping runt frame on port {}", pkt.ingress);
        return;
    }
    debug!(switch.log, "{pkt}");

    fdb::learn_source(switch, pkt.ingress, pkt.smac());

    match fdb::resolve_dest(switch, pkt.ingress, pkt.dmac()) {
        Some(port) => send(switch, pkt, port),
        None => flood(switch, pkt),
    }
}

/// Replicate a frame to every port except its ingress, within each port's
/// flood budget for the current window.  A port over budget is skipped and
/// the frame is simply lost there; bounding the fan-out is the point.
pub fn flood(switch: &Switch, pkt: Packet) {
    let (ports, ceiling) = {
        let config = switch.config.lock().unwrap();
        (config.ports, config.flood_limit)
    };

    for port in 0..ports {
        if port == pkt.ingress {
            continue;
        }
        if !switch.table.lock().unwrap().admit_flood(port, ceiling) {
            debug!(switch.log, "flood budget exhausted on port {port}");
            continue;
        }
        send(switch, pkt.clone(), port);
    }
}

// Stamp the frame with its egress port and the hardware metadata tags, and
// hand it off for transmission.
fn send(switch: &Switch, mut pkt: Packet, port: u8) {
    pkt.egress = Some(port);
    pkt.pktsrc = PKT_SRC_SOFTWARE;
    pkt.pktdst = PKT_DST_HARDWARE;
    switch.table.lock().unwrap().note_sent(port, pkt.len());
    switch.tx.transmit(&pkt);
}
