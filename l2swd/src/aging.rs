// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Background maintenance: periodic aging of stale address table entries,
//! and periodic reset of the per-port flood budgets.  The two loops are
//! independent; the table is the only thing they share with each other and
//! with the packet path.

use std::sync::Arc;

use chrono::prelude::*;
use slog::debug;
use slog::error;
use slog::info;
use slog::o;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::dump;
use crate::Switch;

/// Periodically invalidate bindings whose lifetime has passed, logging a
/// table snapshot after each pass.
pub async fn mac_aging_loop(
    switch: Arc<Switch>,
    mut shutdown: watch::Receiver<()>,
) {
    let log = switch.log.new(o!("task" => "mac_aging"));
    info!(log, "starting mac aging loop");
    loop {
        let interval = switch.config.lock().unwrap().mac_aging_interval();
        tokio::select! {
            _ = sleep(interval) => {}
            _ = shutdown.changed() => break,
        }

        let aged = switch.table.lock().unwrap().sweep(Utc::now());
        if aged > 0 {
            debug!(log, "aged out {aged} stale mac entries");
        }

        let snapshot = {
            let table = switch.table.lock().unwrap();
            dump::render(&table)
        };
        match snapshot {
            Ok(text) => debug!(log, "mac table:\n{text}"),
            Err(e) => error!(log, "failed to render mac table: {e:?}"),
        }
    }
    debug!(log, "mac aging loop exiting");
}

/// Periodically zero the per-port flood counters, opening a new flood
/// budget window on every port at once.
pub async fn counter_reset_loop(
    switch: Arc<Switch>,
    mut shutdown: watch::Receiver<()>,
) {
    let log = switch.log.new(o!("task" => "counter_reset"));
    info!(log, "starting flood counter reset loop");
    loop {
        let interval = switch.config.lock().unwrap().counter_reset_interval();
        tokio::select! {
            _ = sleep(interval) => {}
            _ = shutdown.changed() => break,
        }

        let mut table = switch.table.lock().unwrap();
        for port in 0..table.port_count() {
            let stats = table.port_stats(port);
            debug!(
                log,
                "port {port} window: {} flooded, rx {}/{}, tx {}/{}",
                stats.flooded,
                stats.recv_pkts,
                stats.recv_bytes,
                stats.send_pkts,
                stats.send_bytes
            );
        }
        table.reset_flood_counters();
    }
    debug!(log, "flood counter reset loop exiting");
}
