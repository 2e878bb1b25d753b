// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Main application entry point for `l2swd`, the exception-path switching
//! daemon.
//!
//! The switch silicon forwards everything it can on its own; frames it
//! cannot handle (unknown destinations, unlearned sources) are punted to
//! this process, which learns source addresses, picks an output port, and
//! re-injects each frame into the hardware fast path.

use std::sync::atomic;
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Context;
use futures::stream::StreamExt;
use libc::c_int;
use signal_hook::consts::SIGHUP;
use signal_hook::consts::SIGINT;
use signal_hook::consts::SIGQUIT;
use signal_hook::consts::SIGTERM;
use signal_hook_tokio::Signals;
use slog::debug;
use slog::info;
use structopt::StructOpt;
use tokio::sync::watch;

use crate::config::Config;
use crate::fastpath::FastPathTx;
use crate::table::MacTable;

mod aging;
mod config;
mod dispatch;
mod dump;
mod fastpath;
mod fdb;
mod packet;
mod table;
mod types;

#[derive(Debug, Default, StructOpt)]
#[structopt(name = "l2swd", about = "exception-path switching daemon")]
pub(crate) struct Opt {
    #[structopt(
        long,
        about = "send log data to the named file rather than stdout"
    )]
    log_file: Option<String>,

    #[structopt(
        long,
        short = "l",
        about = "log format",
        help = "format logs for 'human' or 'json' consumption"
    )]
    log_format: Option<common::logging::LogFormat>,

    #[structopt(
        long,
        help = "TOML profile describing the attached switch"
    )]
    switch_config: Option<String>,

    #[structopt(
        long,
        help = "directory for the unix sockets shared with the dataplane"
    )]
    uds_path: Option<String>,

    #[structopt(long, help = "number of physical ports on the switch")]
    ports: Option<u8>,

    #[structopt(long, help = "maximum number of mac addresses to learn")]
    mac_table_size: Option<usize>,

    #[structopt(
        long,
        help = "lifetime of a learned mac address, in seconds"
    )]
    mac_ttl: Option<u64>,

    #[structopt(
        long,
        help = "seconds between scans for stale mac table entries"
    )]
    mac_aging_interval: Option<u64>,

    #[structopt(
        long,
        help = "seconds between per-port flood counter resets"
    )]
    counter_reset_interval: Option<u64>,

    #[structopt(
        long,
        help = "frames each port may flood between counter resets"
    )]
    flood_limit: Option<u64>,
}

/// The main context object for running all of `l2swd`.
pub struct Switch {
    pub log: slog::Logger,
    pub config: Mutex<Config>,
    /// The learned address table and per-port counters, shared between the
    /// packet path and the background aging tasks.
    pub table: Mutex<MacTable>,
    /// Outbound handle into the hardware fast path.
    pub tx: Arc<dyn FastPathTx>,
    // Set to false when the program should exit, usually when a signal is
    // received.
    running: atomic::AtomicBool,
}

impl Switch {
    pub fn new(
        log: slog::Logger,
        config: Config,
        tx: Arc<dyn FastPathTx>,
    ) -> Self {
        let table = MacTable::new(&log, config.ports, config.mac_table_size);
        Switch {
            log,
            config: Mutex::new(config),
            table: Mutex::new(table),
            tx,
            running: atomic::AtomicBool::new(true),
        }
    }

    /// Return whether the program should continue running.
    pub fn get_running(&self) -> bool {
        self.running.load(atomic::Ordering::Acquire)
    }

    /// Store whether the program should continue running.
    pub fn set_running(&self, val: bool) {
        self.running.store(val, atomic::Ordering::Release)
    }
}

async fn handle_signals(switch: &Switch, mut signals: Signals) {
    let log = switch.log.new(slog::o!("unit" => "signal_handler"));
    let handle = signals.handle();

    while let Some(signal) = signals.next().await {
        match signal {
            SIGTERM | SIGQUIT | SIGINT | SIGHUP => {
                info!(log, "received signal"; "sig" => signal);
                switch.set_running(false);
                handle.close();
                return;
            }
            _ => unreachable!(),
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    let config = config::build_config(&opt)?;

    let log =
        common::logging::init("l2swd", &config.log_file, config.log_format)?;
    info!(log, "l2swd config: {config:#?}");

    // Without the table or the packet feed there is nothing this daemon can
    // do, so either failure here takes the process down.
    let (tx, rx) = fastpath::attach(&log, &config)
        .context("failed to attach to the exception path")?;
    let switch = Arc::new(Switch::new(log, config, tx));

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let rx_task = tokio::task::spawn(fastpath::recv_loop(
        switch.clone(),
        rx,
        shutdown_rx.clone(),
    ));
    let aging_task = tokio::task::spawn(aging::mac_aging_loop(
        switch.clone(),
        shutdown_rx.clone(),
    ));
    let counter_task = tokio::task::spawn(aging::counter_reset_loop(
        switch.clone(),
        shutdown_rx,
    ));

    const SIGNALS: &[c_int] = &[SIGTERM, SIGQUIT, SIGINT, SIGHUP];
    let signals = Signals::new(SIGNALS).unwrap();
    handle_signals(&switch, signals).await;

    debug!(switch.log, "stopping background tasks");
    let _ = shutdown_tx.send(());
    rx_task.await?;
    aging_task.await?;
    counter_task.await?;

    info!(switch.log, "done");
    Ok(())
}
