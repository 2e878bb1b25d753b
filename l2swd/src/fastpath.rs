// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! The seam between this process and the switch dataplane.
//!
//! Exception frames travel as datagrams over a pair of unix sockets, each
//! datagram carrying the packet metadata header ahead of the raw frame.  The
//! dataplane (or an emulation of it) sends frames to the daemon's socket and
//! listens on its own for re-injected ones.  Inbound frames are fed to
//! `dispatch::process_packet`; outbound frames go through the `FastPathTx`
//! handle installed on the `Switch`.

use std::os::unix::net::UnixDatagram as StdUnixDatagram;
use std::sync::Arc;

use anyhow::Context;
use slog::debug;
use slog::error;
use slog::o;
use tokio::net::UnixDatagram;
use tokio::sync::watch;

use crate::config::Config;
use crate::dispatch;
use crate::packet::Packet;
use crate::packet::HEADER_LEN;
use crate::Switch;

// Largest frame we expect off the exception path: a jumbo frame plus the
// metadata header.
const MAX_DATAGRAM: usize = HEADER_LEN + 9216;

// Socket names within the configured rendezvous directory.
const DAEMON_SOCKET: &str = "l2swd.sock";
const DATAPLANE_SOCKET: &str = "dataplane.sock";

/// Outbound half of the dataplane seam: hand a fully addressed frame to the
/// hardware for transmission.  Fire-and-forget; a lost frame is the device
/// layer's problem, not ours.
pub trait FastPathTx: Send + Sync {
    fn transmit(&self, pkt: &Packet);
}

/// Transmitter backed by the dataplane's unix socket.
struct UdsFastPath {
    log: slog::Logger,
    socket: StdUnixDatagram,
    peer: String,
}

impl FastPathTx for UdsFastPath {
    fn transmit(&self, pkt: &Packet) {
        if let Err(e) = self.socket.send_to(&pkt.encode(), &self.peer) {
            debug!(self.log, "tx dropped: {e}"; "packet" => %pkt);
        }
    }
}

/// Bind the exception-path sockets in the configured rendezvous directory.
/// The daemon cannot operate without its packet feed, so callers treat
/// failure as fatal.
pub fn attach(
    log: &slog::Logger,
    config: &Config,
) -> anyhow::Result<(Arc<dyn FastPathTx>, UnixDatagram)> {
    let dir = &config.uds_path;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating socket directory {dir}"))?;

    let rx_path = format!("{dir}/{DAEMON_SOCKET}");
    // A previous instance may have left its socket behind.
    let _ = std::fs::remove_file(&rx_path);
    let rx = UnixDatagram::bind(&rx_path)
        .with_context(|| format!("binding {rx_path}"))?;

    let socket = StdUnixDatagram::unbound().context("creating tx socket")?;
    socket
        .set_nonblocking(true)
        .context("setting tx socket nonblocking")?;
    let tx = UdsFastPath {
        log: log.new(o!("unit" => "fastpath_tx")),
        socket,
        peer: format!("{dir}/{DATAPLANE_SOCKET}"),
    };

    Ok((Arc::new(tx), rx))
}

/// Receive exception frames from the dataplane and run each through the
/// forwarding path.
pub async fn recv_loop(
    switch: Arc<Switch>,
    rx: UnixDatagram,
    mut shutdown: watch::Receiver<()>,
) {
    let log = switch.log.new(o!("unit" => "fastpath_rx"));
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            r = rx.recv(&mut buf) => match r {
                Ok(n) => match Packet::parse(&buf[..n]) {
                    Some(pkt) => dispatch::process_packet(&switch, pkt),
                    None => {
                        debug!(log, "discarding short datagram ({n} bytes)")
                    }
                },
                Err(e) => {
                    error!(log, "receive error: {e}");
                    break;
                }
            },
        }
    }
    debug!(log, "fastpath receive loop exiting");
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::Mutex;

    use super::FastPathTx;
    use crate::packet::Packet;

    /// Captures transmitted frames for inspection.
    #[derive(Default)]
    pub struct RecordingFastPath {
        pub frames: Mutex<Vec<Packet>>,
    }

    impl FastPathTx for RecordingFastPath {
        fn transmit(&self, pkt: &Packet) {
            self.frames.lock().unwrap().push(pkt.clone());
        }
    }
}
