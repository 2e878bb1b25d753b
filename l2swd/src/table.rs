// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! The learned address table: a fixed-size arena of (mac, port) bindings
//! plus per-port counters.  This is the one piece of state shared between
//! the packet path and the background aging tasks, so it lives behind a
//! single mutex on the `Switch` and every operation here is a short, bounded
//! scan or write.
//!
//! The table never grows and never evicts: once every slot is valid, new
//! addresses simply go unlearned until aging frees a slot.  That bounds both
//! memory and the damage a mac-flooding host can do.

use chrono::prelude::*;
use slog::debug;
use slog::o;

use common::network::MacAddr;

/// One learned binding between a mac address and the port it was last seen
/// on.
#[derive(Clone, Debug)]
pub struct MacEntry {
    pub addr: MacAddr,
    pub port: u8,
    pub valid: bool,
    /// When this binding becomes stale.  Only meaningful while `valid`.
    pub expires_at: DateTime<Utc>,
}

/// Traffic and flood accounting for a single port.
#[derive(Clone, Debug, Default)]
pub struct PortStats {
    pub recv_pkts: u64,
    pub recv_bytes: u64,
    pub send_pkts: u64,
    pub send_bytes: u64,
    /// Frames flooded out this port since the last counter reset.
    pub flooded: u64,
}

pub struct MacTable {
    log: slog::Logger,
    slots: Vec<MacEntry>,
    ports: Vec<PortStats>,
}

impl MacTable {
    pub fn new(log: &slog::Logger, ports: u8, capacity: usize) -> Self {
        let log = log.new(o!("unit" => "mac_table"));
        debug!(log, "creating mac table";
            "ports" => ports,
            "capacity" => capacity);
        let empty = MacEntry {
            addr: MacAddr::new(0, 0, 0, 0, 0, 0),
            port: 0,
            valid: false,
            expires_at: Utc::now(),
        };
        MacTable {
            log,
            slots: vec![empty; capacity],
            ports: vec![PortStats::default(); ports as usize],
        }
    }

    /// Index of the valid slot holding `addr`, if any.  Linear scan: the
    /// table is small and bounded, so there is nothing to be gained from an
    /// index structure.
    pub fn find(&self, addr: MacAddr) -> Option<usize> {
        self.slots.iter().position(|e| e.valid && e.addr == addr)
    }

    /// Index of the first free slot, scanning from 0.  First-fit keeps slot
    /// assignment deterministic.
    pub fn find_free(&self) -> Option<usize> {
        self.slots.iter().position(|e| !e.valid)
    }

    /// Re-stamp an existing binding, moving it to `port` if the host has
    /// reappeared elsewhere.
    pub fn refresh(
        &mut self,
        idx: usize,
        port: u8,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) {
        let e = &mut self.slots[idx];
        if e.port != port {
            debug!(
                self.log,
                "{} moved from port {} to port {}", e.addr, e.port, port
            );
        }
        e.port = port;
        e.expires_at = now + ttl;
    }

    /// Fill a free slot with a newly observed binding.
    pub fn claim(
        &mut self,
        idx: usize,
        addr: MacAddr,
        port: u8,
        ttl: chrono::Duration,
        now: DateTime<Utc>,
    ) {
        let e = &mut self.slots[idx];
        e.addr = addr;
        e.port = port;
        e.valid = true;
        e.expires_at = now + ttl;
        debug!(self.log, "learned {addr} on port {port}"; "slot" => idx);
    }

    /// Invalidate a slot, freeing it for reuse.  Only the aging sweep
    /// removes entries; the learning path never does.
    pub fn expire(&mut self, idx: usize) {
        self.slots[idx].valid = false;
    }

    /// Output port for `addr`, excluding the port the frame arrived on.  A
    /// frame is never forwarded back out its ingress port, even if that is
    /// the only place the address has been seen.
    pub fn lookup(&self, ingress: u8, addr: MacAddr) -> Option<u8> {
        self.slots
            .iter()
            .find(|e| e.valid && e.port != ingress && e.addr == addr)
            .map(|e| e.port)
    }

    /// Invalidate every binding whose lifetime has passed, returning the
    /// number of entries aged out.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let mut aged = 0;
        for idx in 0..self.slots.len() {
            let e = &self.slots[idx];
            if e.valid && now > e.expires_at {
                debug!(self.log, "aging out {} on port {}", e.addr, e.port);
                self.expire(idx);
                aged += 1;
            }
        }
        aged
    }

    /// Charge one flooded frame against `port`'s budget for the current
    /// window.  Returns false, charging nothing, once the port has hit
    /// `ceiling`.
    pub fn admit_flood(&mut self, port: u8, ceiling: u64) -> bool {
        let stats = &mut self.ports[port as usize];
        if stats.flooded < ceiling {
            stats.flooded += 1;
            true
        } else {
            false
        }
    }

    /// Zero every port's flood counter, opening a new budget window.
    pub fn reset_flood_counters(&mut self) {
        for stats in self.ports.iter_mut() {
            stats.flooded = 0;
        }
    }

    pub fn note_recv(&mut self, port: u8, bytes: usize) {
        let stats = &mut self.ports[port as usize];
        stats.recv_pkts += 1;
        stats.recv_bytes += bytes as u64;
    }

    pub fn note_sent(&mut self, port: u8, bytes: usize) {
        let stats = &mut self.ports[port as usize];
        stats.send_pkts += 1;
        stats.send_bytes += bytes as u64;
    }

    /// All currently valid bindings, in slot order.
    pub fn entries(&self) -> impl Iterator<Item = &MacEntry> {
        self.slots.iter().filter(|e| e.valid)
    }

    pub fn port_count(&self) -> u8 {
        self.ports.len() as u8
    }

    pub fn port_stats(&self, port: u8) -> &PortStats {
        &self.ports[port as usize]
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::MacTable;
    use chrono::prelude::*;
    use common::network::MacAddr;
    use slog::Drain;

    fn test_log() -> slog::Logger {
        let dec =
            slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
        let drain = slog_term::FullFormat::new(dec).build().fuse();
        slog::Logger::root(drain, slog::o!())
    }

    fn ttl() -> chrono::Duration {
        chrono::Duration::seconds(10)
    }

    #[test]
    fn test_claim_and_find() {
        let mut t = MacTable::new(&test_log(), 4, 8);
        let a = MacAddr::random();
        assert_eq!(t.find(a), None);

        let idx = t.find_free().unwrap();
        assert_eq!(idx, 0);
        t.claim(idx, a, 1, ttl(), Utc::now());
        assert_eq!(t.find(a), Some(0));
        assert_eq!(t.entries().count(), 1);
    }

    #[test]
    fn test_find_free_is_first_fit() {
        let mut t = MacTable::new(&test_log(), 4, 8);
        let now = Utc::now();
        for i in 0..3 {
            t.claim(i, MacAddr::random(), 0, ttl(), now);
        }
        assert_eq!(t.find_free(), Some(3));

        // Freeing an earlier slot makes it the next one handed out.
        t.expire(1);
        assert_eq!(t.find_free(), Some(1));
    }

    #[test]
    fn test_refresh_moves_port_and_advances_expiry() {
        let mut t = MacTable::new(&test_log(), 4, 8);
        let a = MacAddr::random();
        let t0 = Utc::now();
        t.claim(0, a, 1, ttl(), t0);
        let first_expiry = t.entries().next().unwrap().expires_at;

        t.refresh(0, 2, ttl(), t0 + chrono::Duration::seconds(3));
        let e = t.entries().next().unwrap();
        assert_eq!(e.port, 2);
        assert!(e.expires_at > first_expiry);
        assert_eq!(t.entries().count(), 1);
    }

    #[test]
    fn test_lookup_split_horizon() {
        let mut t = MacTable::new(&test_log(), 4, 8);
        let a = MacAddr::random();
        t.claim(0, a, 1, ttl(), Utc::now());

        assert_eq!(t.lookup(0, a), Some(1));
        // Never forward a frame back out the port it arrived on.
        assert_eq!(t.lookup(1, a), None);
    }

    #[test]
    fn test_sweep() {
        let mut t = MacTable::new(&test_log(), 4, 8);
        let t0 = Utc::now();
        let a = MacAddr::random();
        let b = MacAddr::random();
        t.claim(0, a, 0, chrono::Duration::seconds(10), t0);
        t.claim(1, b, 1, chrono::Duration::seconds(30), t0);

        // Nothing is stale at exactly the expiry instant.
        assert_eq!(t.sweep(t0 + chrono::Duration::seconds(10)), 0);

        assert_eq!(t.sweep(t0 + chrono::Duration::seconds(11)), 1);
        assert_eq!(t.find(a), None);
        assert_eq!(t.find(b), Some(1));

        assert_eq!(t.sweep(t0 + chrono::Duration::seconds(31)), 1);
        assert_eq!(t.entries().count(), 0);
    }

    #[test]
    fn test_flood_budget() {
        let mut t = MacTable::new(&test_log(), 4, 8);
        assert!(t.admit_flood(2, 2));
        assert!(t.admit_flood(2, 2));
        assert!(!t.admit_flood(2, 2));
        // The refusal charged nothing.
        assert_eq!(t.port_stats(2).flooded, 2);
        // Other ports have their own budgets.
        assert!(t.admit_flood(3, 2));

        t.reset_flood_counters();
        assert_eq!(t.port_stats(2).flooded, 0);
        assert!(t.admit_flood(2, 2));
    }

    #[test]
    fn test_full_table_has_no_free_slot() {
        let mut t = MacTable::new(&test_log(), 4, 4);
        let now = Utc::now();
        for i in 0..t.capacity() {
            let idx = t.find_free().unwrap();
            assert_eq!(idx, i);
            t.claim(idx, MacAddr::random(), 0, ttl(), now);
        }
        assert_eq!(t.find_free(), None);
        assert_eq!(t.entries().count(), 4);
    }
}
