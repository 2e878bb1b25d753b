// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Source-address learning and destination resolution over the shared
//! address table.

use chrono::prelude::*;
use slog::debug;

use crate::Switch;
use common::network::MacAddr;

/// Record or refresh the binding for a frame's source address.
///
/// Learning is best-effort: when the table is full the address simply stays
/// unlearned, its traffic continues to be flooded, and the packet path moves
/// on.  The common case for steady-state traffic is a cheap refresh of an
/// existing slot, which also covers a host reappearing on a different port.
pub fn learn_source(switch: &Switch, port: u8, smac: MacAddr) {
    let ttl = switch.config.lock().unwrap().mac_ttl();
    let now = Utc::now();

    let mut table = switch.table.lock().unwrap();
    match table.find(smac) {
        Some(idx) => table.refresh(idx, port, ttl, now),
        None => match table.find_free() {
            Some(idx) => table.claim(idx, smac, port, ttl, now),
            None => debug!(
                switch.log,
                "mac table full ({} slots), not learning {smac}",
                table.capacity()
            ),
        },
    }
}

/// Egress port for `dmac`, if it has been learned somewhere other than
/// `ingress`.  A miss is the normal trigger for flooding, not a failure.
pub fn resolve_dest(switch: &Switch, ingress: u8, dmac: MacAddr) -> Option<u8> {
    switch.table.lock().unwrap().lookup(ingress, dmac)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use slog::Drain;

    use super::learn_source;
    use super::resolve_dest;
    use crate::config::Config;
    use crate::fastpath::test::RecordingFastPath;
    use crate::Switch;
    use common::network::MacAddr;

    fn test_log() -> slog::Logger {
        let dec =
            slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
        let drain = slog_term::FullFormat::new(dec).build().fuse();
        slog::Logger::root(drain, slog::o!())
    }

    fn test_switch(config: Config) -> Switch {
        Switch::new(test_log(), config, Arc::new(RecordingFastPath::default()))
    }

    #[test]
    fn test_one_entry_per_address() {
        let switch = test_switch(Config::default());
        let a = MacAddr::random();
        for port in [1, 2, 1, 3, 1] {
            learn_source(&switch, port, a);
        }
        let table = switch.table.lock().unwrap();
        assert_eq!(table.entries().filter(|e| e.addr == a).count(), 1);
    }

    #[test]
    fn test_relearning_refreshes_in_place() {
        let switch = test_switch(Config::default());
        let a = MacAddr::random();

        learn_source(&switch, 1, a);
        let first_expiry = {
            let table = switch.table.lock().unwrap();
            let expiry = table.entries().next().unwrap().expires_at;
            expiry
        };

        learn_source(&switch, 1, a);
        let table = switch.table.lock().unwrap();
        assert_eq!(table.entries().count(), 1);
        let e = table.entries().next().unwrap();
        assert_eq!(e.port, 1);
        assert!(e.expires_at >= first_expiry);
    }

    #[test]
    fn test_host_movement_converges() {
        let switch = test_switch(Config::default());
        let a = MacAddr::random();

        learn_source(&switch, 1, a);
        learn_source(&switch, 2, a);

        let table = switch.table.lock().unwrap();
        assert_eq!(table.entries().count(), 1);
        assert_eq!(table.entries().next().unwrap().port, 2);
        drop(table);
        assert_eq!(resolve_dest(&switch, 0, a), Some(2));
    }

    #[test]
    fn test_split_horizon() {
        let switch = test_switch(Config::default());
        let a = MacAddr::random();
        learn_source(&switch, 1, a);

        assert_eq!(resolve_dest(&switch, 0, a), Some(1));
        assert_eq!(resolve_dest(&switch, 1, a), None);
    }

    #[test]
    fn test_unknown_destination_misses() {
        let switch = test_switch(Config::default());
        assert_eq!(resolve_dest(&switch, 0, MacAddr::random()), None);
    }

    #[test]
    fn test_full_table_drops_new_learners() {
        let config = Config {
            mac_table_size: 4,
            ..Default::default()
        };
        let switch = test_switch(config);

        let residents: Vec<MacAddr> =
            (0..4).map(|_| MacAddr::random()).collect();
        for mac in &residents {
            learn_source(&switch, 0, *mac);
        }

        // One more distinct address: silently ignored, residents untouched.
        let latecomer = MacAddr::random();
        learn_source(&switch, 1, latecomer);

        let table = switch.table.lock().unwrap();
        assert_eq!(table.entries().count(), 4);
        assert_eq!(table.find(latecomer), None);
        drop(table);
        for mac in &residents {
            assert_eq!(resolve_dest(&switch, 1, *mac), Some(0));
        }

        // A full table still refreshes what it already knows.
        learn_source(&switch, 2, residents[0]);
        assert_eq!(resolve_dest(&switch, 1, residents[0]), Some(2));
    }
}
