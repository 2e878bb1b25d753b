// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Human-readable snapshot of the address table, for operational visibility
//! only.  The table is rendered one column per port, one learned address per
//! row, with `.` marking empty cells.

use std::io::Write;

use tabwriter::TabWriter;

use crate::table::MacTable;
use crate::types::SwdError;
use crate::types::SwdResult;

/// Render the current set of learned addresses, grouped by port.
pub fn render(table: &MacTable) -> SwdResult<String> {
    let ports = table.port_count() as usize;
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); ports];
    for e in table.entries() {
        columns[e.port as usize].push(e.addr.to_string());
    }
    let depth = columns.iter().map(Vec::len).max().unwrap_or(0);

    let mut tw = TabWriter::new(Vec::new());
    write!(tw, "ID")?;
    for port in 0..ports {
        write!(tw, "\tPORT{port}")?;
    }
    writeln!(tw)?;

    for row in 0..depth {
        write!(tw, "{row}")?;
        for column in &columns {
            match column.get(row) {
                Some(addr) => write!(tw, "\t{addr}")?,
                None => write!(tw, "\t.")?,
            }
        }
        writeln!(tw)?;
    }
    tw.flush()?;

    let buf = tw
        .into_inner()
        .map_err(|_| SwdError::Other("flushing table dump".to_string()))?;
    String::from_utf8(buf)
        .map_err(|e| SwdError::Other(format!("non-utf8 table dump: {e}")))
}

#[cfg(test)]
fn test_table() -> MacTable {
    use slog::Drain;
    let dec = slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(dec).build().fuse();
    let log = slog::Logger::root(drain, slog::o!());
    MacTable::new(&log, 4, 16)
}

#[test]
fn test_render_empty() {
    let table = test_table();
    let text = render(&table).unwrap();
    assert_eq!(text.lines().count(), 1);
    let header = text.lines().next().unwrap();
    for port in 0..4 {
        assert!(header.contains(&format!("PORT{port}")));
    }
}

#[test]
fn test_render_groups_by_port() {
    use chrono::Utc;

    let mut table = test_table();
    let ttl = chrono::Duration::seconds(10);
    let a = "00:00:00:00:00:0a".parse().unwrap();
    let b = "00:00:00:00:00:0b".parse().unwrap();
    let c = "00:00:00:00:00:0c".parse().unwrap();
    table.claim(0, a, 1, ttl, Utc::now());
    table.claim(1, b, 1, ttl, Utc::now());
    table.claim(2, c, 3, ttl, Utc::now());

    let text = render(&table).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    // Two addresses on port 1 means two data rows.
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("00:00:00:00:00:0a"));
    assert!(lines[1].contains("00:00:00:00:00:0c"));
    assert!(lines[2].contains("00:00:00:00:00:0b"));
    // Port 3's column is exhausted after the first row.
    assert!(lines[2].contains('.'));
}
