// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Shared slog setup for the daemons in this workspace.

use std::fs::OpenOptions;
use std::str::FromStr;

use anyhow::Context;
use slog::Drain;

/// How log records should be rendered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogFormat {
    /// Unstructured text, suitable for a terminal.
    Human,
    /// Structured bunyan-style JSON, suitable for log collection.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            x => Err(format!("invalid log format: {x}")),
        }
    }
}

/// Build the root logger for a daemon, writing to `log_file` if one is given
/// and to stdout otherwise.
pub fn init(
    name: &'static str,
    log_file: &Option<String>,
    log_format: LogFormat,
) -> anyhow::Result<slog::Logger> {
    let drain: Box<dyn Drain<Ok = (), Err = slog::Never> + Send> =
        match log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {path}"))?;
                match log_format {
                    LogFormat::Human => {
                        let decorator = slog_term::PlainDecorator::new(file);
                        Box::new(
                            slog_term::FullFormat::new(decorator)
                                .build()
                                .fuse(),
                        )
                    }
                    LogFormat::Json => Box::new(
                        slog_bunyan::with_name(name, file).build().fuse(),
                    ),
                }
            }
            None => match log_format {
                LogFormat::Human => {
                    let decorator = slog_term::TermDecorator::new().build();
                    Box::new(
                        slog_term::FullFormat::new(decorator).build().fuse(),
                    )
                }
                LogFormat::Json => Box::new(
                    slog_bunyan::with_name(name, std::io::stdout())
                        .build()
                        .fuse(),
                ),
            },
        };

    let drain = slog_async::Async::new(drain)
        .chan_size(0x8000)
        .build()
        .fuse();
    Ok(slog::Logger::root(drain, slog::o!()))
}

#[cfg(test)]
mod tests {
    use super::LogFormat;

    #[test]
    fn test_format_parsing() {
        assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
