// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Configuration for `l2swd`.

use std::time::Duration;

use serde::Deserialize;

use crate::types::SwdError;
use crate::types::SwdResult;
use common::logging::LogFormat;

/// The Config structure captures all of the run-time settings that can be
/// adjusted when the daemon starts: via the optional switch profile file,
/// overridden by command-line options.
#[derive(Debug)]
pub struct Config {
    /// If set, where the log should be written.  If not set, the log goes to
    /// stdout.
    pub log_file: Option<String>,

    /// Output log info in unstructured text or json?
    pub log_format: LogFormat,

    /// Where to find the TOML profile describing the attached switch, if the
    /// built-in defaults don't apply.
    pub switch_config: Option<String>,

    /// Directory holding the unix sockets shared with the dataplane.
    pub uds_path: String,

    /// Number of physical ports on the switch.
    pub ports: u8,

    /// Maximum number of mac addresses the table can hold.
    pub mac_table_size: usize,

    /// Lifetime of a learned mac address, in seconds.
    pub mac_ttl_secs: u64,

    /// Seconds between scans for stale mac table entries.
    pub mac_aging_secs: u64,

    /// Seconds between per-port flood counter resets.
    pub counter_reset_secs: u64,

    /// Number of frames each port may flood between counter resets.
    pub flood_limit: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_file: None,
            log_format: LogFormat::Json,
            switch_config: None,
            uds_path: "/var/run/l2swd".to_string(),
            ports: 4,
            mac_table_size: 128,
            mac_ttl_secs: 10,
            mac_aging_secs: 5,
            counter_reset_secs: 500,
            flood_limit: 500,
        }
    }
}

impl Config {
    pub fn mac_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.mac_ttl_secs as i64)
    }

    pub fn mac_aging_interval(&self) -> Duration {
        Duration::from_secs(self.mac_aging_secs)
    }

    pub fn counter_reset_interval(&self) -> Duration {
        Duration::from_secs(self.counter_reset_secs)
    }
}

// Settings that may be supplied by a TOML profile describing the attached
// switch.  Anything absent keeps its current value.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Profile {
    ports: Option<u8>,
    mac_table_size: Option<usize>,
    mac_ttl_secs: Option<u64>,
    mac_aging_secs: Option<u64>,
    counter_reset_secs: Option<u64>,
    flood_limit: Option<u64>,
}

fn apply_profile(
    config: &mut Config,
    contents: &str,
    origin: &str,
) -> SwdResult<()> {
    let profile: Profile = toml::from_str(contents)
        .map_err(|e| SwdError::Invalid(format!("parsing {origin}: {e}")))?;

    if let Some(ports) = profile.ports {
        config.ports = ports;
    }
    if let Some(size) = profile.mac_table_size {
        config.mac_table_size = size;
    }
    if let Some(ttl) = profile.mac_ttl_secs {
        config.mac_ttl_secs = ttl;
    }
    if let Some(aging) = profile.mac_aging_secs {
        config.mac_aging_secs = aging;
    }
    if let Some(reset) = profile.counter_reset_secs {
        config.counter_reset_secs = reset;
    }
    if let Some(limit) = profile.flood_limit {
        config.flood_limit = limit;
    }
    Ok(())
}

// Use the command-line arguments to update the run-time config.
fn update_from_cli(opts: &crate::Opt, config: &mut Config) {
    if let Some(log_file) = &opts.log_file {
        config.log_file = Some(log_file.to_string());
    }
    if let Some(log_format) = opts.log_format {
        config.log_format = log_format;
    }
    if let Some(uds_path) = &opts.uds_path {
        config.uds_path = uds_path.to_string();
    }
    if let Some(ports) = opts.ports {
        config.ports = ports;
    }
    if let Some(size) = opts.mac_table_size {
        config.mac_table_size = size;
    }
    if let Some(ttl) = opts.mac_ttl {
        config.mac_ttl_secs = ttl;
    }
    if let Some(aging) = opts.mac_aging_interval {
        config.mac_aging_secs = aging;
    }
    if let Some(reset) = opts.counter_reset_interval {
        config.counter_reset_secs = reset;
    }
    if let Some(limit) = opts.flood_limit {
        config.flood_limit = limit;
    }
}

/// Build a Config containing the tunable settings used to adjust the
/// daemon's behavior.  Defaults are overridden by the switch profile (if one
/// is named), which in turn is overridden by command-line options.
pub(crate) fn build_config(opts: &crate::Opt) -> SwdResult<Config> {
    let mut config = Config::default();
    if let Some(path) = &opts.switch_config {
        config.switch_config = Some(path.to_string());
        let contents = std::fs::read_to_string(path)?;
        apply_profile(&mut config, &contents, path)?;
    }
    update_from_cli(opts, &mut config);

    if config.ports == 0 {
        return Err(SwdError::Invalid(
            "a switch needs at least one port".to_string(),
        ));
    }
    if config.mac_table_size == 0 {
        return Err(SwdError::Invalid(
            "the mac table must hold at least one entry".to_string(),
        ));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Opt;

    #[test]
    fn test_defaults() {
        let config = build_config(&Opt::default()).unwrap();
        assert_eq!(config.ports, 4);
        assert_eq!(config.mac_table_size, 128);
        assert_eq!(config.mac_ttl_secs, 10);
        assert_eq!(config.flood_limit, 500);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_cli_overrides() {
        let opts = Opt {
            log_file: Some("test.log".to_string()),
            ports: Some(8),
            mac_ttl: Some(300),
            ..Opt::default()
        };
        let config = build_config(&opts).unwrap();
        assert_eq!(config.log_file, Some("test.log".to_string()));
        assert_eq!(config.ports, 8);
        assert_eq!(config.mac_ttl_secs, 300);
        // Untouched settings keep their defaults.
        assert_eq!(config.mac_table_size, 128);
    }

    #[test]
    fn test_profile() {
        let mut config = Config::default();
        let profile = r#"
            ports = 2
            mac_table_size = 32
            flood_limit = 100
        "#;
        apply_profile(&mut config, profile, "test").unwrap();
        assert_eq!(config.ports, 2);
        assert_eq!(config.mac_table_size, 32);
        assert_eq!(config.flood_limit, 100);
        assert_eq!(config.mac_ttl_secs, 10);
    }

    #[test]
    fn test_profile_rejects_unknown_settings() {
        let mut config = Config::default();
        assert!(apply_profile(&mut config, "vlans = 12", "test").is_err());
        assert!(apply_profile(&mut config, "ports = []", "test").is_err());
    }

    #[test]
    fn test_validation() {
        let opts = Opt {
            ports: Some(0),
            ..Opt::default()
        };
        assert!(build_config(&opts).is_err());

        let opts = Opt {
            mac_table_size: Some(0),
            ..Opt::default()
        };
        assert!(build_config(&opts).is_err());
    }
}
