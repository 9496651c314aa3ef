// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::constants;
use crate::process::ClientProgram;
use crate::registry::Limits;

/// A server to add and remove OpenVPN clients, fully accessible by external users.
///
/// Only one instance may run against a given driver program. A second one
/// would wrongfully revoke the clients created by the first.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct VpnManagerOptions {
    #[arg(long, default_value = constants::DEFAULT_HOST, env("VPN_MANAGER_HTTP_HOST"))]
    pub host: String,
    #[arg(short, long, default_value_t = constants::DEFAULT_PORT, env("VPN_MANAGER_HTTP_PORT"))]
    pub port: u16,
    /// Snapshot file the registered clients are restored from and saved to.
    #[arg(short = 'f', long, default_value = constants::DEFAULT_STATE_FILE, env("VPN_MANAGER_STATE_FILE"))]
    pub state_file: PathBuf,
    /// Driver program invoked as `<program> new <id>` and `<program> revoke <index>`.
    #[arg(long, default_value = constants::DEFAULT_PROGRAM, env("VPN_MANAGER_PROGRAM"))]
    pub program: PathBuf,
    /// Seconds a single driver program run may take.
    #[arg(long, default_value_t = constants::DEFAULT_PROGRAM_TIMEOUT.as_secs(), env("VPN_MANAGER_PROGRAM_TIMEOUT"))]
    pub program_timeout: u64,
    #[arg(short, long, default_value_t = constants::DEFAULT_MAX_CLIENTS, env("VPN_MANAGER_MAX_CLIENTS"))]
    pub max_clients: usize,
    #[arg(long, default_value_t = constants::DEFAULT_MAX_CLIENTS_PER_USER, env("VPN_MANAGER_MAX_CLIENTS_PER_USER"))]
    pub max_clients_per_user: usize,
    /// Maximum number of client files kept in memory.
    #[arg(long, default_value_t = constants::DEFAULT_MAX_CACHE_SIZE, env("VPN_MANAGER_MAX_CACHE_SIZE"), value_parser = parse_cache_size)]
    pub max_cache_size: usize,
    /// Requests per source before it gets denied.
    #[arg(long, default_value_t = constants::DEFAULT_MAX_REQUESTS, env("VPN_MANAGER_MAX_REQUESTS"))]
    pub max_requests: u64,
    /// Requests past the limit that still get a denial message before being ignored.
    #[arg(long, default_value_t = constants::DEFAULT_GRACE_REQUESTS, env("VPN_MANAGER_GRACE_REQUESTS"))]
    pub grace_requests: u64,
    #[arg(long, default_value_t = constants::DEFAULT_SNAPSHOT_INTERVAL.as_secs(), env("VPN_MANAGER_SNAPSHOT_INTERVAL"))]
    pub snapshot_interval: u64,
    #[arg(long, default_value_t = constants::DEFAULT_RATE_LIMIT_RESET_INTERVAL.as_secs(), env("VPN_MANAGER_RATE_LIMIT_RESET_INTERVAL"))]
    pub rate_limit_reset_interval: u64,
    /// List the users (IPs) and the clients they own, then exit.
    #[arg(short = 'u', long, default_value = "false", action = ArgAction::SetTrue)]
    pub list_users: bool,
    /// Revoke every client of the driver program and reset the snapshot, then exit.
    #[arg(long, default_value = "false", action = ArgAction::SetTrue)]
    pub purge: bool,
}

fn parse_cache_size(value: &str) -> Result<usize, String> {
    let size: usize = value.parse().map_err(|e| format!("{e}"))?;
    if size < constants::MIN_CACHE_SIZE {
        return Err(format!("must be at least {}", constants::MIN_CACHE_SIZE));
    }
    Ok(size)
}

impl VpnManagerOptions {
    pub fn limits(&self) -> Limits {
        Limits {
            max_clients: self.max_clients,
            max_clients_per_user: self.max_clients_per_user,
        }
    }

    pub fn client_program(&self) -> ClientProgram {
        ClientProgram::new(&self.program, Duration::from_secs(self.program_timeout))
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval)
    }

    pub fn rate_limit_reset_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_reset_interval)
    }
}

impl Default for VpnManagerOptions {
    fn default() -> Self {
        VpnManagerOptions {
            host: constants::DEFAULT_HOST.to_string(),
            port: constants::DEFAULT_PORT,
            state_file: PathBuf::from(constants::DEFAULT_STATE_FILE),
            program: PathBuf::from(constants::DEFAULT_PROGRAM),
            program_timeout: constants::DEFAULT_PROGRAM_TIMEOUT.as_secs(),
            max_clients: constants::DEFAULT_MAX_CLIENTS,
            max_clients_per_user: constants::DEFAULT_MAX_CLIENTS_PER_USER,
            max_cache_size: constants::DEFAULT_MAX_CACHE_SIZE,
            max_requests: constants::DEFAULT_MAX_REQUESTS,
            grace_requests: constants::DEFAULT_GRACE_REQUESTS,
            snapshot_interval: constants::DEFAULT_SNAPSHOT_INTERVAL.as_secs(),
            rate_limit_reset_interval: constants::DEFAULT_RATE_LIMIT_RESET_INTERVAL.as_secs(),
            list_users: false,
            purge: false,
        }
    }
}
