// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::time::Duration;

pub const LOG_PREFIX: &str = "[vpn-manager]";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_STATE_FILE: &str = "vpn_manager_state.json";
/// Driver program that knows how to add (`new <id>`) and revoke (`revoke <index>`) clients.
pub const DEFAULT_PROGRAM: &str = "./client.sh";
pub const DEFAULT_PROGRAM_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_MAX_CLIENTS: usize = 10_000;
pub const DEFAULT_MAX_CLIENTS_PER_USER: usize = 10;
pub const DEFAULT_MAX_CACHE_SIZE: usize = 500;
/// Pruning halves the cache, anything smaller would evict the entry just inserted.
pub const MIN_CACHE_SIZE: usize = 2;

pub const DEFAULT_MAX_REQUESTS: u64 = 1000;
/// Number of requests past the limit that still get an explicit denial.
pub const DEFAULT_GRACE_REQUESTS: u64 = 10;

pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_RATE_LIMIT_RESET_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub const CLIENT_FILE_EXTENSION: &str = ".ovpn";
pub const REAL_IP_HEADER: &str = "x-real-ip";
pub const UNKNOWN_SOURCE: &str = "unknown";
pub const BACKUP_SUFFIX: &str = "_backup";

pub const RATE_LIMITED_MESSAGE: &str = "Are you a bot?";
pub const PROJECT_URL: &str = "https://github.com/meryacine/vpn-manager";
