// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # VPN Manager
//!
//! An HTTP service that hands out and revokes OpenVPN clients for anonymous
//! users, identified only by their source address.
//!
//! ## Architecture
//!
//! ```text
//! Client -> HTTP API -> rate limiter -> action -> VpnManager -> driver program
//!                                                     |
//!                                                     +-> Registry (snapshotted to disk)
//!                                                     +-> MaterialCache (memory only)
//! ```
//!
//! - **HTTP API**: Axum router built from a static action table, with a
//!   per-source rate limiter in front of every action
//! - **Client lifecycle**: Registry, cache and driver program calls are
//!   serialized behind one lock, since revocation is addressed by position
//! - **Persistence**: the registry is snapshotted periodically with one backup
//!   generation and restored at startup
//!
//! ## Modules
//!
//! - [`application`]: HTTP server setup, caller resolution and admission
//! - [`cache`]: Bounded insertion-ordered cache of client files
//! - [`configuration`]: CLI argument parsing with clap
//! - [`constants`]: Defaults and fixed names
//! - [`errors`]: Application error types with HTTP response mapping
//! - [`jobs`]: Periodic background jobs and signal handling
//! - [`manager`]: Client lifecycle over registry, cache and driver program
//! - [`models`]: Identifiers, client files and response types
//! - [`persistence`]: Snapshot and restore of the registry
//! - [`process`]: Driver program invocation
//! - [`rate_limit`]: Per-source request counting
//! - [`registry`]: Registered clients, owners and limits
//! - [`routes`]: HTTP route handlers and the action table
//!
//! ## Usage
//!
//! ```bash
//! vpn-manager --port 8000 --state-file /var/lib/vpn-manager/state.json
//! vpn-manager --list-users -f /var/lib/vpn-manager/state.json
//! vpn-manager --purge -f /var/lib/vpn-manager/state.json
//! ```
//!
//! Only one instance may run per driver program.

pub mod application;
pub mod cache;
pub mod configuration;
pub mod constants;
pub mod errors;
pub mod jobs;
pub mod manager;
pub mod models;
pub mod persistence;
pub mod process;
pub mod rate_limit;
pub mod registry;
pub mod routes;
