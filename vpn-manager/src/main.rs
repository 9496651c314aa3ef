// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use vpn_manager::application::Application;
use vpn_manager::configuration::VpnManagerOptions;
use vpn_manager::constants::LOG_PREFIX;
use vpn_manager::manager::VpnManager;
use vpn_manager::rate_limit::RateLimiter;
use vpn_manager::{jobs, persistence};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        // this needs to be set to remove duplicated information in the log.
        .with_current_span(false)
        .with_ansi(false)
        .without_time()
        // remove the name of the function from every log entry
        .with_target(false)
        .init();

    let options = VpnManagerOptions::parse();

    tracing::info!("{} {:?}", LOG_PREFIX, &options);

    if options.purge {
        return purge(&options).await;
    }

    if options.list_users {
        return list_users(&options).await;
    }

    serve(options).await
}

/// Revokes every client the driver program knows of and saves an empty registry.
async fn purge(options: &VpnManagerOptions) -> Result<()> {
    // everything is revoked by position anyway, a damaged snapshot only loses the owner names
    let registry = persistence::load_or_default(&options.state_file)
        .await
        .unwrap_or_default();
    let manager = VpnManager::new(
        registry,
        options.client_program(),
        options.limits(),
        options.max_cache_size,
    );
    let revoked = manager.purge().await;
    manager
        .snapshot(&options.state_file)
        .await
        .with_context(|| format!("unable to reset {}", options.state_file.display()))?;
    println!("Revoked {revoked} clients.");
    Ok(())
}

/// Prints the owners and the clients they own as JSON.
async fn list_users(options: &VpnManagerOptions) -> Result<()> {
    let registry = persistence::restore(&options.state_file)
        .await
        .with_context(|| {
            format!(
                "couldn't restore {}. Make sure that you pass a '-f STATE_FILE' \
                 of a valid vpn manager to get the users list from",
                options.state_file.display()
            )
        })?;
    println!("{}", serde_json::to_string_pretty(&registry.list())?);
    Ok(())
}

async fn serve(options: VpnManagerOptions) -> Result<()> {
    let registry = persistence::load_or_default(&options.state_file)
        .await
        .with_context(|| format!("unable to restore {}", options.state_file.display()))?;

    let manager = Arc::new(VpnManager::new(
        registry,
        options.client_program(),
        options.limits(),
        options.max_cache_size,
    ));
    tracing::info!(
        "{} restored {} clients from {}",
        LOG_PREFIX,
        manager.client_count().await,
        options.state_file.display()
    );
    let rate_limiter = Arc::new(RateLimiter::new(
        options.max_requests,
        options.grace_requests,
    ));

    let shutdown = CancellationToken::new();
    jobs::spawn_signal_handler(shutdown.clone());

    let state_file = options.state_file.clone();
    let snapshot_manager = manager.clone();
    let snapshots = jobs::spawn_periodic(
        "snapshot",
        options.snapshot_interval(),
        shutdown.clone(),
        move || {
            let manager = snapshot_manager.clone();
            let path = state_file.clone();
            async move { manager.snapshot(&path).await }
        },
    );

    let reset_limiter = rate_limiter.clone();
    let resets = jobs::spawn_periodic(
        "rate limit reset",
        options.rate_limit_reset_interval(),
        shutdown.clone(),
        move || {
            reset_limiter.reset();
            std::future::ready(Ok::<(), std::convert::Infallible>(()))
        },
    );

    let application = Application::build(&options.host, options.port, manager, rate_limiter)
        .await
        .with_context(|| format!("unable to listen on {}:{}", options.host, options.port))?;

    tracing::info!("{} service started", LOG_PREFIX);
    let served = application.run_until_stopped(shutdown.clone()).await;

    // the server may also stop on its own, make sure the jobs wind down too
    tracing::info!("{} shutting down", LOG_PREFIX);
    shutdown.cancel();
    tokio::join!(
        jobs::join("snapshot", snapshots),
        jobs::join("rate limit reset", resets)
    );

    served.context("server stopped unexpectedly")
}
