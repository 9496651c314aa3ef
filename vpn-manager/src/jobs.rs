// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Periodic background jobs and shutdown signalling.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::constants::LOG_PREFIX;

/// Spawns a task that runs `action` every `period`.
///
/// When `shutdown` is cancelled the task stops waiting, runs `action` one
/// last time and exits. A failing run is logged and does not stop the job.
pub fn spawn_periodic<F, Fut, E>(
    name: &'static str,
    period: Duration,
    shutdown: CancellationToken,
    mut action: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    tracing::info!("{} running {} every {:#?}", LOG_PREFIX, name, period);
    tokio::spawn(async move {
        loop {
            let stopping = tokio::select! {
                _ = shutdown.cancelled() => true,
                _ = tokio::time::sleep(period) => false,
            };

            tracing::debug!("{} running the periodic job {}", LOG_PREFIX, name);
            if let Err(e) = action().await {
                tracing::error!("{} periodic job {} failed: {}", LOG_PREFIX, name, e);
            }

            if stopping {
                tracing::info!("{} periodic job {} stopped", LOG_PREFIX, name);
                return;
            }
        }
    })
}

/// Waits for a job to wind down. Returns `false`, after logging, if it panicked.
pub async fn join(name: &'static str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("{} periodic job {} died: {}", LOG_PREFIX, name, e);
            false
        }
    }
}

/// Cancels `shutdown` on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let (mut sigint, mut sigterm) =
                match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                    (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                    (Err(e), _) | (_, Err(e)) => {
                        tracing::error!("{} unable to register signal handlers: {}", LOG_PREFIX, e);
                        return;
                    }
                };
            tokio::select! {
                _ = sigint.recv() => tracing::info!("{} received SIGINT", LOG_PREFIX),
                _ = sigterm.recv() => tracing::info!("{} received SIGTERM", LOG_PREFIX),
                _ = shutdown.cancelled() => return,
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!("{} unable to listen for ctrl-c: {}", LOG_PREFIX, e);
                        return;
                    }
                    tracing::info!("{} received ctrl-c", LOG_PREFIX);
                }
                _ = shutdown.cancelled() => return,
            }
        }

        shutdown.cancel();
    })
}
