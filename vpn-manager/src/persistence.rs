// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Durable snapshots of the [`Registry`].
//!
//! A snapshot is the registry serialized as JSON. The format carries no
//! version and is only meant to be read back by the same build.
//!
//! # Write sequence
//!
//! 1. An existing snapshot at `path` is copied to the backup path
//!    (`state.json` becomes `state_backup.json`)
//! 2. The new snapshot is written to `path` with a `.tmp` suffix and synced
//! 3. The temporary file is renamed over `path`
//!
//! An interrupted write leaves the previous snapshot in place, and the backup
//! is there if the primary itself turns out to be damaged.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::constants::{BACKUP_SUFFIX, LOG_PREFIX};
use crate::errors::AppError;
use crate::registry::Registry;

/// Returns `<stem>_backup<.ext>` next to `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_stem().map(OsString::from).unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    if let Some(extension) = path.extension() {
        name.push(".");
        name.push(extension);
    }
    path.with_file_name(name)
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[tracing::instrument(skip(registry))]
pub async fn snapshot(registry: &Registry, path: &Path) -> Result<(), AppError> {
    let log_io = |action: &'static str| {
        move |e: std::io::Error| {
            tracing::error!("{} unable to {} {}: {}", LOG_PREFIX, action, path.display(), e);
            AppError::from(e)
        }
    };

    if tokio::fs::try_exists(path).await.map_err(log_io("inspect"))? {
        tokio::fs::copy(path, backup_path(path))
            .await
            .map_err(log_io("back up"))?;
    }

    let payload = serde_json::to_vec(registry)?;
    let temporary = temporary_path(path);
    let mut file = tokio::fs::File::create(&temporary)
        .await
        .map_err(log_io("create a snapshot next to"))?;
    file.write_all(&payload).await.map_err(log_io("write"))?;
    file.sync_all().await.map_err(log_io("sync"))?;
    drop(file);
    tokio::fs::rename(&temporary, path)
        .await
        .map_err(log_io("replace"))?;

    tracing::debug!(
        "{} saved {} clients to {}",
        LOG_PREFIX,
        registry.len(),
        path.display()
    );
    Ok(())
}

/// Reads the snapshot at `path`. Any read, parse or consistency failure is
/// reported as [`AppError::CorruptState`].
#[tracing::instrument]
pub async fn restore(path: &Path) -> Result<Registry, AppError> {
    let payload = tokio::fs::read(path).await.map_err(|e| {
        AppError::CorruptState(format!("unable to read {}: {}", path.display(), e))
    })?;
    let registry: Registry = serde_json::from_slice(&payload).map_err(|e| {
        AppError::CorruptState(format!("unable to parse {}: {}", path.display(), e))
    })?;
    registry.validate()?;
    Ok(registry)
}

/// Startup restore: a missing snapshot yields an empty registry, a corrupt one
/// falls back to its backup.
#[tracing::instrument]
pub async fn load_or_default(path: &Path) -> Result<Registry, AppError> {
    if !tokio::fs::try_exists(path).await? {
        tracing::info!(
            "{} {} doesn't exist, creating a fresh vpn manager",
            LOG_PREFIX,
            path.display()
        );
        return Ok(Registry::new());
    }

    let error = match restore(path).await {
        Ok(registry) => {
            tracing::info!(
                "{} restored {} clients from {}",
                LOG_PREFIX,
                registry.len(),
                path.display()
            );
            return Ok(registry);
        }
        Err(error) => error,
    };

    let backup = backup_path(path);
    tracing::warn!(
        "{} {}, trying {}",
        LOG_PREFIX,
        error,
        backup.display()
    );
    match restore(&backup).await {
        Ok(registry) => {
            tracing::warn!(
                "{} restored {} clients from backup {}",
                LOG_PREFIX,
                registry.len(),
                backup.display()
            );
            Ok(registry)
        }
        Err(backup_error) => {
            tracing::error!("{} {}", LOG_PREFIX, backup_error);
            Err(error)
        }
    }
}
