// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Client lifecycle: issuing, serving, revoking and purging VPN clients.
//!
//! [`VpnManager`] ties the [`Registry`], the [`MaterialCache`] and the
//! [`ClientProgram`] together behind one [`Mutex`]. The lock is held across
//! the driver program invocation: revoke indexes are positions in the
//! registry, so no other mutation may run between resolving a position and
//! committing the revoke. Issuing is all-or-nothing, a failed program run
//! leaves the registry and the cache untouched.
//!
//! Only one instance may manage a given driver program. Two managers over the
//! same program disagree on positions and revoke each other's clients.

use std::path::Path;

use tokio::sync::Mutex;

use crate::cache::MaterialCache;
use crate::constants::LOG_PREFIX;
use crate::errors::AppError;
use crate::models::{ClientId, Material, OwnersView};
use crate::persistence;
use crate::process::ClientProgram;
use crate::registry::{Limits, Registry};

struct State {
    registry: Registry,
    cache: MaterialCache,
}

pub struct VpnManager {
    program: ClientProgram,
    limits: Limits,
    state: Mutex<State>,
}

impl VpnManager {
    pub fn new(
        registry: Registry,
        program: ClientProgram,
        limits: Limits,
        max_cache_size: usize,
    ) -> Self {
        Self {
            program,
            limits,
            state: Mutex::new(State {
                registry,
                cache: MaterialCache::new(max_cache_size),
            }),
        }
    }

    /// Issues a new client owned by `owner` and caches its file.
    #[tracing::instrument(skip(self))]
    pub async fn new_client(&self, owner: &str) -> Result<ClientId, AppError> {
        let mut state = self.state.lock().await;
        state.registry.check_admission(owner, &self.limits)?;

        let mut id = ClientId::random();
        while state.registry.contains(&id) || state.cache.contains(&id) {
            id = ClientId::random();
        }

        let material = self.program.issue(&id).await.map_err(|e| {
            tracing::error!(
                "{} driver program failed while adding a new client: {}",
                LOG_PREFIX,
                e
            );
            AppError::IssuanceFailed
        })?;

        state.registry.insert(owner, id.clone());
        state.cache.put(id.clone(), material);

        tracing::info!("{} user {} claimed client {}", LOG_PREFIX, owner, id);
        Ok(id)
    }

    /// Returns the cached file of a registered client.
    ///
    /// Unknown ids are [`AppError::NotFound`]; registered ids whose file was
    /// pruned are [`AppError::MaterialUnavailable`].
    #[tracing::instrument(skip(self))]
    pub async fn material(&self, id: &ClientId) -> Result<Material, AppError> {
        let state = self.state.lock().await;
        if !state.registry.contains(id) {
            return Err(AppError::NotFound(id.clone()));
        }
        state.cache.get(id)
    }

    /// Revokes the client `id` on behalf of `owner`.
    ///
    /// `id` may carry the client file extension.
    #[tracing::instrument(skip(self))]
    pub async fn remove_client(&self, owner: &str, id: &str) -> Result<ClientId, AppError> {
        let id = ClientId::from_file_name(id);
        let mut state = self.state.lock().await;
        let position = state.registry.authorize_removal(owner, &id)?;

        self.program.revoke(position).await.map_err(|e| {
            tracing::error!(
                "{} driver program failed while revoking client {} at {}: {}",
                LOG_PREFIX,
                id,
                position,
                e
            );
            AppError::RevocationFailed(id.clone())
        })?;

        state.registry.forget(&id);
        state.cache.remove(&id);

        tracing::info!("{} user {} deleted client {}", LOG_PREFIX, owner, id);
        Ok(id)
    }

    /// Revokes every client the driver program knows of and forgets them all.
    #[tracing::instrument(skip(self))]
    pub async fn purge(&self) -> usize {
        let mut state = self.state.lock().await;
        let revoked = self.program.purge().await;
        if revoked != state.registry.len() {
            tracing::warn!(
                "{} purged {} clients but {} were registered",
                LOG_PREFIX,
                revoked,
                state.registry.len()
            );
        }
        state.registry.clear();
        state.cache.clear();
        revoked
    }

    pub async fn list(&self) -> OwnersView {
        self.state.lock().await.registry.list()
    }

    pub async fn client_count(&self) -> usize {
        self.state.lock().await.registry.len()
    }

    /// Persists the registry to `path`. The lock is released before any file I/O.
    #[tracing::instrument(skip(self))]
    pub async fn snapshot(&self, path: &Path) -> Result<(), AppError> {
        let registry = self.state.lock().await.registry.clone();
        persistence::snapshot(&registry, path).await
    }
}
