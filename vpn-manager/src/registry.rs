// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Bookkeeping of the registered VPN clients.
//!
//! The [`Registry`] keeps every live client in issuance order. The position of
//! a client in that sequence (1-based) is the index the driver program expects
//! when revoking it, so the order must mirror the program's own list exactly:
//! clients are appended on issue and removed in place on revoke, which shifts
//! every later client down by one on both sides.
//!
//! Next to the sequence sits the owner index (source address to owned ids).
//! Every id in the sequence belongs to exactly one owner and vice versa.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{ClientId, OwnersView};

/// Capacity limits enforced when admitting a new client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_clients: usize,
    pub max_clients_per_user: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    clients: Vec<ClientId>,
    owners: BTreeMap<String, Vec<ClientId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.clients.contains(id)
    }

    /// Number of clients currently owned by `owner`.
    pub fn owned_count(&self, owner: &str) -> usize {
        self.owners.get(owner).map_or(0, Vec::len)
    }

    /// Checks the global and the per-owner limits, in that order.
    pub fn check_admission(&self, owner: &str, limits: &Limits) -> Result<(), AppError> {
        if self.len() >= limits.max_clients {
            return Err(AppError::CapacityExceeded);
        }
        if self.owned_count(owner) >= limits.max_clients_per_user {
            return Err(AppError::OwnerQuotaExceeded);
        }
        Ok(())
    }

    /// 1-based position of `id` in issuance order.
    pub fn position(&self, id: &ClientId) -> Option<usize> {
        self.clients.iter().position(|c| c == id).map(|i| i + 1)
    }

    /// Resolves the revoke index of `id` on behalf of `owner`.
    pub fn authorize_removal(&self, owner: &str, id: &ClientId) -> Result<usize, AppError> {
        let position = self
            .position(id)
            .ok_or_else(|| AppError::NotFound(id.clone()))?;
        let owned = self
            .owners
            .get(owner)
            .is_some_and(|clients| clients.contains(id));
        if !owned {
            return Err(AppError::NotOwned(id.clone()));
        }
        Ok(position)
    }

    pub fn insert(&mut self, owner: &str, id: ClientId) {
        self.owners
            .entry(owner.to_string())
            .or_default()
            .push(id.clone());
        self.clients.push(id);
    }

    /// Drops `id` from the sequence and from whichever owner holds it.
    pub fn forget(&mut self, id: &ClientId) {
        self.clients.retain(|c| c != id);
        self.owners.retain(|_, clients| {
            clients.retain(|c| c != id);
            !clients.is_empty()
        });
    }

    pub fn clear(&mut self) {
        self.clients.clear();
        self.owners.clear();
    }

    pub fn list(&self) -> OwnersView {
        self.owners.clone()
    }

    /// Verifies the sequence and the owner index describe the same set of ids.
    pub fn validate(&self) -> Result<(), AppError> {
        let owned: usize = self.owners.values().map(Vec::len).sum();
        if owned != self.clients.len() {
            return Err(AppError::CorruptState(format!(
                "{} registered clients but {} owned clients",
                self.clients.len(),
                owned
            )));
        }

        let mut seen = std::collections::BTreeSet::new();
        for id in &self.clients {
            if !seen.insert(id) {
                return Err(AppError::CorruptState(format!("client {id} registered twice")));
            }
        }
        for (owner, clients) in &self.owners {
            if let Some(id) = clients.iter().find(|id| !seen.contains(id)) {
                return Err(AppError::CorruptState(format!(
                    "client {id} of {owner} is not registered"
                )));
            }
        }
        Ok(())
    }
}
