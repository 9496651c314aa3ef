// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! In-memory cache of issued client files.
//!
//! Entries are kept in insertion order. Once the cache fills up the oldest
//! half is pruned in one pass, since those files have most likely been
//! downloaded already. A pruned client stays registered; only its file is gone.

use indexmap::IndexMap;

use crate::constants::LOG_PREFIX;
use crate::errors::AppError;
use crate::models::{ClientId, Material};

#[derive(Debug)]
pub struct MaterialCache {
    capacity: usize,
    entries: IndexMap<ClientId, Material>,
}

impl MaterialCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.entries.contains_key(id)
    }

    /// Inserts `material` as the newest entry, pruning the oldest half when full.
    pub fn put(&mut self, id: ClientId, material: Material) {
        // re-inserting moves the entry to the newest position
        self.entries.shift_remove(&id);
        self.entries.insert(id, material);

        if self.entries.len() >= self.capacity {
            let keep = self.capacity / 2;
            let pruned = self.entries.len() - keep;
            tracing::info!(
                "{} hit the maximum ovpn file count, pruning {} ovpn files",
                LOG_PREFIX,
                pruned
            );
            self.entries.drain(..pruned);
        }
    }

    pub fn get(&self, id: &ClientId) -> Result<Material, AppError> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::MaterialUnavailable(id.clone()))
    }

    pub fn remove(&mut self, id: &ClientId) -> Option<Material> {
        self.entries.shift_remove(id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
