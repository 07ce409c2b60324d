// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory backend implementation

use super::traits::Backend;
use super::types::{BackendKind, CacheEntry};
use crate::error::{CacheError, CacheResult};
use crate::keys::{BackendHandle, CacheKey};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-lifetime backend with no persistence and no I/O failure mode
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl InMemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Backend for InMemoryBackend {
    fn setup(&mut self, _handle: &BackendHandle) -> CacheResult<()> {
        // Nothing to open
        Ok(())
    }

    fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.data.read().contains_key(key))
    }

    fn get(&self, key: &CacheKey) -> CacheResult<CacheEntry> {
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::KeyNotFound(format!("{:?}", key)))
    }

    fn put(&self, key: &CacheKey, entry: &CacheEntry) -> CacheResult<()> {
        self.data.write().insert(key.clone(), entry.clone());
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.data.write().remove(key).is_some())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}
