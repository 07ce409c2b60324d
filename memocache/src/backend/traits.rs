// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Backend traits
//!
//! This module defines the capability set every storage strategy provides.
//! All backends must implement these traits to be usable by the memoizing wrapper.

use super::types::{BackendKind, CacheEntry};
use crate::error::CacheResult;
use crate::keys::{BackendHandle, CacheKey};

/// Storage strategy for memoized results
///
/// A backend is created unopened, then `setup` binds it to the physical store
/// named by a handle. After setup it is shared behind an `Arc`, so every
/// other operation takes `&self`.
pub trait Backend: Send + Sync {
    /// Bind to (creating if needed) the store identified by `handle`
    fn setup(&mut self, handle: &BackendHandle) -> CacheResult<()>;

    /// Check if an entry exists for `key`
    fn contains(&self, key: &CacheKey) -> CacheResult<bool>;

    /// Fetch the entry for `key`, or `CacheError::KeyNotFound`
    fn get(&self, key: &CacheKey) -> CacheResult<CacheEntry>;

    /// Store `entry` under `key`, replacing any previous entry
    fn put(&self, key: &CacheKey, entry: &CacheEntry) -> CacheResult<()>;

    /// Drop the entry for `key`; returns whether one existed
    fn remove(&self, key: &CacheKey) -> CacheResult<bool>;

    /// Get backend type
    fn kind(&self) -> BackendKind;
}

/// Produces unopened backends for the registry
pub trait BackendFactory {
    fn create(&self) -> CacheResult<Box<dyn Backend>>;
}

impl<F> BackendFactory for F
where
    F: Fn() -> CacheResult<Box<dyn Backend>>,
{
    fn create(&self) -> CacheResult<Box<dyn Backend>> {
        self()
    }
}
