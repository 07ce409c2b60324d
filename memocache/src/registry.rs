// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Registry of open backends
//!
//! The registry owns every open backend and hands out at most one instance
//! per [`BackendHandle`]. Functions defined in the same source unit therefore
//! share one store. Entries are never removed while the registry lives.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = Arc::new(CacheRegistry::new());
//! let backend = registry.resolve(&id.handle(), &options)?;
//! ```

use crate::backend::{Backend, BackendFactory};
use crate::error::CacheResult;
use crate::keys::BackendHandle;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-wide registry for callers that do not wire their own
static GLOBAL_REGISTRY: Lazy<Arc<CacheRegistry>> = Lazy::new(|| Arc::new(CacheRegistry::new()));

/// Table from backend handle to the single open backend for it
#[derive(Default)]
pub struct CacheRegistry {
    backends: Mutex<HashMap<BackendHandle, Arc<dyn Backend>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared registry that lives for the whole process
    ///
    /// Prefer an explicit `Arc<CacheRegistry>` owned by the application; this
    /// exists for code that has nowhere to keep one.
    pub fn global() -> Arc<CacheRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    /// Return the backend for `handle`, creating and setting it up on first use
    ///
    /// The lock is held across creation and setup, so threads racing on the
    /// first use of a handle end up with the same instance. A failed setup
    /// registers nothing and the next call tries again.
    pub fn resolve(
        &self,
        handle: &BackendHandle,
        factory: &dyn BackendFactory,
    ) -> CacheResult<Arc<dyn Backend>> {
        let mut backends = self.backends.lock();

        if let Some(backend) = backends.get(handle) {
            return Ok(backend.clone());
        }

        let mut backend = factory.create()?;
        backend.setup(handle)?;
        log::debug!("registered {} backend for {}", backend.kind(), handle);

        let backend: Arc<dyn Backend> = Arc::from(backend);
        backends.insert(handle.clone(), backend.clone());
        Ok(backend)
    }

    /// The backend for `handle`, if one has been set up
    pub fn get(&self, handle: &BackendHandle) -> Option<Arc<dyn Backend>> {
        self.backends.lock().get(handle).cloned()
    }

    pub fn contains(&self, handle: &BackendHandle) -> bool {
        self.backends.lock().contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.backends.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.lock().is_empty()
    }

    /// Handles of all open backends, sorted
    pub fn handles(&self) -> Vec<BackendHandle> {
        let mut handles: Vec<_> = self.backends.lock().keys().cloned().collect();
        handles.sort();
        handles
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("handles", &self.handles())
            .finish()
    }
}
