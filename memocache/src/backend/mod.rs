// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage backends
//!
//! This module provides a trait-based abstraction for the stores that hold
//! memoized results, allowing the strategies below to be used interchangeably.
//!
//! # Architecture
//!
//! ```text
//! Memoized wrapper (keys, TTL, failure containment)
//!     ↓
//! Backend (setup / contains / get / put)
//!     ↓
//! Concrete Implementations (memory, sled, per-key files, remote service)
//! ```
//!
//! # Example Usage
//!
//! ```ignore
//! use memocache::backend::{create_backend, BackendKind, BackendOptions};
//!
//! let mut backend = create_backend(&BackendOptions {
//!     kind: BackendKind::PerKeyFile,
//!     cache_dir: "./.memocache".into(),
//!     remote_url: String::new(),
//! })?;
//! backend.setup(&BackendHandle::from_source(file!()))?;
//! backend.put(&key, &CacheEntry::new(now, bytes))?;
//! ```

// Core modules
pub mod factory;
pub mod traits;
pub mod types;

// Backend implementations
pub mod file;
pub mod memory;
pub mod network;
#[cfg(feature = "sled-backend")]
pub mod sled;

// Public API re-exports
pub use factory::{create_backend, BackendOptions};
pub use file::PerKeyFileBackend;
pub use memory::InMemoryBackend;
pub use network::{NetworkBackend, RemoteStore, DEFAULT_REMOTE_URL};
#[cfg(feature = "redis-backend")]
pub use network::RedisStore;
#[cfg(feature = "sled-backend")]
pub use self::sled::SharedFileBackend;
pub use traits::{Backend, BackendFactory};
pub use types::{BackendKind, CacheEntry};
