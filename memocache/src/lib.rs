// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! memocache - persistent memoization of function results
//!
//! memocache wraps a function so that results for argument combinations it
//! has already seen come back from a cache instead of being recomputed. The
//! cache outlives the process and entries can expire after a validity period.
//!
//! # Features
//!
//! - **Stable keys**: keys are a deterministic encoding of the function name
//!   and its arguments, identical across runs
//! - **Pluggable storage**: in-memory, one sled store per source file, one file
//!   per key, or a remote key-value service
//! - **Expiry**: per-wrapper validity period, or forever
//! - **Failure containment**: cache malfunctions are logged and either
//!   surfaced or silently bypassed, never confused with the function's own
//!   errors
//!
//! # Usage
//!
//! ```ignore
//! use memocache::{function_identity, CacheRegistry, MemoConfig, Memoizer, DAY};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(CacheRegistry::new());
//! let memoizer = Memoizer::new(registry, MemoConfig::new().with_ttl(DAY));
//!
//! let fetch = memoizer.wrap(function_identity!(fetch), |(url,): &(String,)| {
//!     download(url)
//! });
//! let page = fetch.call(&("https://example.com".to_string(),))?;
//! ```
//!
//! Entries are never evicted; the cache only grows or is overwritten.

pub mod backend;
pub mod clock;
pub mod codec;
pub mod error;
pub mod error_log;
pub mod keys;
pub mod memoize;
pub mod registry;

pub use backend::{Backend, BackendFactory, BackendKind, CacheEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, CacheResult, MemoError};
pub use error_log::ErrorLog;
pub use keys::{BackendHandle, CacheKey, FunctionIdentity, KeyDeriver, KeywordArgs};
pub use memoize::{
    memoize, MemoConfig, Memoized, Memoizer, DAY, FOREVER, HOUR, MINUTE, MONTH, SECOND, WEEK,
    YEAR,
};
pub use registry::CacheRegistry;

/// memocache version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// memocache crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
