// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache key derivation
//!
//! A cache key is the canonical encoding of `(function name, positional
//! args, keyword args)` (see [`crate::codec`]). The name is length-prefixed,
//! so the key is the name followed by the argument bytes with an unambiguous
//! boundary. Map entries are sorted, both inside arguments and across keyword
//! names, so neither the caller's keyword order nor a `HashMap`'s iteration
//! order changes the key.

use crate::codec::{decode_exact, to_canonical_bytes};
use crate::error::{CacheError, CacheResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha512};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Suffix marking a store derived from a source unit as a cache artifact
pub const CACHE_SUFFIX: &str = ".cache";

/// Extra suffix for the directory holding one file per key
pub const PER_KEY_DIR_SUFFIX: &str = "d";

/// Stable identity of a memoized function
///
/// `name` takes part in every key; `source` selects the physical store, so all
/// functions defined in one source file share a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionIdentity {
    name: String,
    source: String,
}

impl FunctionIdentity {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Handle of the store shared by every function of this source unit
    pub fn handle(&self) -> BackendHandle {
        BackendHandle::from_source(&self.source)
    }
}

/// Builds a [`FunctionIdentity`] from a function name and the calling file
///
/// ```ignore
/// let id = memocache::function_identity!(square);
/// assert_eq!(id.name(), "square");
/// ```
#[macro_export]
macro_rules! function_identity {
    ($name:ident) => {
        $crate::FunctionIdentity::new(stringify!($name), file!())
    };
    ($name:literal) => {
        $crate::FunctionIdentity::new($name, file!())
    };
}

/// Identifies one physical store
///
/// Derived from a source location: `<` and `>` are escaped so pseudo-files such
/// as `<stdin>` stay valid path components, and [`CACHE_SUFFIX`] is appended.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendHandle(String);

impl BackendHandle {
    pub fn from_source(source: &str) -> Self {
        let mut name = source.replace('<', "_lt_").replace('>', "_gt_");
        name.push_str(CACHE_SUFFIX);
        BackendHandle(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The handle as a path that always stays below a cache directory
    ///
    /// Root, drive prefix, `.` and `..` components are dropped.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.0)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect()
    }

    /// Location of the single shared store for this handle
    pub fn store_path(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join(self.relative_path())
    }

    /// Location of the per-key file directory for this handle
    pub fn per_key_dir(&self, cache_dir: &Path) -> PathBuf {
        let mut path = self.store_path(cache_dir).into_os_string();
        path.push(PER_KEY_DIR_SUFFIX);
        PathBuf::from(path)
    }
}

impl fmt::Display for BackendHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keyword arguments, ordered by name
///
/// Each value is held in its canonical encoding, which is exact: infinities,
/// NaN, `None` and `Some(())` all stay distinct and read back unchanged. A
/// value that fails to encode is remembered and reported when a key is
/// derived, which keeps the failure inside the cache subsystem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordArgs {
    values: BTreeMap<String, Vec<u8>>,
    rejected: Vec<String>,
}

impl KeywordArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`KeywordArgs::insert`]
    pub fn with<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<T: Serialize + ?Sized>(&mut self, name: impl Into<String>, value: &T) {
        let name = name.into();
        match to_canonical_bytes(value) {
            Ok(v) => {
                self.rejected.retain(|n| n != &name);
                self.values.insert(name, v);
            }
            Err(e) => {
                log::debug!("keyword argument '{}' is not encodable: {}", name, e);
                self.values.remove(&name);
                self.rejected.push(name);
            }
        }
    }

    /// Typed read of one argument; `None` if absent or not decodable as `T`
    ///
    /// The encoding carries no type tags, so read with the type that was
    /// inserted.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.values
            .get(name)
            .and_then(|bytes| decode_exact(bytes).ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.rejected.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Opaque, process-independent cache key
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<u8>);

impl CacheKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        CacheKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Fixed-length SHA-512 digest, hex encoded
    ///
    /// Used wherever the key must become a file name or travel over the wire.
    pub fn digest(&self) -> String {
        hex::encode(Sha512::digest(&self.0))
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", &self.digest()[..16])
    }
}

/// Turns a function identity plus its arguments into a [`CacheKey`]
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDeriver;

impl KeyDeriver {
    pub fn new() -> Self {
        KeyDeriver
    }

    pub fn derive<A: Serialize + ?Sized>(
        &self,
        function_name: &str,
        args: &A,
        kwargs: &KeywordArgs,
    ) -> CacheResult<CacheKey> {
        if !kwargs.rejected.is_empty() {
            return Err(CacheError::Serialization(format!(
                "keyword arguments not encodable: {}",
                kwargs.rejected.join(", ")
            )));
        }

        let bytes = to_canonical_bytes(&(function_name, args, &kwargs.values))?;
        Ok(CacheKey(bytes))
    }
}
