// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Network backend
//!
//! Delegates storage to an external key-value service. Keys are replaced by
//! their SHA-512 digest before they leave the process, which bounds their
//! length whatever the arguments were.

use super::traits::Backend;
use super::types::{BackendKind, CacheEntry};
use crate::error::{CacheError, CacheResult};
use crate::keys::{BackendHandle, CacheKey};

/// Default endpoint of the remote cache service
pub const DEFAULT_REMOTE_URL: &str = "redis://127.0.0.1:6379/";

/// Client for a remote key-value service
pub trait RemoteStore: Send + Sync {
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store a value; `Ok(false)` means the service refused the write
    fn set(&self, key: &str, value: &[u8]) -> CacheResult<bool>;

    fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Human-readable location of the service
    fn endpoint(&self) -> String;
}

/// Backend that keeps entries in a [`RemoteStore`]
pub struct NetworkBackend {
    store: Box<dyn RemoteStore>,
}

impl NetworkBackend {
    pub fn new(store: Box<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub fn endpoint(&self) -> String {
        self.store.endpoint()
    }
}

impl Backend for NetworkBackend {
    fn setup(&mut self, handle: &BackendHandle) -> CacheResult<()> {
        // The remote namespace is shared; the handle only matters locally
        log::debug!(
            "using remote cache at {} for {}",
            self.store.endpoint(),
            handle
        );
        Ok(())
    }

    fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.store.get(&key.digest())?.is_some())
    }

    fn get(&self, key: &CacheKey) -> CacheResult<CacheEntry> {
        match self.store.get(&key.digest())? {
            Some(bytes) => CacheEntry::decode(&bytes),
            None => Err(CacheError::KeyNotFound(format!("{:?}", key))),
        }
    }

    fn put(&self, key: &CacheKey, entry: &CacheEntry) -> CacheResult<()> {
        if self.store.set(&key.digest(), &entry.encode()?)? {
            Ok(())
        } else {
            Err(CacheError::Storage(format!(
                "remote cache at {} rejected the write",
                self.store.endpoint()
            )))
        }
    }

    fn remove(&self, key: &CacheKey) -> CacheResult<bool> {
        self.store.delete(&key.digest())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Network
    }
}

#[cfg(feature = "redis-backend")]
pub use self::redis_store::RedisStore;

#[cfg(feature = "redis-backend")]
mod redis_store {
    use super::RemoteStore;
    use crate::error::{CacheError, CacheResult};
    use parking_lot::Mutex;
    use redis::Commands;

    impl From<redis::RedisError> for CacheError {
        fn from(e: redis::RedisError) -> Self {
            CacheError::Storage(e.to_string())
        }
    }

    /// [`RemoteStore`] backed by a Redis server
    ///
    /// One connection is opened on first use and reused. It is dropped when
    /// it breaks and the next operation reconnects.
    pub struct RedisStore {
        client: redis::Client,
        url: String,
        connection: Mutex<Option<redis::Connection>>,
    }

    impl RedisStore {
        /// Validate `url`; no connection is made until the first operation
        pub fn open(url: &str) -> CacheResult<Self> {
            let client = redis::Client::open(url)?;
            Ok(Self {
                client,
                url: url.to_string(),
                connection: Mutex::new(None),
            })
        }

        /// Whether a live connection is currently held
        pub fn is_connected(&self) -> bool {
            self.connection.lock().is_some()
        }

        fn with_connection<T>(
            &self,
            op: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
        ) -> CacheResult<T> {
            let mut slot = self.connection.lock();
            let mut conn = match slot.take() {
                Some(conn) => conn,
                None => self.client.get_connection()?,
            };

            let result = op(&mut conn);
            let broken = matches!(&result, Err(e) if e.is_io_error() || e.is_connection_dropped());
            if !broken {
                *slot = Some(conn);
            }
            Ok(result?)
        }
    }

    impl RemoteStore for RedisStore {
        fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
            self.with_connection(|conn| conn.get(key))
        }

        fn set(&self, key: &str, value: &[u8]) -> CacheResult<bool> {
            let reply: redis::Value =
                self.with_connection(|conn| redis::cmd("SET").arg(key).arg(value).query(conn))?;
            Ok(matches!(reply, redis::Value::Okay))
        }

        fn delete(&self, key: &str) -> CacheResult<bool> {
            let removed: usize = self.with_connection(|conn| conn.del(key))?;
            Ok(removed > 0)
        }

        fn endpoint(&self) -> String {
            self.url.clone()
        }
    }

}
