// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Memoizing wrapper
//!
//! A [`Memoized`] wrapper derives a key from the call arguments, serves a
//! fresh cached value when there is one, and otherwise invokes the function
//! and writes the result through to the backend.
//!
//! Cache failures are contained: each one is recorded in the error log, then
//! either swallowed (`fail_silently`) or returned as [`MemoError::Cache`].
//! Errors from the function itself always come back as
//! [`MemoError::Function`], untouched.
//!
//! Policies for the two ambiguous cases:
//! - a failed read with `fail_silently` off returns the error before the
//!   function runs;
//! - a failed store with `fail_silently` off returns the error and the
//!   computed value is dropped.

pub mod config;

pub use config::{
    MemoConfig, DAY, DEFAULT_CACHE_DIR, ERROR_LOG_FILE, FOREVER, HOUR, MINUTE, MONTH, SECOND,
    WEEK, YEAR,
};

use crate::backend::{Backend, BackendFactory, CacheEntry};
use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, CacheResult, MemoError};
use crate::error_log::ErrorLog;
use crate::keys::{BackendHandle, CacheKey, FunctionIdentity, KeyDeriver, KeywordArgs};
use crate::registry::CacheRegistry;
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;

type SharedFactory = Arc<dyn BackendFactory + Send + Sync>;

/// Wrap `function` with the default configuration
pub fn memoize<F>(
    registry: Arc<CacheRegistry>,
    identity: FunctionIdentity,
    function: F,
) -> Memoized<F> {
    Memoizer::new(registry, MemoConfig::default()).wrap(identity, function)
}

/// Produces wrappers that share one configuration and registry
pub struct Memoizer {
    registry: Arc<CacheRegistry>,
    config: MemoConfig,
    factory: SharedFactory,
    clock: Arc<dyn Clock>,
    error_log: ErrorLog,
}

impl Memoizer {
    pub fn new(registry: Arc<CacheRegistry>, config: MemoConfig) -> Self {
        Self {
            factory: Arc::new(config.backend_options()),
            error_log: ErrorLog::new(config.error_log.clone()),
            clock: Arc::new(SystemClock),
            registry,
            config,
        }
    }

    /// Build backends with `factory` instead of the configured backend kind
    pub fn with_backend_factory<B>(mut self, factory: B) -> Self
    where
        B: BackendFactory + Send + Sync + 'static,
    {
        self.factory = Arc::new(factory);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &MemoConfig {
        &self.config
    }

    pub fn wrap<F>(&self, identity: FunctionIdentity, function: F) -> Memoized<F> {
        Memoized {
            handle: identity.handle(),
            identity,
            ttl: self.config.ttl,
            fail_silently: self.config.fail_silently,
            registry: self.registry.clone(),
            factory: self.factory.clone(),
            backend: OnceCell::new(),
            deriver: KeyDeriver::new(),
            clock: self.clock.clone(),
            error_log: self.error_log.clone(),
            function,
        }
    }
}

/// A function together with its cache
pub struct Memoized<F> {
    identity: FunctionIdentity,
    handle: BackendHandle,
    ttl: Option<Duration>,
    fail_silently: bool,
    registry: Arc<CacheRegistry>,
    factory: SharedFactory,
    backend: OnceCell<Weak<dyn Backend>>,
    deriver: KeyDeriver,
    clock: Arc<dyn Clock>,
    error_log: ErrorLog,
    function: F,
}

impl<F> Memoized<F> {
    pub fn identity(&self) -> &FunctionIdentity {
        &self.identity
    }

    pub fn handle(&self) -> &BackendHandle {
        &self.handle
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn fails_silently(&self) -> bool {
        self.fail_silently
    }

    /// Call a function that takes positional arguments only
    pub fn call<A, R, E>(&self, args: &A) -> Result<R, MemoError<E>>
    where
        F: Fn(&A) -> Result<R, E>,
        A: Serialize + ?Sized,
        R: Serialize + DeserializeOwned,
    {
        let key = self.key_for(args, &KeywordArgs::new());
        self.run(key, || (self.function)(args))
    }

    /// Call a function that takes positional and keyword arguments
    pub fn call_with<A, R, E>(&self, args: &A, kwargs: &KeywordArgs) -> Result<R, MemoError<E>>
    where
        F: Fn(&A, &KeywordArgs) -> Result<R, E>,
        A: Serialize + ?Sized,
        R: Serialize + DeserializeOwned,
    {
        let key = self.key_for(args, kwargs);
        self.run(key, || (self.function)(args, kwargs))
    }

    /// The key a call with these arguments reads and writes
    pub fn key_for<A: Serialize + ?Sized>(
        &self,
        args: &A,
        kwargs: &KeywordArgs,
    ) -> CacheResult<CacheKey> {
        self.deriver.derive(self.identity.name(), args, kwargs)
    }

    /// Drop the cached value for one argument combination
    pub fn invalidate<A: Serialize + ?Sized>(
        &self,
        args: &A,
        kwargs: &KeywordArgs,
    ) -> CacheResult<bool> {
        let key = self.key_for(args, kwargs)?;
        self.backend()?.remove(&key)
    }

    /// The backend this wrapper reads and writes, resolved on first use
    pub fn backend(&self) -> CacheResult<Arc<dyn Backend>> {
        let link = self.backend.get_or_try_init(|| {
            self.registry
                .resolve(&self.handle, self.factory.as_ref())
                .map(|backend| Arc::downgrade(&backend))
        })?;
        link.upgrade()
            .ok_or_else(|| CacheError::RegistryClosed(self.handle.to_string()))
    }

    fn run<R, E>(
        &self,
        key: CacheResult<CacheKey>,
        invoke: impl FnOnce() -> Result<R, E>,
    ) -> Result<R, MemoError<E>>
    where
        R: Serialize + DeserializeOwned,
    {
        let key = match key {
            Ok(key) => Some(key),
            Err(e) => {
                self.contain(e)?;
                None
            }
        };

        let backend = match &key {
            Some(_) => match self.backend() {
                Ok(backend) => Some(backend),
                Err(e) => {
                    self.contain(e)?;
                    None
                }
            },
            None => None,
        };

        if let (Some(key), Some(backend)) = (&key, &backend) {
            match self.lookup(backend.as_ref(), key) {
                Ok(Some(value)) => {
                    log::debug!("{}: served {:?} from cache", self.identity.name(), key);
                    return Ok(value);
                }
                Ok(None) => {}
                Err(e) => self.contain(e)?,
            }
        }

        let value = invoke().map_err(MemoError::Function)?;

        if let (Some(key), Some(backend)) = (&key, &backend) {
            if let Err(e) = self.store(backend.as_ref(), key, &value) {
                self.contain(e)?;
            }
        }

        Ok(value)
    }

    /// A fresh cached value, or `None` on a miss or stale entry
    fn lookup<R: DeserializeOwned>(
        &self,
        backend: &dyn Backend,
        key: &CacheKey,
    ) -> CacheResult<Option<R>> {
        if !backend.contains(key)? {
            return Ok(None);
        }

        let entry = match backend.get(key) {
            Ok(entry) => entry,
            // Removed between contains and get
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        if !entry.is_fresh(self.ttl, self.clock.now()) {
            log::debug!("{}: entry {:?} is stale", self.identity.name(), key);
            return Ok(None);
        }

        Ok(Some(bincode::deserialize(&entry.data)?))
    }

    fn store<R: Serialize>(&self, backend: &dyn Backend, key: &CacheKey, value: &R) -> CacheResult<()> {
        let entry = CacheEntry::new(self.clock.now(), bincode::serialize(value)?);
        backend.put(key, &entry)
    }

    /// Log a cache failure, then swallow or surface it
    fn contain<E>(&self, error: CacheError) -> Result<(), MemoError<E>> {
        self.error_log.record(&format!(
            "{} ({}): {}",
            self.identity.name(),
            self.identity.source(),
            error
        ));
        if self.fail_silently {
            Ok(())
        } else {
            Err(MemoError::Cache(error))
        }
    }
}

impl<F> std::fmt::Debug for Memoized<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memoized")
            .field("identity", &self.identity)
            .field("handle", &self.handle)
            .field("ttl", &self.ttl)
            .field("fail_silently", &self.fail_silently)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::clock::ManualClock;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memoizer(clock: &Arc<ManualClock>, ttl: Option<Duration>) -> Memoizer {
        let config = MemoConfig {
            ttl,
            backend: BackendKind::Memory,
            ..MemoConfig::default()
        }
        .without_error_log();
        Memoizer::new(Arc::new(CacheRegistry::new()), config).with_clock(clock.clone())
    }

    #[test]
    fn test_hit_skips_invocation() {
        let clock = Arc::new(ManualClock::new(1_000.0));
        let calls = AtomicUsize::new(0);
        let square = memoizer(&clock, Some(Duration::from_secs(100))).wrap(
            FunctionIdentity::new("square", "src/math.rs"),
            |&(x,): &(u64,)| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(x * x)
            },
        );

        assert_eq!(square.call(&(5,)).unwrap(), 25);
        assert_eq!(square.call(&(5,)).unwrap(), 25);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(square.call(&(7,)).unwrap(), 49);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_entry_expires_at_ttl_boundary() {
        let clock = Arc::new(ManualClock::new(1_000.0));
        let calls = AtomicUsize::new(0);
        let stamp = memoizer(&clock, Some(Duration::from_secs(10))).wrap(
            FunctionIdentity::new("stamp", "src/t.rs"),
            |_: &()| Ok::<_, Infallible>(calls.fetch_add(1, Ordering::SeqCst)),
        );

        assert_eq!(stamp.call(&()).unwrap(), 0);
        clock.set(1_009.9);
        assert_eq!(stamp.call(&()).unwrap(), 0);
        clock.set(1_010.0);
        assert_eq!(stamp.call(&()).unwrap(), 1);
        // The recomputed value starts a new window
        clock.set(1_015.0);
        assert_eq!(stamp.call(&()).unwrap(), 1);
    }

    #[test]
    fn test_forever_never_expires() {
        let clock = Arc::new(ManualClock::new(0.0));
        let calls = AtomicUsize::new(0);
        let f = memoizer(&clock, FOREVER).wrap(
            FunctionIdentity::new("f", "src/t.rs"),
            |_: &()| Ok::<_, Infallible>(calls.fetch_add(1, Ordering::SeqCst)),
        );

        f.call(&()).unwrap();
        clock.advance(YEAR.as_secs_f64() * 50.0);
        f.call(&()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_keyword_arguments() {
        let clock = Arc::new(ManualClock::new(0.0));
        let calls = AtomicUsize::new(0);
        let scale = memoizer(&clock, None).wrap(
            FunctionIdentity::new("scale", "src/t.rs"),
            |&(x,): &(f64,), kwargs: &KeywordArgs| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(x * kwargs.get::<f64>("factor").unwrap_or(1.0))
            },
        );

        let a = KeywordArgs::new().with("factor", &2.0).with("label", "x");
        let b = KeywordArgs::new().with("label", "x").with("factor", &2.0);
        assert_eq!(scale.call_with(&(3.0,), &a).unwrap(), 6.0);
        assert_eq!(scale.call_with(&(3.0,), &b).unwrap(), 6.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let c = KeywordArgs::new().with("factor", &3.0).with("label", "x");
        assert_eq!(scale.call_with(&(3.0,), &c).unwrap(), 9.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_infinite_keyword_values_reach_the_function() {
        let clock = Arc::new(ManualClock::new(0.0));
        let calls = AtomicUsize::new(0);
        let sign = memoizer(&clock, None).wrap(
            FunctionIdentity::new("sign", "src/t.rs"),
            |_: &(), kwargs: &KeywordArgs| {
                calls.fetch_add(1, Ordering::SeqCst);
                let label = match kwargs.get::<f64>("x") {
                    Some(x) if x > 0.0 => "positive",
                    Some(x) if x < 0.0 => "negative",
                    Some(_) => "other",
                    None => "none",
                };
                Ok::<_, Infallible>(label.to_string())
            },
        );

        let pos = KeywordArgs::new().with("x", &f64::INFINITY);
        let neg = KeywordArgs::new().with("x", &f64::NEG_INFINITY);
        assert_eq!(sign.call_with(&(), &pos).unwrap(), "positive");
        assert_eq!(sign.call_with(&(), &neg).unwrap(), "negative");
        assert_eq!(sign.call_with(&(), &pos).unwrap(), "positive");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_hash_map_arguments_hit_the_cache() {
        let clock = Arc::new(ManualClock::new(0.0));
        let calls = AtomicUsize::new(0);
        let total = memoizer(&clock, None).wrap(
            FunctionIdentity::new("total", "src/t.rs"),
            |(prices,): &(std::collections::HashMap<String, u32>,)| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(prices.values().sum::<u32>())
            },
        );

        for _ in 0..10 {
            let prices: std::collections::HashMap<String, u32> =
                (0..16).map(|i| (format!("item{i}"), i)).collect();
            assert_eq!(total.call(&(prices,)).unwrap(), 120);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_function_error_passes_through_and_is_not_cached() {
        let clock = Arc::new(ManualClock::new(0.0));
        let calls = AtomicUsize::new(0);
        let parse = memoizer(&clock, None).wrap(
            FunctionIdentity::new("parse", "src/t.rs"),
            |(s,): &(String,)| {
                calls.fetch_add(1, Ordering::SeqCst);
                s.parse::<i32>().map_err(|e| e.to_string())
            },
        );

        let err = parse.call(&("nope".to_string(),)).unwrap_err();
        assert_eq!(err.into_function_error().as_deref(), Some("invalid digit found in string"));
        parse.call(&("nope".to_string(),)).unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_eq!(parse.call(&("12".to_string(),)).unwrap(), 12);
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let clock = Arc::new(ManualClock::new(0.0));
        let calls = AtomicUsize::new(0);
        let f = memoizer(&clock, None).wrap(
            FunctionIdentity::new("f", "src/t.rs"),
            |&(x,): &(i32,)| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(x + 1)
            },
        );

        f.call(&(1,)).unwrap();
        assert!(f.invalidate(&(1,), &KeywordArgs::new()).unwrap());
        assert!(!f.invalidate(&(1,), &KeywordArgs::new()).unwrap());
        f.call(&(1,)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_functions_of_one_source_share_a_backend() {
        let clock = Arc::new(ManualClock::new(0.0));
        let memoizer = memoizer(&clock, None);
        let double = memoizer.wrap(FunctionIdentity::new("double", "src/m.rs"), |&(x,): &(i32,)| {
            Ok::<_, Infallible>(x * 2)
        });
        let triple = memoizer.wrap(FunctionIdentity::new("triple", "src/m.rs"), |&(x,): &(i32,)| {
            Ok::<_, Infallible>(x * 3)
        });
        let other = memoizer.wrap(FunctionIdentity::new("double", "src/n.rs"), |&(x,): &(i32,)| {
            Ok::<_, Infallible>(x * 2)
        });

        // Same argument, different functions: distinct keys in one store
        assert_eq!(double.call(&(4,)).unwrap(), 8);
        assert_eq!(triple.call(&(4,)).unwrap(), 12);

        assert!(Arc::ptr_eq(&double.backend().unwrap(), &triple.backend().unwrap()));
        assert!(!Arc::ptr_eq(&double.backend().unwrap(), &other.backend().unwrap()));
    }

    #[test]
    fn test_undecodable_cached_value_is_cache_error() {
        let clock = Arc::new(ManualClock::new(0.0));
        let memoizer = memoizer(&clock, None);
        let id = FunctionIdentity::new("f", "src/t.rs");
        let f = memoizer.wrap(id, |_: &()| Ok::<_, Infallible>(String::from("text")));

        // Plant a record whose payload cannot decode as a String
        let key = f.key_for(&(), &KeywordArgs::new()).unwrap();
        f.backend()
            .unwrap()
            .put(&key, &CacheEntry::new(0.0, vec![0xff; 3]))
            .unwrap();

        let err = f.call(&()).unwrap_err();
        assert!(matches!(err.as_cache_error(), Some(CacheError::Serialization(_))));
    }
}
