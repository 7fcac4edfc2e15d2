// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 weftworks

//! Concurrent field-access cache.
//!
//! The FieldCache ensures that the per-type accessor-table build happens only
//! once per record type. Subsequent lookups are served via a cheap read lock,
//! and statistics use atomics so the hit path takes no write lock. Concurrent
//! first-time lookups for one unseen type are single-flighted: the build runs
//! under the map's write lock, so every concurrent caller blocks until the one
//! build completes and then receives the same descriptor instance.
//!
//! The cache carries an explicit enable/disable switch held as one swappable
//! state instance. Disabled, every call goes through the uncached
//! build-per-call path without populating or reading the map; this is the
//! correctness baseline for tests and benchmarks.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use super::descriptor::{DescriptorError, FieldAccess, FieldError, TypeDescriptor, TypeKey};

/// Cache operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Enabled,
    Disabled,
}

/// The one piece of swappable cache state: the current mode.
#[derive(Debug)]
struct CacheState {
    mode: CacheMode,
}

/// Lookup statistics snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct LookupStats {
    /// Cached-path lookups that found a descriptor.
    pub hits: u64,
    /// Cached-path lookups that had to build.
    pub misses: u64,
    /// Total descriptor builds, on either path.
    pub builds: u64,
}

/// Concurrency-safe store mapping record-type identity to its descriptor.
pub struct FieldCache {
    inner: RwLock<HashMap<TypeKey, Arc<TypeDescriptor>>>,
    state: ArcSwap<CacheState>,
    builds: DashMap<TypeKey, u64>,
    hits: AtomicU64,
    misses: AtomicU64,
    total_builds: AtomicU64,
}

impl FieldCache {
    /// Create a cache in [`CacheMode::Disabled`]: callers fall through to the
    /// uncached build path until someone opts in via [`enable`](Self::enable).
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(CacheMode::Disabled)
    }

    /// Create a cache with an explicit initial mode.
    #[must_use]
    pub fn with_mode(mode: CacheMode) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            state: ArcSwap::from_pointee(CacheState { mode }),
            builds: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            total_builds: AtomicU64::new(0),
        }
    }

    /// Restore cache use for future calls.
    ///
    /// Safe to call concurrently with in-flight lookups; already-resolved
    /// descriptors are unaffected.
    pub fn enable(&self) {
        self.state.store(Arc::new(CacheState {
            mode: CacheMode::Enabled,
        }));
        log::debug!("[field-cache] enabled");
    }

    /// Force future calls through the uncached build-per-call path.
    pub fn disable(&self) {
        self.state.store(Arc::new(CacheState {
            mode: CacheMode::Disabled,
        }));
        log::debug!("[field-cache] disabled");
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state.load().mode == CacheMode::Enabled
    }

    /// Descriptor for the record type `R`, building on first use.
    ///
    /// Enabled, this returns the same `Arc` for every call after the first;
    /// disabled, it builds a fresh descriptor per call.
    pub fn descriptor<R: FieldAccess>(&self) -> Result<Arc<TypeDescriptor>, FieldError> {
        self.get_or_try_build(TypeKey::of::<R>(), R::field_descriptor)
            .map_err(FieldError::Build)
    }

    /// Look up `key`, building via `build` on a miss.
    ///
    /// Build errors are returned without caching anything; the next call for
    /// the same key retries the build. The closure must not re-enter the
    /// cache: it runs under the map's write lock.
    pub fn get_or_try_build<F>(
        &self,
        key: TypeKey,
        build: F,
    ) -> Result<Arc<TypeDescriptor>, DescriptorError>
    where
        F: FnOnce() -> Result<TypeDescriptor, DescriptorError>,
    {
        if !self.is_enabled() {
            self.record_build(key);
            return build().map(Arc::new);
        }

        if let Some(hit) = self.try_peek(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        let mut map = self.inner.write();
        if let Some(hit) = map.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(hit));
        }

        self.record_build(key);
        let built = Arc::new(build()?);
        map.insert(key, Arc::clone(&built));
        self.misses.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "[field-cache] built descriptor for {} ({} fields)",
            built.type_name(),
            built.len()
        );
        Ok(built)
    }

    /// Set a field by name on `record`, resolving through this cache.
    pub fn set_field<R: FieldAccess, V: Any>(
        &self,
        record: &mut R,
        name: &str,
        value: V,
    ) -> Result<(), FieldError> {
        let descriptor = self.descriptor::<R>()?;
        descriptor.set(record, name, value)
    }

    /// Read a field by name from `record`, resolving through this cache.
    pub fn get_field<R: FieldAccess, V: Any>(
        &self,
        record: &R,
        name: &str,
    ) -> Result<V, FieldError> {
        let descriptor = self.descriptor::<R>()?;
        descriptor.get(record, name)
    }

    /// Statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> LookupStats {
        LookupStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            builds: self.total_builds.load(Ordering::Relaxed),
        }
    }

    /// Number of descriptor builds performed for `key`, on either path.
    #[must_use]
    pub fn builds_for(&self, key: &TypeKey) -> u64 {
        self.builds.get(key).map_or(0, |count| *count)
    }

    /// Number of cached descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    fn try_peek(&self, key: &TypeKey) -> Option<Arc<TypeDescriptor>> {
        let map = self.inner.read();
        map.get(key).map(Arc::clone)
    }

    fn record_build(&self, key: TypeKey) {
        *self.builds.entry(key).or_insert(0) += 1;
        self.total_builds.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for FieldCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide default cache for consumers that do not inject their own.
///
/// Constructed enabled: this instance is the composition root's opt-in.
/// Independent instances for tests come from [`FieldCache::new`] /
/// [`FieldCache::with_mode`].
#[must_use]
pub fn default_cache() -> &'static FieldCache {
    static DEFAULT: OnceLock<FieldCache> = OnceLock::new();
    DEFAULT.get_or_init(|| FieldCache::with_mode(CacheMode::Enabled))
}

#[cfg(test)]
mod tests;
