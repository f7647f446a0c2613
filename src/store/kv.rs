//! External key-value store used by `store` cache mode.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::foundation::error::{DerivaError, DerivaResult};

/// Byte-blob cache keyed by request path.
///
/// Implementations report transport failures as [`DerivaError::StoreUnavailable`]; the engine
/// treats those as cache misses and keeps serving.
pub trait KeyValueCache: Send + Sync {
    /// Cached blob for `key`, or `None` on a miss.
    fn get(&self, key: &str) -> DerivaResult<Option<Vec<u8>>>;

    /// Store `value` under `key`. Any expiry previously set on `key` is cleared.
    fn set(&self, key: &str, value: &[u8]) -> DerivaResult<()>;

    /// Drop `key` once `ttl` has elapsed.
    fn expire(&self, key: &str, ttl: Duration) -> DerivaResult<()>;
}

/// Monotonic time source for [`MemoryCache`] expiry.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
/// Wall clock backed by [`Instant::now`].
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
/// Clock that only moves when told to.
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().map(|o| *o).unwrap_or_default();
        self.base + offset
    }
}

#[derive(Clone, Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-process [`KeyValueCache`] with per-key expiry.
///
/// Expired entries are dropped lazily on access.
pub struct MemoryCache<C: Clock = SystemClock> {
    entries: Mutex<HashMap<String, Entry>>,
    clock: C,
}

impl MemoryCache<SystemClock> {
    /// Empty cache on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryCache<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryCache<C> {
    /// Empty cache measuring expiry with `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// The clock driving expiry.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .map(|e| e.values().filter(|v| !v.is_expired(now)).count())
            .unwrap_or(0)
    }

    /// True when no live entry remains.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> DerivaResult<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| DerivaError::store_unavailable("memory cache lock poisoned"))
    }
}

impl<C: Clock> KeyValueCache for MemoryCache<C> {
    fn get(&self, key: &str) -> DerivaResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(e) if e.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(e) => Ok(Some(e.value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> DerivaResult<()> {
        self.lock()?.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: None,
            },
        );
        Ok(())
    }

    fn expire(&self, key: &str, ttl: Duration) -> DerivaResult<()> {
        let at = self.clock.now() + ttl;
        if let Some(e) = self.lock()?.get_mut(key) {
            e.expires_at = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/store/kv.rs"]
mod tests;
