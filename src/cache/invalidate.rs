//! Sampled staleness checks for on-disk derivatives.
//!
//! A derivative is stale when any existing file on its suffix chain (intermediate derivatives or
//! the true source) was modified or changed after the derivative itself. Stale chains are removed
//! wholesale: the derivative and every intermediate, never the source.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    foundation::error::{DerivaError, DerivaResult},
    foundation::path::RequestPath,
    resolve::resolver::Resolver,
    store::fs::FileSystem,
};

/// Decides which requests pay for a staleness check.
///
/// The counter is shared by all workers and uses relaxed atomics, so the cadence is approximate
/// under concurrency: roughly one request in `interval` is checked. Nothing relies on the exact
/// cadence.
#[derive(Debug)]
pub struct InvalidationSampler {
    counter: AtomicU64,
    mask: u64,
}

impl InvalidationSampler {
    /// Check one request in `interval`; `interval` must be a non-zero power of two.
    pub fn new(interval: u64) -> DerivaResult<Self> {
        if !interval.is_power_of_two() {
            return Err(DerivaError::config_fatal(format!(
                "invalidation interval {interval} is not a power of two"
            )));
        }
        Ok(Self {
            counter: AtomicU64::new(0),
            mask: interval - 1,
        })
    }

    /// Advance the counter; true when this request should run a staleness check.
    pub fn should_check(&self) -> bool {
        (self.counter.fetch_add(1, Ordering::Relaxed) & self.mask) == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Result of a staleness check.
pub enum Staleness {
    /// The file is a true source, or no ancestor is newer than it.
    Fresh,
    /// An ancestor is newer; `doomed` lists the files to delete, requested derivative first.
    Stale {
        /// Derivative plus intermediates, excluding the true source.
        doomed: Vec<String>,
    },
}

#[derive(Clone)]
/// Compares a derivative's timestamp against its ancestors and deletes stale chains.
pub struct Invalidator {
    fs: Arc<dyn FileSystem>,
    resolver: Resolver,
}

impl Invalidator {
    /// Invalidator walking chains with `resolver` and deleting through `fs`.
    pub fn new(fs: Arc<dyn FileSystem>, resolver: Resolver) -> Self {
        Self { fs, resolver }
    }

    /// Inspect the chain of `derivative` without modifying anything.
    pub fn check(&self, derivative: &RequestPath) -> Staleness {
        let Some(stat) = self.fs.stat(derivative.as_str()).filter(|s| s.is_file) else {
            return Staleness::Fresh;
        };
        let levels = self.resolver.ancestry(derivative);
        let Some((_source, intermediates)) = levels.split_last() else {
            return Staleness::Fresh;
        };

        let newer = levels
            .iter()
            .find(|level| level.stat.newest() > stat.modified);
        let Some(newer) = newer else {
            return Staleness::Fresh;
        };

        tracing::debug!(%derivative, ancestor = %newer.path, "derivative is older than an ancestor");
        let mut doomed = vec![derivative.as_str().to_string()];
        doomed.extend(intermediates.iter().map(|l| l.path.clone()));
        Staleness::Stale { doomed }
    }

    /// True when `derivative` is older than some ancestor on its chain.
    pub fn is_stale(&self, derivative: &RequestPath) -> bool {
        matches!(self.check(derivative), Staleness::Stale { .. })
    }

    /// Check `derivative` and delete its chain when stale; returns whether anything was stale.
    pub fn sweep(&self, derivative: &RequestPath) -> DerivaResult<bool> {
        let Staleness::Stale { doomed } = self.check(derivative) else {
            return Ok(false);
        };
        for path in &doomed {
            if self.fs.remove(path)? {
                tracing::info!(%path, "removed stale derivative");
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/invalidate.rs"]
mod tests;
