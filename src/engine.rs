//! Request-to-bytes engine shared by every HTTP worker.

use std::{path::Path, sync::Arc, time::Duration, time::SystemTime};

use crate::{
    cache::invalidate::{InvalidationSampler, Invalidator},
    codec::{ImageCodec, content_type_for, raster::RasterCodec},
    config::{CacheMode, ServerConfig},
    directive::{executor, grammar::DirectiveChain},
    foundation::error::DerivaResult,
    foundation::hash::etag_for,
    foundation::path::RequestPath,
    resolve::{
        fallback::FallbackTable,
        resolver::{ResolvedRequest, Resolver},
    },
    store::{fs::FileSystem, fs::LocalFs, kv::KeyValueCache, redis::RedisCache},
};

#[derive(Clone)]
/// Where computed derivatives are persisted.
pub enum CacheBackend {
    /// Written next to their source; shorter materialized chains are reused as bases.
    Disk,
    /// Stored in `cache` under the request path for `ttl`.
    Store {
        /// Shared store handle.
        cache: Arc<dyn KeyValueCache>,
        /// Entry time-to-live.
        ttl: Duration,
    },
}

#[derive(Clone, Debug)]
/// Tuning knobs for [`DerivativeEngine`].
pub struct EngineOpts {
    /// Fallback-extension table used by the resolver.
    pub fallbacks: FallbackTable,
    /// One request in this many runs a staleness check (disk mode).
    pub invalidation_interval: u64,
}

impl Default for EngineOpts {
    fn default() -> Self {
        Self {
            fallbacks: FallbackTable::default(),
            invalidation_interval: 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// How a response body was obtained.
pub enum Origin {
    /// Read from a file that already existed (a source or a materialized derivative).
    File,
    /// Computed by running a directive chain for this request.
    Derived,
    /// Returned by the key-value store.
    Cached,
}

#[derive(Clone, Debug)]
/// A successfully answered request.
pub struct Served {
    /// Response body.
    pub body: Vec<u8>,
    /// `Content-Type` derived from the request extension.
    pub content_type: &'static str,
    /// Modification time of the file the body came from; unknown for store hits.
    pub last_modified: Option<SystemTime>,
    /// Strong validator over `body`.
    pub etag: String,
    /// Provenance, for logging and tests.
    pub origin: Origin,
}

#[derive(Clone)]
/// Resolves request paths, runs directive chains and keeps derivatives fresh.
pub struct DerivativeEngine {
    fs: Arc<dyn FileSystem>,
    codec: Arc<dyn ImageCodec>,
    resolver: Resolver,
    invalidator: Invalidator,
    sampler: Arc<InvalidationSampler>,
    backend: CacheBackend,
}

impl DerivativeEngine {
    /// Engine over explicit capabilities.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        codec: Arc<dyn ImageCodec>,
        backend: CacheBackend,
        opts: EngineOpts,
    ) -> DerivaResult<Self> {
        let resolver = Resolver::new(fs.clone(), opts.fallbacks);
        let invalidator = Invalidator::new(fs.clone(), resolver.clone());
        let sampler = Arc::new(InvalidationSampler::new(opts.invalidation_interval)?);
        Ok(Self {
            fs,
            codec,
            resolver,
            invalidator,
            sampler,
            backend,
        })
    }

    /// Engine serving `root` with the raster codec and the backend selected by `cfg`.
    pub fn from_config(cfg: &ServerConfig, root: &Path) -> DerivaResult<Self> {
        let fallbacks = if cfg.fallback_extensions.is_empty() {
            FallbackTable::default()
        } else {
            FallbackTable::with_overrides(&cfg.fallback_extensions)
        };
        let backend = match cfg.cache_mode {
            CacheMode::Disk => CacheBackend::Disk,
            CacheMode::Store => CacheBackend::Store {
                cache: Arc::new(RedisCache::connect(&cfg.store_host, cfg.store_port)?),
                ttl: Duration::from_secs(cfg.ttl),
            },
        };
        Self::new(
            Arc::new(LocalFs::new(root)),
            Arc::new(RasterCodec::with_max_pixels(cfg.max_pixels)),
            backend,
            EngineOpts {
                fallbacks,
                invalidation_interval: cfg.invalidation_interval,
            },
        )
    }

    /// The filesystem the engine reads from and persists to.
    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Answer one request path (as decoded from the URL).
    #[tracing::instrument(skip(self), fields(mode = self.mode_name()))]
    pub fn serve(&self, raw: &str) -> DerivaResult<Served> {
        let path = RequestPath::parse(raw)?;
        let served = match &self.backend {
            CacheBackend::Disk => self.serve_disk(&path),
            CacheBackend::Store { cache, ttl } => self.serve_store(&path, cache.as_ref(), *ttl),
        }?;
        tracing::debug!(origin = ?served.origin, bytes = served.body.len(), "served");
        Ok(served)
    }

    fn mode_name(&self) -> &'static str {
        match self.backend {
            CacheBackend::Disk => "disk",
            CacheBackend::Store { .. } => "store",
        }
    }

    fn serve_disk(&self, path: &RequestPath) -> DerivaResult<Served> {
        let mut resolved = self.resolver.resolve(path)?;

        if self.sampler.should_check() {
            let on_disk = RequestPath::parse(resolved.on_disk_path())?;
            match self.invalidator.sweep(&on_disk) {
                Ok(true) => resolved = self.resolver.resolve(path)?,
                Ok(false) => {}
                Err(e) => tracing::warn!(path = %on_disk, error = %e, "stale chain not fully removed"),
            }
        }

        match resolved {
            ResolvedRequest::Direct { path: file, stat } => {
                let body = self.fs.read(&file)?;
                let modified = self.source_modified(&file, stat.modified);
                Ok(self.served(path, body, Some(modified), Origin::File))
            }
            ResolvedRequest::Derived {
                source,
                source_stat,
                chain,
                extension,
            } => {
                let body = self.derive(path, &source, &chain, &extension)?;
                // A bare conversion has no suffix chain to invalidate through, so it is never stored.
                if chain.is_empty() {
                    tracing::debug!(%path, %source, "converted without persisting");
                } else {
                    match self.fs.write(path.as_str(), &body) {
                        Ok(()) => tracing::info!(%path, %source, "materialized derivative"),
                        Err(e) => tracing::warn!(%path, error = %e, "derivative not persisted"),
                    }
                }
                let modified = self.source_modified(&source, source_stat.modified);
                Ok(self.served(path, body, Some(modified), Origin::Derived))
            }
        }
    }

    fn serve_store(
        &self,
        path: &RequestPath,
        cache: &dyn KeyValueCache,
        ttl: Duration,
    ) -> DerivaResult<Served> {
        let key = path.as_str();
        match cache.get(key) {
            Ok(Some(body)) => return Ok(self.served(path, body, None, Origin::Cached)),
            Ok(None) => {}
            Err(e) => tracing::warn!(%path, error = %e, "store lookup failed, computing uncached"),
        }

        match self.resolver.resolve(path)? {
            ResolvedRequest::Direct { path: file, stat } => {
                let body = self.fs.read(&file)?;
                let modified = self.source_modified(&file, stat.modified);
                Ok(self.served(path, body, Some(modified), Origin::File))
            }
            ResolvedRequest::Derived {
                source,
                source_stat,
                chain,
                extension,
            } => {
                let body = self.derive(path, &source, &chain, &extension)?;
                let stored = cache.set(key, &body).and_then(|()| cache.expire(key, ttl));
                if let Err(e) = stored {
                    tracing::warn!(%path, error = %e, "derivative not stored");
                }
                let modified = self.source_modified(&source, source_stat.modified);
                Ok(self.served(path, body, Some(modified), Origin::Derived))
            }
        }
    }

    fn derive(
        &self,
        path: &RequestPath,
        source: &str,
        chain: &DirectiveChain,
        extension: &str,
    ) -> DerivaResult<Vec<u8>> {
        let bytes = self.fs.read(source)?;
        let (body, stats) = executor::execute(self.codec.as_ref(), &bytes, chain, extension)?;
        tracing::debug!(
            %path,
            %source,
            applied = stats.applied,
            skipped = stats.skipped,
            "executed chain"
        );
        Ok(body)
    }

    /// Modification time of the original file `file` was generated from, or `fallback` when
    /// `file` is itself an original.
    fn source_modified(&self, file: &str, fallback: SystemTime) -> SystemTime {
        RequestPath::parse(file)
            .ok()
            .and_then(|p| self.resolver.ancestry(&p).pop())
            .map_or(fallback, |root| root.stat.modified)
    }

    fn served(
        &self,
        path: &RequestPath,
        body: Vec<u8>,
        last_modified: Option<SystemTime>,
        origin: Origin,
    ) -> Served {
        Served {
            etag: etag_for(&body),
            content_type: content_type_for(path.extension()),
            body,
            last_modified,
            origin,
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/engine.rs"]
mod tests;
