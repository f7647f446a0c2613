//! Deriva serves images and on-demand derivatives of them.
//!
//! A request such as `photos/cat_r200x100_q70.jpg` names a source file (`photos/cat.jpg`, or any
//! of its fallback extensions) plus a chain of directives encoded as `_`-separated suffixes:
//!
//! - `r<h>[x<w>]` resizes to `h` rows by `w` columns (square when `w` is absent)
//! - `o<h>x<w>[p|m<dy>][p|m<dx>]` crops an `h`×`w` region at the signed offset
//! - `q<n>` sets the encoder quality
//!
//! Directives apply from the source outward. Results are cached either next to the source on
//! disk, where shorter chains are reused and stale chains are swept by sampled timestamp checks,
//! or in an external key-value store with a time-to-live.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cache;
mod directive;
mod foundation;
mod resolve;
mod store;

pub(crate) mod codec;
/// Startup configuration.
pub mod config;
pub(crate) mod engine;
/// Logging setup.
pub mod logging;
/// HTTP routing and response mapping.
pub mod server;
/// Change notifications for the image root.
pub mod watch;

pub use crate::foundation::error::{DerivaError, DerivaResult};
pub use crate::foundation::hash::etag_for;
pub use crate::foundation::path::RequestPath;

pub use crate::cache::invalidate::{InvalidationSampler, Invalidator, Staleness};
pub use crate::codec::raster::{DEFAULT_MAX_PIXELS, RasterCodec};
pub use crate::codec::{ImageCodec, ImageHandle, content_type_for};
pub use crate::directive::executor::{ExecutionStats, execute};
pub use crate::directive::grammar::{
    Directive, DirectiveChain, DirectiveKind, DirectiveToken, parse as parse_directive,
};
pub use crate::engine::{CacheBackend, DerivativeEngine, EngineOpts, Origin, Served};
pub use crate::resolve::fallback::FallbackTable;
pub use crate::resolve::resolver::{AncestorLevel, ResolvedRequest, Resolver};
pub use crate::store::fs::{FileStat, FileSystem, LocalFs, MemoryFs};
pub use crate::store::kv::{Clock, KeyValueCache, ManualClock, MemoryCache, SystemClock};
pub use crate::store::redis::RedisCache;
