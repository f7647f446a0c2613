//! Server configuration: a flat JSON document loaded once at startup.

use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    codec::raster::DEFAULT_MAX_PIXELS,
    foundation::error::{DerivaError, DerivaResult},
};

/// Where derivatives are kept between requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Next to their source under the image root.
    #[default]
    Disk,
    /// In an external key-value store, keyed by request path.
    Store,
}

/// Every option the server reads at startup. Missing keys take their defaults.
///
/// Keys the server does not read (including the older `proportion`, `true_bmp` and `maxmem`)
/// are collected in [`ServerConfig::ignored`] instead of failing the load.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Image root; the process enters it before serving.
    pub img_root: PathBuf,
    /// Listening port.
    pub port: u16,
    /// Listening address.
    pub bind: IpAddr,
    /// Verbosity, 0 (errors only) to 4 (trace).
    pub log_level: u8,
    /// Optional log file; stderr when absent.
    pub log_file: Option<PathBuf>,
    /// Derivative persistence strategy.
    pub cache_mode: CacheMode,
    /// Seconds advertised through `Cache-Control` and `Expires`; 0 disables both.
    pub max_age: u64,
    /// Asset served as the body of 404 responses, relative to `img_root`.
    pub not_found: Option<String>,
    /// Key-value store host (store mode).
    pub store_host: String,
    /// Key-value store port (store mode).
    pub store_port: u16,
    /// Store entry time-to-live in seconds.
    pub ttl: u64,
    /// One request in this many runs a staleness check. Must be a power of two.
    pub invalidation_interval: u64,
    /// Log change events under `img_root`.
    pub watch: bool,
    /// Per-extension fallback lists replacing the built-in ones.
    pub fallback_extensions: BTreeMap<String, Vec<String>>,
    /// Largest image, in pixels summed over frames, a request may decode or resize to.
    pub max_pixels: u64,
    /// Unrecognized keys, kept so startup can warn about them.
    #[serde(flatten)]
    pub ignored: BTreeMap<String, serde_json::Value>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            img_root: PathBuf::from("./"),
            port: 2345,
            bind: IpAddr::from([0, 0, 0, 0]),
            log_level: 2,
            log_file: None,
            cache_mode: CacheMode::Disk,
            max_age: 0,
            not_found: None,
            store_host: "localhost".to_string(),
            store_port: 6379,
            ttl: 60,
            invalidation_interval: 16,
            watch: false,
            fallback_extensions: BTreeMap::new(),
            max_pixels: DEFAULT_MAX_PIXELS,
            ignored: BTreeMap::new(),
        }
    }
}

impl ServerConfig {
    /// Read and validate the JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> DerivaResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            DerivaError::config_fatal(format!("open config '{}': {e}", path.display()))
        })?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f)).map_err(|e| {
            DerivaError::config_fatal(format!("parse config '{}': {e}", path.display()))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> DerivaResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| DerivaError::config_fatal(format!("parse config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that cannot be served with.
    pub fn validate(&self) -> DerivaResult<()> {
        if !self.invalidation_interval.is_power_of_two() {
            return Err(DerivaError::config_fatal(format!(
                "invalidation_interval must be a non-zero power of two, got {}",
                self.invalidation_interval
            )));
        }
        if self.max_pixels == 0 {
            return Err(DerivaError::config_fatal("max_pixels must be positive"));
        }
        if self.cache_mode == CacheMode::Store && self.store_host.trim().is_empty() {
            return Err(DerivaError::config_fatal("store_host is empty"));
        }
        Ok(())
    }

    /// Socket address the server listens on.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// Canonicalize `img_root` and make it the working directory; returns the canonical path.
pub fn enter_root(img_root: &Path) -> DerivaResult<PathBuf> {
    let root = img_root.canonicalize().map_err(|e| {
        DerivaError::config_fatal(format!("image root '{}': {e}", img_root.display()))
    })?;
    std::env::set_current_dir(&root).map_err(|e| {
        DerivaError::config_fatal(format!("enter image root '{}': {e}", root.display()))
    })?;
    Ok(root)
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
