/// Convenience result type used across deriva.
pub type DerivaResult<T> = Result<T, DerivaError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Only [`DerivaError::ConfigFatal`] is allowed to terminate the process; every other variant is
/// recovered at request time and surfaces as an HTTP status plus a log line.
#[derive(thiserror::Error, Debug)]
pub enum DerivaError {
    /// No literal file and no resolvable directive chain.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request path rejected before touching the filesystem (e.g. `..` segments).
    #[error("bad request path: {0}")]
    BadPath(String),

    /// Source bytes could not be decoded, transformed or encoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A single directive token failed to parse.
    #[error("malformed directive: {0}")]
    DirectiveMalformed(String),

    /// External key-value store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Startup configuration could not be loaded or applied.
    #[error("fatal configuration error: {0}")]
    ConfigFatal(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DerivaError {
    /// Build a [`DerivaError::NotFound`] value.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Build a [`DerivaError::BadPath`] value.
    pub fn bad_path(msg: impl Into<String>) -> Self {
        Self::BadPath(msg.into())
    }

    /// Build a [`DerivaError::Codec`] value.
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// Build a [`DerivaError::DirectiveMalformed`] value.
    pub fn directive_malformed(msg: impl Into<String>) -> Self {
        Self::DirectiveMalformed(msg.into())
    }

    /// Build a [`DerivaError::StoreUnavailable`] value.
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Build a [`DerivaError::ConfigFatal`] value.
    pub fn config_fatal(msg: impl Into<String>) -> Self {
        Self::ConfigFatal(msg.into())
    }

    /// True for failures that answer a request with "not found" semantics.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Codec(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
