use std::sync::Arc;

use crate::{
    directive::grammar::{self, Directive, DirectiveChain},
    foundation::error::{DerivaError, DerivaResult},
    foundation::path::{RequestPath, split_extension},
    resolve::fallback::FallbackTable,
    store::fs::{FileStat, FileSystem},
};

#[derive(Clone, Debug, PartialEq, Eq)]
/// Outcome of resolving a request path against the image root.
pub enum ResolvedRequest {
    /// The request names an existing regular file.
    Direct {
        /// Path of the file, relative to the root.
        path: String,
        /// Metadata observed while resolving.
        stat: FileStat,
    },
    /// The request is a base file plus a directive chain.
    Derived {
        /// Base file the chain starts from (a true source, or a shorter materialized derivative).
        source: String,
        /// Metadata of `source`.
        source_stat: FileStat,
        /// Directives in execution order.
        chain: DirectiveChain,
        /// Extension of the requested file; selects the output encoding.
        extension: String,
    },
}

impl ResolvedRequest {
    /// The on-disk file this resolution reads from.
    pub fn on_disk_path(&self) -> &str {
        match self {
            Self::Direct { path, .. } => path,
            Self::Derived { source, .. } => source,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// One existing file found while walking a derivative's suffix chain toward its source.
pub struct AncestorLevel {
    /// Path of the ancestor, relative to the root.
    pub path: String,
    /// Its metadata.
    pub stat: FileStat,
}

#[derive(Clone)]
/// Maps request paths to files and directive chains.
pub struct Resolver {
    fs: Arc<dyn FileSystem>,
    fallbacks: FallbackTable,
}

impl Resolver {
    /// Resolver probing through `fs` with the given fallback-extension table.
    pub fn new(fs: Arc<dyn FileSystem>, fallbacks: FallbackTable) -> Self {
        Self { fs, fallbacks }
    }

    /// Resolve `request` to a direct file or a `(source, chain)` pair.
    ///
    /// A missing file whose bare name exists under a fallback extension resolves to that file with
    /// an empty chain (a format conversion). Otherwise suffixes are stripped from the file name
    /// right to left; the first probe that finds a regular file (trying the requested extension,
    /// then its fallbacks) becomes the base. A shorter derivative already on disk therefore wins
    /// over the bare source.
    pub fn resolve(&self, request: &RequestPath) -> DerivaResult<ResolvedRequest> {
        if let Some(stat) = self.regular_file(request.as_str()) {
            return Ok(ResolvedRequest::Direct {
                path: request.as_str().to_string(),
                stat,
            });
        }

        let Some((stem, ext)) = split_extension(request.file_name()) else {
            return Err(DerivaError::not_found(format!(
                "'{request}' does not exist and has no extension"
            )));
        };

        let dir = request.dir();
        if let Some((source, source_stat)) = self.probe(dir, stem, ext) {
            tracing::debug!(%request, %source, "resolved by fallback extension");
            return Ok(ResolvedRequest::Derived {
                source,
                source_stat,
                chain: DirectiveChain::default(),
                extension: ext.to_string(),
            });
        }

        let mut rest = stem;
        let mut discovered = Vec::new();
        while let Some(i) = rest.rfind('_') {
            discovered.push(&rest[i + 1..]);
            rest = &rest[..i];
            if rest.is_empty() {
                break;
            }
            if let Some((source, source_stat)) = self.probe(dir, rest, ext) {
                tracing::debug!(%request, %source, directives = discovered.len(), "resolved derived request");
                return Ok(ResolvedRequest::Derived {
                    source,
                    source_stat,
                    chain: DirectiveChain::from_discovery(discovered),
                    extension: ext.to_string(),
                });
            }
        }

        Err(DerivaError::not_found(format!(
            "no source file for '{request}'"
        )))
    }

    /// Every existing file on the suffix chain of `path`, nearest level first.
    ///
    /// The last element, if any, is the true source. An empty result means `path` is not a
    /// derivative of any file on disk. The walk stops at the first suffix that is not a
    /// well-formed resize, offset or quality directive, so a name like `summer_2020.png` is
    /// never treated as a derivative of `summer.png`.
    pub fn ancestry(&self, path: &RequestPath) -> Vec<AncestorLevel> {
        let Some((stem, ext)) = split_extension(path.file_name()) else {
            return Vec::new();
        };
        let dir = path.dir();
        let mut rest = stem;
        let mut out = Vec::new();
        while let Some(i) = rest.rfind('_') {
            if !is_generated_suffix(&rest[i + 1..]) {
                break;
            }
            rest = &rest[..i];
            if rest.is_empty() {
                break;
            }
            if let Some((found, stat)) = self.probe(dir, rest, ext) {
                out.push(AncestorLevel { path: found, stat });
            }
        }
        out
    }

    fn probe(&self, dir: &str, base: &str, ext: &str) -> Option<(String, FileStat)> {
        self.fallbacks.candidates(ext).into_iter().find_map(|cand| {
            let path = format!("{dir}{base}.{cand}");
            tracing::trace!(%path, "probing");
            self.regular_file(&path).map(|stat| (path, stat))
        })
    }

    fn regular_file(&self, path: &str) -> Option<FileStat> {
        self.fs.stat(path).filter(|s| s.is_file)
    }
}

/// True for suffixes the engine itself could have appended when materializing a derivative.
fn is_generated_suffix(token: &str) -> bool {
    !matches!(grammar::parse(token), Ok(Directive::Unknown(_)) | Err(_))
}

#[cfg(test)]
#[path = "../../tests/unit/resolve/resolver.rs"]
mod tests;
