use std::fmt;

use crate::foundation::error::{DerivaError, DerivaResult};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// Decoded request path, relative to the image root.
///
/// Construction goes through [`RequestPath::parse`], which guarantees the value is non-empty,
/// uses `/` separators and never contains `.`/`..` segments or an absolute prefix.
pub struct RequestPath(String);

impl RequestPath {
    /// Validate and normalize a decoded URL path.
    ///
    /// One leading `/` is stripped (the URL root). Traversal attempts are rejected
    /// deterministically with [`DerivaError::BadPath`]; an empty path is [`DerivaError::NotFound`].
    pub fn parse(raw: &str) -> DerivaResult<Self> {
        if raw.contains('\0') {
            return Err(DerivaError::bad_path("request path contains a NUL byte"));
        }

        let s = raw.replace('\\', "/");
        let s = s.strip_prefix('/').unwrap_or(&s);
        if s.starts_with('/') {
            return Err(DerivaError::bad_path(format!(
                "absolute request path '{raw}'"
            )));
        }

        let mut out = Vec::<&str>::new();
        for part in s.split('/') {
            if part.is_empty() || part == "." {
                continue;
            }
            if part == ".." {
                return Err(DerivaError::bad_path(format!(
                    "request path '{raw}' contains '..'"
                )));
            }
            out.push(part);
        }

        if out.is_empty() {
            return Err(DerivaError::not_found("empty request path"));
        }

        Ok(Self(out.join("/")))
    }

    /// Normalized path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory prefix including the trailing `/`, or `""` for top-level files.
    pub fn dir(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[..=i],
            None => "",
        }
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(i) => &self.0[i + 1..],
            None => &self.0,
        }
    }

    /// Extension of the file name (text after the last `.`), if any.
    pub fn extension(&self) -> Option<&str> {
        split_extension(self.file_name()).map(|(_, ext)| ext)
    }
}

impl fmt::Display for RequestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Split a file name into `(stem, extension)` at the last `.`.
///
/// Returns `None` when there is no `.`, or when it is the first or last character
/// (`.hidden`, `name.`).
pub fn split_extension(file_name: &str) -> Option<(&str, &str)> {
    let i = file_name.rfind('.')?;
    if i == 0 || i + 1 == file_name.len() {
        return None;
    }
    Some((&file_name[..i], &file_name[i + 1..]))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/path.rs"]
mod tests;
