//! Filename directive grammar.
//!
//! A directive is a `_`-separated suffix of a requested file name. Its first character selects
//! the operation; the remainder carries numeric fields:
//!
//! - `r<h>[x<w>]`: resize to height `h` and width `w` (square when `w` is absent)
//! - `o<h>x<w><dy><dx>`: crop a `w`×`h` region at vertical/horizontal offsets `dy`/`dx`, where
//!   each offset is written `p<n>` (positive) or `m<n>` (negative) to stay filename-safe
//! - `q<n>`: encoder quality, passed through unvalidated
//!
//! Numeric scans are permissive: the first non-digit ends a field instead of failing.

use std::fmt;

use crate::foundation::error::{DerivaError, DerivaResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Operation selected by a token's first character.
pub enum DirectiveKind {
    /// `r`
    Resize,
    /// `o`
    Offset,
    /// `q`
    Quality,
    /// Any other leading character (or an empty token).
    Unknown,
}

impl DirectiveKind {
    /// Classify a raw token.
    pub fn of(raw: &str) -> Self {
        match raw.as_bytes().first() {
            Some(b'r') => Self::Resize,
            Some(b'o') => Self::Offset,
            Some(b'q') => Self::Quality,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Raw directive text together with its classified kind.
pub struct DirectiveToken {
    /// Classified operation.
    pub kind: DirectiveKind,
    /// Token text without the leading `_`.
    pub raw: String,
}

impl DirectiveToken {
    /// Classify and wrap `raw`.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            kind: DirectiveKind::of(&raw),
            raw,
        }
    }

    /// Parse this token into a typed [`Directive`].
    pub fn parse(&self) -> DerivaResult<Directive> {
        parse(&self.raw)
    }
}

impl fmt::Display for DirectiveToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Typed directive with validated numeric fields.
pub enum Directive {
    /// Resample every frame to `width`×`height`.
    Resize {
        /// Target height in pixels.
        height: u32,
        /// Target width in pixels.
        width: u32,
    },
    /// Crop a `width`×`height` region whose top-left corner is at (`dx`, `dy`).
    Offset {
        /// Region height in pixels.
        height: u32,
        /// Region width in pixels.
        width: u32,
        /// Vertical offset.
        dy: i64,
        /// Horizontal offset.
        dx: i64,
    },
    /// Encoder compression quality.
    Quality(u32),
    /// Unrecognized token, kept verbatim so callers can log it.
    Unknown(String),
}

/// Parse a single directive token (without its leading `_`).
///
/// Unknown kinds parse successfully to [`Directive::Unknown`]. A token of a known kind whose
/// mandatory fields are missing fails with [`DerivaError::DirectiveMalformed`].
pub fn parse(token: &str) -> DerivaResult<Directive> {
    let body = token.get(1..).unwrap_or("");
    match DirectiveKind::of(token) {
        DirectiveKind::Resize => parse_resize(token, body),
        DirectiveKind::Offset => parse_offset(token, body),
        DirectiveKind::Quality => match scan_u32(body) {
            (Some(q), _) => Ok(Directive::Quality(q)),
            (None, _) => Err(DerivaError::directive_malformed(format!(
                "quality '{token}' has no value"
            ))),
        },
        DirectiveKind::Unknown => Ok(Directive::Unknown(token.to_string())),
    }
}

fn parse_resize(token: &str, body: &str) -> DerivaResult<Directive> {
    let (Some(height), rest) = scan_u32(body) else {
        return Err(DerivaError::directive_malformed(format!(
            "resize '{token}' has no height"
        )));
    };
    let width = match rest.strip_prefix('x') {
        Some(after) => scan_u32(after).0.unwrap_or(height),
        None => height,
    };
    Ok(Directive::Resize { height, width })
}

fn parse_offset(token: &str, body: &str) -> DerivaResult<Directive> {
    let (height, rest) = scan_u32(body);
    let Some(rest) = rest.strip_prefix('x') else {
        return Err(DerivaError::directive_malformed(format!(
            "offset '{token}' is missing the 'x' separator"
        )));
    };
    let (width, rest) = scan_u32(rest);
    let (Some(height), Some(width)) = (height, width) else {
        return Err(DerivaError::directive_malformed(format!(
            "offset '{token}' needs both height and width"
        )));
    };
    let (dy, rest) = scan_signed(rest);
    let (dx, _) = scan_signed(rest);
    Ok(Directive::Offset {
        height,
        width,
        dy: dy.unwrap_or(0),
        dx: dx.unwrap_or(0),
    })
}

/// Leading decimal digits of `s` (saturating) and the unconsumed remainder.
fn scan_u32(s: &str) -> (Option<u32>, &str) {
    let end = s
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(s.len());
    if end == 0 {
        return (None, s);
    }
    let value = s[..end].bytes().fold(0u32, |acc, b| {
        acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
    });
    (Some(value), &s[end..])
}

/// `p<n>` / `m<n>` signed field; bare digits read as positive.
fn scan_signed(s: &str) -> (Option<i64>, &str) {
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'p') => (1i64, &s[1..]),
        Some(b'm') => (-1i64, &s[1..]),
        _ => (1i64, s),
    };
    match scan_u32(digits) {
        (Some(n), rest) => (Some(sign * i64::from(n)), rest),
        (None, _) => (None, s),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Directive tokens in execution order: the token adjacent to the source file comes first.
pub struct DirectiveChain(Vec<DirectiveToken>);

impl DirectiveChain {
    /// Build a chain from tokens listed in discovery order.
    ///
    /// Resolution strips suffixes right to left, so the token nearest the extension is
    /// discovered first. Execution composes from the source outward, which is the reverse.
    pub fn from_discovery<S: Into<String>>(discovered: Vec<S>) -> Self {
        Self(
            discovered
                .into_iter()
                .rev()
                .map(DirectiveToken::new)
                .collect(),
        )
    }

    /// Tokens in execution order.
    pub fn tokens(&self) -> &[DirectiveToken] {
        &self.0
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no directive is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/directive/grammar.rs"]
mod tests;
