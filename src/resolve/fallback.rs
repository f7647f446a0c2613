use std::collections::{BTreeMap, HashMap};

/// Built-in fallback lists, in probe order after the requested extension itself.
const DEFAULT_FALLBACKS: &[(&str, &[&str])] = &[
    ("jpg", &["png", "gif", "bmp", "jpeg", "tga", "tiff"]),
    ("jpeg", &["jpg", "png", "gif", "bmp", "tga", "tiff"]),
    ("png", &["jpg", "jpeg", "gif", "bmp", "tga", "tiff"]),
    ("gif", &["png", "jpg", "jpeg", "bmp", "tga", "tiff"]),
    ("bmp", &["png", "jpg", "jpeg", "gif", "tga", "tiff"]),
    ("webp", &["png", "jpg", "jpeg", "gif", "bmp", "tiff"]),
    ("tiff", &["tif", "png", "jpg", "jpeg", "bmp"]),
    ("tif", &["tiff", "png", "jpg", "jpeg", "bmp"]),
    ("tga", &["png", "jpg", "jpeg", "bmp"]),
];

#[derive(Clone, Debug, PartialEq, Eq)]
/// Per-extension list of alternate source extensions.
///
/// Keys are matched case-insensitively; the requested extension is always probed first.
pub struct FallbackTable {
    by_ext: HashMap<String, Vec<String>>,
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self {
            by_ext: DEFAULT_FALLBACKS
                .iter()
                .map(|(ext, alts)| {
                    (
                        (*ext).to_string(),
                        alts.iter().map(|a| (*a).to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl FallbackTable {
    /// Table with no fallbacks at all; only literal extensions are probed.
    pub fn empty() -> Self {
        Self {
            by_ext: HashMap::new(),
        }
    }

    /// Built-in table with per-extension lists replaced by `overrides`.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Self {
        let mut table = Self::default();
        for (ext, alts) in overrides {
            table.by_ext.insert(
                ext.to_ascii_lowercase(),
                alts.iter().map(|a| a.trim_start_matches('.').to_string()).collect(),
            );
        }
        table
    }

    /// Extensions to probe for a request ending in `ext`, in order, without duplicates.
    pub fn candidates<'a>(&'a self, ext: &'a str) -> Vec<&'a str> {
        let mut out = vec![ext];
        if let Some(alts) = self.by_ext.get(&ext.to_ascii_lowercase()) {
            for alt in alts {
                if !out.iter().any(|seen| seen.eq_ignore_ascii_case(alt)) {
                    out.push(alt.as_str());
                }
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/resolve/fallback.rs"]
mod tests;
