use crate::{
    codec::ImageCodec,
    directive::grammar::{Directive, DirectiveChain},
    foundation::error::DerivaResult,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Counters describing one chain execution.
pub struct ExecutionStats {
    /// Directives handed to the codec.
    pub applied: usize,
    /// Malformed or unknown directives that were skipped.
    pub skipped: usize,
}

/// Apply `chain` to `source` and encode the result for `extension`.
///
/// Directives run in chain order. A token that fails to parse or has an unknown kind is logged
/// and skipped; codec failures abort the execution. The encoded blob is produced once, after the
/// last directive.
#[tracing::instrument(skip(codec, source, chain), fields(directives = chain.len()))]
pub fn execute(
    codec: &dyn ImageCodec,
    source: &[u8],
    chain: &DirectiveChain,
    extension: &str,
) -> DerivaResult<(Vec<u8>, ExecutionStats)> {
    let mut handle = codec.open(source)?;
    let mut stats = ExecutionStats::default();

    for token in chain.tokens() {
        let directive = match token.parse() {
            Ok(d) => d,
            Err(err) => {
                tracing::warn!(%token, error = %err, "skipping malformed directive");
                stats.skipped += 1;
                continue;
            }
        };

        match directive {
            Directive::Resize { height, width } => handle.resize(height, width)?,
            Directive::Offset {
                height,
                width,
                dy,
                dx,
            } => handle.crop(width, height, dx, dy)?,
            Directive::Quality(q) => handle.set_quality(q)?,
            Directive::Unknown(raw) => {
                tracing::warn!(token = %raw, "skipping unknown directive");
                stats.skipped += 1;
                continue;
            }
        }
        tracing::debug!(%token, "applied directive");
        stats.applied += 1;
    }

    let blob = handle.encode(extension)?;
    Ok((blob, stats))
}

#[cfg(test)]
#[path = "../../tests/unit/directive/executor.rs"]
mod tests;
