//! Advisory change notifications for the image root.
//!
//! Events are logged and nothing else; staleness is still decided by sampled stat checks.

use std::path::Path;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::foundation::error::{DerivaError, DerivaResult};

/// Short label for the event kinds worth logging; `None` for access and unclassified events.
pub fn describe(kind: &EventKind) -> Option<&'static str> {
    match kind {
        EventKind::Create(_) => Some("created"),
        EventKind::Modify(_) => Some("modified"),
        EventKind::Remove(_) => Some("removed"),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

fn log_event(res: notify::Result<Event>) {
    match res {
        Ok(event) => {
            let Some(what) = describe(&event.kind) else {
                return;
            };
            for path in &event.paths {
                tracing::debug!(path = %path.display(), "file {what}");
            }
        }
        Err(e) => tracing::warn!(error = %e, "watch error"),
    }
}

/// Start watching `root` recursively. Dropping the returned watcher stops it.
pub fn watch_root(root: &Path) -> DerivaResult<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(log_event)
        .map_err(|e| DerivaError::config_fatal(format!("create watcher: {e}")))?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| DerivaError::config_fatal(format!("watch '{}': {e}", root.display())))?;
    tracing::info!(root = %root.display(), "watching image root");
    Ok(watcher)
}

#[cfg(test)]
#[path = "../tests/unit/watch.rs"]
mod tests;
