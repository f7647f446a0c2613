use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

use super::*;

#[test]
fn describes_content_events_only() {
    assert_eq!(describe(&EventKind::Create(CreateKind::File)), Some("created"));
    assert_eq!(describe(&EventKind::Modify(ModifyKind::Any)), Some("modified"));
    assert_eq!(describe(&EventKind::Remove(RemoveKind::File)), Some("removed"));
    assert_eq!(describe(&EventKind::Access(AccessKind::Any)), None);
    assert_eq!(describe(&EventKind::Other), None);
}

#[test]
fn watching_a_missing_root_fails() {
    let missing = std::env::temp_dir().join(format!("deriva_watch_missing_{}", std::process::id()));
    assert!(matches!(
        watch_root(&missing),
        Err(DerivaError::ConfigFatal(_))
    ));
}
