use super::*;

#[test]
fn levels_map_to_directives() {
    assert_eq!(filter_directive(0), "error");
    assert_eq!(filter_directive(1), "warn");
    assert_eq!(filter_directive(2), "info");
    assert_eq!(filter_directive(3), "debug");
    assert_eq!(filter_directive(4), "trace");
    assert_eq!(filter_directive(200), "trace");
}

#[test]
fn open_append_creates_missing_file() {
    let path = std::env::temp_dir().join(format!("deriva_log_{}.log", std::process::id()));
    let _ = std::fs::remove_file(&path);
    open_append(&path).unwrap();
    assert!(path.is_file());
    std::fs::remove_file(&path).unwrap();
}
