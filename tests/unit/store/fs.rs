use std::time::{Duration, UNIX_EPOCH};

use super::*;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "deriva_{name}_{}_{}",
        std::process::id(),
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn local_fs_write_read_stat_remove() {
    let dir = temp_dir("local_fs_roundtrip");
    let fs = LocalFs::new(&dir);

    assert!(fs.stat("a.bin").is_none());
    fs.write("a.bin", b"hello").unwrap();

    let stat = fs.stat("a.bin").unwrap();
    assert!(stat.is_file);
    assert_eq!(stat.len, 5);
    assert!(stat.newest() >= stat.modified);
    assert_eq!(fs.read("a.bin").unwrap(), b"hello");

    fs.write("a.bin", b"bye").unwrap();
    assert_eq!(fs.read("a.bin").unwrap(), b"bye");

    assert!(fs.remove("a.bin").unwrap());
    assert!(!fs.remove("a.bin").unwrap());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn local_fs_write_leaves_no_temporaries() {
    let dir = temp_dir("local_fs_tmp");
    let fs = LocalFs::new(&dir);
    fs.write("x.png", b"1").unwrap();
    fs.write("x.png", b"2").unwrap();

    let names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["x.png"]);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn local_fs_directories_are_not_files() {
    let dir = temp_dir("local_fs_dir");
    std::fs::create_dir_all(dir.join("sub.jpg")).unwrap();
    let fs = LocalFs::new(&dir);

    let stat = fs.stat("sub.jpg").unwrap();
    assert!(!stat.is_file);
    assert!(fs.read("missing.jpg").is_err());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn memory_fs_tracks_explicit_timestamps() {
    let fs = MemoryFs::new();
    let t0 = UNIX_EPOCH + Duration::from_secs(1_000);
    let t1 = UNIX_EPOCH + Duration::from_secs(2_000);

    fs.insert_at("img.png", vec![1, 2, 3], t0);
    assert_eq!(fs.stat("img.png").unwrap().modified, t0);
    assert_eq!(fs.stat("img.png").unwrap().len, 3);

    fs.touch("img.png", t1);
    assert_eq!(fs.stat("img.png").unwrap().newest(), t1);

    assert!(fs.contains("img.png"));
    assert!(fs.remove("img.png").unwrap());
    assert!(!fs.contains("img.png"));
    assert!(matches!(fs.read("img.png"), Err(DerivaError::NotFound(_))));
}
