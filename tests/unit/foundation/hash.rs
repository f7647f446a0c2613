use super::*;

#[test]
fn fnv_matches_reference_vectors() {
    let h = Fnv1a64::new_default();
    assert_eq!(h.finish(), 0xcbf2_9ce4_8422_2325);

    let mut h = Fnv1a64::new_default();
    h.write_bytes(b"a");
    assert_eq!(h.finish(), 0xaf63_dc4c_8601_ec8c);
}

#[test]
fn fnv_is_incremental() {
    let mut a = Fnv1a64::new_default();
    a.write_bytes(b"deriva");
    let mut b = Fnv1a64::new_default();
    b.write_bytes(b"der");
    b.write_bytes(b"iva");
    assert_eq!(a.finish(), b.finish());
}

#[test]
fn etag_is_quoted_and_content_sensitive() {
    let a = etag_for(b"one");
    let b = etag_for(b"two");
    assert!(a.starts_with('"') && a.ends_with('"'));
    assert_eq!(a.len(), 18);
    assert_ne!(a, b);
    assert_eq!(a, etag_for(b"one"));
}
