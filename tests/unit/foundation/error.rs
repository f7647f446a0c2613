use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        DerivaError::not_found("x")
            .to_string()
            .contains("not found:")
    );
    assert!(
        DerivaError::bad_path("x")
            .to_string()
            .contains("bad request path:")
    );
    assert!(DerivaError::codec("x").to_string().contains("codec error:"));
    assert!(
        DerivaError::directive_malformed("x")
            .to_string()
            .contains("malformed directive:")
    );
    assert!(
        DerivaError::store_unavailable("x")
            .to_string()
            .contains("store unavailable:")
    );
    assert!(
        DerivaError::config_fatal("x")
            .to_string()
            .contains("fatal configuration error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = DerivaError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn codec_failures_answer_as_not_found() {
    assert!(DerivaError::codec("unreadable").is_not_found());
    assert!(DerivaError::not_found("gone").is_not_found());
    assert!(!DerivaError::bad_path("..").is_not_found());
    assert!(!DerivaError::store_unavailable("down").is_not_found());
}
