use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        CompositeError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        CompositeError::resource("x")
            .to_string()
            .contains("resource exhausted:")
    );
    assert!(
        CompositeError::kernel("x")
            .to_string()
            .contains("kernel resolution error:")
    );
    assert!(
        CompositeError::submission("x")
            .to_string()
            .contains("submission error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = CompositeError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn only_resource_exhaustion_is_retryable() {
    assert!(CompositeError::resource("pool full").is_retryable());
    assert!(!CompositeError::validation("bad rect").is_retryable());
    assert!(!CompositeError::submission("emit").is_retryable());
}
