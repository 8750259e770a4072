pub fn version_label() -> String {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_DESC: &str = env!("GIT_DESC");
    #[allow(clippy::const_is_empty)]
    if GIT_DESC.is_empty() {
        format!("easyyolo {VERSION}")
    } else {
        const GIT_DIRTY: &str = env!("GIT_DIRTY");
        let is_dirty = GIT_DIRTY == "true";
        format!(
            "easyyolo {VERSION} ({GIT_DESC}{})",
            if is_dirty { ", dirty" } else { "" }
        )
    }
}

/// Display text of a box label, machine suggestions carry their confidence in percent.
pub fn label_text(label: &str, confidence: f64) -> String {
    if confidence < 1.0 {
        format!("{label} ({:.1}%)", confidence * 100.0)
    } else {
        label.to_string()
    }
}

#[test]
fn test_label_text() {
    assert_eq!(label_text("cat", 1.0), "cat");
    assert_eq!(label_text("cat", 0.85), "cat (85.0%)");
    assert_eq!(label_text("dog", 0.1234), "dog (12.3%)");
    assert!(version_label().starts_with("easyyolo "));
}
