use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};

/// Temp-file-then-rename JSON write, shared with the evidence store.
pub use concord_evidence::write_json_atomic;

/// UTC wall clock as RFC 3339 with a `Z` suffix, e.g. `2026-10-16T08:00:00Z`.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Tilde-expand `raw`; relative results are taken from `base`.
pub fn resolve_path(base: &Path, raw: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(raw).to_string());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_utc_seconds() {
        let ts = now_rfc3339();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2026-10-16T08:00:00Z".len());
    }

    #[test]
    fn absolute_paths_are_kept() {
        assert_eq!(
            resolve_path(Path::new("/base"), "/abs/x.json"),
            PathBuf::from("/abs/x.json")
        );
        assert_eq!(resolve_path(Path::new("/base"), "rel"), PathBuf::from("/base/rel"));
    }

    #[test]
    fn atomic_write_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        write_json_atomic(&path, &serde_json::json!({ "achieved": true })).unwrap();
        write_json_atomic(&path, &serde_json::json!({ "achieved": false })).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(v["achieved"], serde_json::json!(false));
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
