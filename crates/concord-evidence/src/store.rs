use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::witness::WitnessEvidence;

const EVIDENCE_PREFIX: &str = "evidence-";

pub trait EvidenceStore: Send + Sync {
    fn write_witness(&self, evidence: &WitnessEvidence) -> Result<PathBuf>;
    /// Remove witness files left by earlier runs, so that every file present
    /// after a run belongs to that run.
    fn prune_stale(&self) -> Result<usize>;
}

#[derive(Clone, Debug)]
pub struct FsEvidenceStore {
    pub root: PathBuf,
}

impl FsEvidenceStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

/// Deterministic file name for one combination, restricted to `[A-Za-z0-9._-]`.
pub fn evidence_file_name(architecture: &str, suite: &str) -> String {
    fn clean(s: &str) -> String {
        s.chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
                _ => '_',
            })
            .collect()
    }
    format!("{EVIDENCE_PREFIX}{}-{}.json", clean(architecture), clean(suite))
}

/// Write pretty JSON through a temp file in the target directory, then rename
/// it into place. Readers see either the old file or the complete new one.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).with_context(|| format!("create dir {}", dir.display()))?;
    let bytes = serde_json::to_vec_pretty(value)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(&bytes)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).with_context(|| format!("persist {}", path.display()))?;
    Ok(())
}

impl EvidenceStore for FsEvidenceStore {
    fn write_witness(&self, evidence: &WitnessEvidence) -> Result<PathBuf> {
        let path = self.root.join(evidence_file_name(&evidence.architecture, &evidence.suite));
        write_json_atomic(&path, evidence)
            .with_context(|| format!("write evidence {}", path.display()))?;
        Ok(path)
    }

    fn prune_stale(&self) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("list {}", self.root.display()))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(EVIDENCE_PREFIX)
                && name.ends_with(".json")
                && entry.file_type()?.is_file()
            {
                std::fs::remove_file(entry.path())
                    .with_context(|| format!("remove {}", entry.path().display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::witness::EVIDENCE_SCHEMA_VERSION;
    use concord_core::{AgreementPolicy, VerdictStatus};
    use tempfile::tempdir;

    fn witness(arch: &str, suite: &str) -> WitnessEvidence {
        WitnessEvidence {
            schema_version: EVIDENCE_SCHEMA_VERSION.into(),
            architecture: arch.into(),
            suite: suite.into(),
            run_id: "r".into(),
            generated_at: "2026-10-16T00:00:00Z".into(),
            serial: None,
            status: VerdictStatus::Divergent,
            platforms_total: 2,
            platforms_agreeing: 1,
            policy: AgreementPolicy::strict(),
            observations: vec![],
            observations_sha256: String::new(),
        }
    }

    #[test]
    fn file_names_are_deterministic_and_safe() {
        assert_eq!(evidence_file_name("arm64", "trixie"), "evidence-arm64-trixie.json");
        assert_eq!(evidence_file_name("../x", "a b"), "evidence-.._x-a_b.json");
    }

    #[test]
    fn writes_and_prunes_witness_files() {
        let dir = tempdir().unwrap();
        let store = FsEvidenceStore::new(dir.path().join("evidence"));
        let path = store.write_witness(&witness("arm64", "trixie")).unwrap();
        assert!(path.ends_with("evidence-arm64-trixie.json"));
        let back: WitnessEvidence = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back.suite, "trixie");

        std::fs::write(dir.path().join("evidence").join("notes.txt"), "keep").unwrap();
        assert_eq!(store.prune_stale().unwrap(), 1);
        assert!(!path.exists());
        assert!(dir.path().join("evidence").join("notes.txt").exists());
    }

    #[test]
    fn prune_on_missing_dir_is_noop() {
        let dir = tempdir().unwrap();
        assert_eq!(FsEvidenceStore::new(dir.path().join("none")).prune_stale().unwrap(), 0);
    }
}
