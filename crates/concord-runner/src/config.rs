use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use concord_core::{AgreementPolicy, PolicyMode, DEFAULT_MIN_PLATFORMS, DEFAULT_THRESHOLD};

use crate::util::resolve_path;

pub const CONFIG_FILE: &str = "concord.toml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub input: InputConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    pub output: OutputConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    pub dir: String,
    /// Build identifier correlating this run's documents. Documents that carry a
    /// different serial are skipped.
    #[serde(default)]
    pub serial: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub require_all: bool,
    #[serde(default = "default_threshold")]
    pub threshold: usize,
    #[serde(default = "default_min_platforms")]
    pub min_platforms: usize,
    /// Platforms the operator expects to report. Only used to reject a
    /// threshold that could never be met.
    #[serde(default)]
    pub expected_platforms: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            require_all: false,
            threshold: DEFAULT_THRESHOLD,
            min_platforms: DEFAULT_MIN_PLATFORMS,
            expected_platforms: vec![],
        }
    }
}

fn default_threshold() -> usize {
    DEFAULT_THRESHOLD
}

fn default_min_platforms() -> usize {
    DEFAULT_MIN_PLATFORMS
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub report: String,
    #[serde(default)]
    pub evidence_dir: Option<String>,
    #[serde(default)]
    pub prune_stale_evidence: Option<bool>,
}

/// Command-line values that take precedence over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub input_dir: Option<String>,
    pub report: Option<String>,
    pub serial: Option<String>,
    pub require_all: Option<bool>,
    pub threshold: Option<usize>,
    pub min_platforms: Option<usize>,
    pub evidence_dir: Option<String>,
}

impl Config {
    pub fn default_for_dir() -> Self {
        Self {
            input: InputConfig { dir: "reports".to_string(), serial: None },
            policy: PolicyConfig::default(),
            output: OutputConfig {
                report: "consensus-report.json".to_string(),
                evidence_dir: Some("evidence".to_string()),
                prune_stale_evidence: Some(true),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn config_path(base: &Path) -> PathBuf {
        base.join(CONFIG_FILE)
    }

    pub fn apply(&mut self, o: &Overrides) {
        if let Some(v) = &o.input_dir {
            self.input.dir = v.clone();
        }
        if let Some(v) = &o.report {
            self.output.report = v.clone();
        }
        if let Some(v) = &o.serial {
            self.input.serial = Some(v.clone());
        }
        if let Some(v) = o.require_all {
            self.policy.require_all = v;
        }
        if let Some(v) = o.threshold {
            self.policy.threshold = v;
        }
        if let Some(v) = o.min_platforms {
            self.policy.min_platforms = v;
        }
        if let Some(v) = &o.evidence_dir {
            self.output.evidence_dir = Some(v.clone());
        }
    }

    pub fn agreement_policy(&self) -> AgreementPolicy {
        AgreementPolicy {
            mode: if self.policy.require_all { PolicyMode::Strict } else { PolicyMode::Threshold },
            threshold: self.policy.threshold,
            min_platforms: self.policy.min_platforms,
        }
    }

    pub fn expected_platform_count(&self) -> Option<usize> {
        if self.policy.expected_platforms.is_empty() {
            None
        } else {
            Some(self.policy.expected_platforms.len())
        }
    }

    pub fn input_dir(&self, base: &Path) -> PathBuf {
        resolve_path(base, &self.input.dir)
    }

    pub fn report_path(&self, base: &Path) -> PathBuf {
        resolve_path(base, &self.output.report)
    }

    pub fn evidence_dir(&self, base: &Path) -> Option<PathBuf> {
        self.output.evidence_dir.as_deref().map(|d| resolve_path(base, d))
    }

    pub fn prune_stale_evidence(&self) -> bool {
        self.output.prune_stale_evidence.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = Config::config_path(dir.path());
        let cfg = Config::default_for_dir();
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn minimal_file_gets_policy_defaults() {
        let raw = "[input]\ndir = \"in\"\n[output]\nreport = \"out.json\"\n";
        let cfg: Config = toml::from_str(raw).unwrap();
        assert_eq!(cfg.agreement_policy(), AgreementPolicy::default());
        assert_eq!(cfg.evidence_dir(Path::new("/base")), None);
        assert!(cfg.prune_stale_evidence());
    }

    #[test]
    fn overrides_win() {
        let mut cfg = Config::default_for_dir();
        cfg.apply(&Overrides {
            require_all: Some(true),
            min_platforms: Some(3),
            serial: Some("s".into()),
            ..Overrides::default()
        });
        let p = cfg.agreement_policy();
        assert!(p.require_all());
        assert_eq!(p.min_platforms, 3);
        assert_eq!(cfg.input.serial.as_deref(), Some("s"));
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let cfg = Config::default_for_dir();
        assert_eq!(cfg.input_dir(Path::new("/work")), PathBuf::from("/work/reports"));
        assert_eq!(
            cfg.report_path(Path::new("/work")),
            PathBuf::from("/work/consensus-report.json")
        );
    }
}
