use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use concord_core::ConsensusReport;

use crate::{Config, Overrides, RunError, Runner};

#[derive(Debug, Deserialize)]
pub struct ScenarioExpected {
    pub scenario_id: String,
    #[serde(default)]
    pub policy: ScenarioPolicy,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub evidence: bool,
    pub expect: ScenarioExpect,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScenarioPolicy {
    #[serde(default)]
    pub require_all: Option<bool>,
    #[serde(default)]
    pub threshold: Option<usize>,
    #[serde(default)]
    pub min_platforms: Option<usize>,
    #[serde(default)]
    pub expected_platforms: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioExpect {
    pub exit_code: u8,
    #[serde(default)]
    pub total_combinations: Option<usize>,
    #[serde(default)]
    pub consensus_achieved: Option<usize>,
    #[serde(default)]
    pub skipped_documents: Option<usize>,
    #[serde(default)]
    pub evidence_files: Vec<String>,
    #[serde(default)]
    pub comparisons: Vec<ExpectedComparison>,
}

#[derive(Debug, Deserialize)]
pub struct ExpectedComparison {
    pub architecture: String,
    pub suite: String,
    pub consensus: bool,
    #[serde(default)]
    pub platforms_agreeing: Option<usize>,
    #[serde(default)]
    pub platforms_total: Option<usize>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug)]
pub struct ScenarioResult {
    pub exit_code: u8,
    /// `None` when the run failed fast.
    pub report: Option<ConsensusReport>,
    pub report_written: bool,
    pub evidence_files: Vec<String>,
    pub skipped_documents: usize,
}

pub fn load_expected(dir: &Path) -> Result<ScenarioExpected> {
    let p = dir.join("expected.yaml");
    let s = std::fs::read_to_string(&p)
        .with_context(|| format!("read expected.yaml: {}", p.display()))?;
    let exp: ScenarioExpected = serde_yaml::from_str(&s).with_context(|| "parse expected.yaml")?;
    Ok(exp)
}

/// Fixture-mode run: reads `<dir>/reports/`, writes the report and any
/// evidence under `out_dir`, and reports what happened.
pub fn simulate(dir: &Path, out_dir: &Path) -> Result<ScenarioResult> {
    let exp = load_expected(dir)?;
    let mut cfg = Config::default_for_dir();
    cfg.input.dir = dir.join("reports").to_string_lossy().to_string();
    cfg.output.report = out_dir.join("consensus-report.json").to_string_lossy().to_string();
    cfg.output.evidence_dir =
        exp.evidence.then(|| out_dir.join("evidence").to_string_lossy().to_string());
    cfg.policy.expected_platforms = exp.policy.expected_platforms.clone();
    cfg.apply(&Overrides {
        serial: exp.serial.clone(),
        require_all: exp.policy.require_all,
        threshold: exp.policy.threshold,
        min_platforms: exp.policy.min_platforms,
        ..Overrides::default()
    });

    let runner = Runner::new(out_dir.to_path_buf(), cfg);
    let report_path = runner.cfg.report_path(out_dir);
    match runner.evaluate() {
        Ok(outcome) => Ok(ScenarioResult {
            exit_code: outcome.exit_code(),
            evidence_files: outcome.report.evidence.clone(),
            skipped_documents: outcome.skipped.len(),
            report: Some(outcome.report),
            report_written: report_path.exists(),
        }),
        Err(RunError::Io(e)) => Err(e),
        Err(e) => Ok(ScenarioResult {
            exit_code: e.exit_code(),
            report: None,
            report_written: report_path.exists(),
            evidence_files: vec![],
            skipped_documents: 0,
        }),
    }
}
