use serde::{Deserialize, Serialize};

use crate::error::ConsensusError;
use crate::ids::RunId;
use crate::model::{ConsensusVerdict, SourceSummary};
use crate::policy::{AgreementPolicy, PolicyMode};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_combinations: usize,
    pub consensus_achieved: usize,
    pub disagreements: usize,
    /// `consensus_achieved / total_combinations`, or 0 when there is nothing
    /// to divide by (see `consensus_rate_defined`).
    pub consensus_rate: f64,
    pub consensus_rate_defined: bool,
}

/// The `consensus` block of the report: overall outcome plus the policy that
/// produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub achieved: bool,
    pub mode: PolicyMode,
    pub require_all: bool,
    pub threshold: usize,
    pub min_platforms: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsensusReport {
    pub run_id: RunId,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    pub consensus: ConsensusParams,
    pub summary: Summary,
    pub platforms: Vec<String>,
    pub comparisons: Vec<ConsensusVerdict>,
    #[serde(default)]
    pub sources: Vec<SourceSummary>,
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl ConsensusReport {
    pub fn achieved(&self) -> bool {
        self.consensus.achieved
    }

    pub fn disagreeing(&self) -> impl Iterator<Item = &ConsensusVerdict> {
        self.comparisons.iter().filter(|v| v.disagreement)
    }
}

pub fn summarize(verdicts: &[ConsensusVerdict]) -> Summary {
    let total = verdicts.len();
    let achieved = verdicts.iter().filter(|v| v.consensus).count();
    let disagreements = verdicts.iter().filter(|v| v.disagreement).count();
    let (rate, defined) =
        if total == 0 { (0.0, false) } else { (achieved as f64 / total as f64, true) };
    Summary {
        total_combinations: total,
        consensus_achieved: achieved,
        disagreements,
        consensus_rate: rate,
        consensus_rate_defined: defined,
    }
}

/// Process-level outcome. An empty comparison proves nothing, so it is never a
/// success; otherwise every combination must have reached consensus under the
/// run's policy.
pub fn overall_achieved(summary: &Summary) -> bool {
    summary.total_combinations > 0
        && summary.disagreements == 0
        && summary.consensus_achieved == summary.total_combinations
}

/// Run metadata the shell supplies; the core never reads a clock.
#[derive(Clone, Debug, Default)]
pub struct RunMeta {
    pub run_id: RunId,
    pub timestamp: String,
    pub serial: Option<String>,
    pub platforms: Vec<String>,
    pub sources: Vec<SourceSummary>,
}

/// Aggregate verdicts into the final report. Fails with `EmptyRun` when there
/// is nothing to report on.
pub fn build_report(
    meta: RunMeta,
    policy: &AgreementPolicy,
    verdicts: Vec<ConsensusVerdict>,
) -> Result<ConsensusReport, ConsensusError> {
    if verdicts.is_empty() {
        return Err(ConsensusError::EmptyRun);
    }
    let summary = summarize(&verdicts);
    let achieved = overall_achieved(&summary);
    Ok(ConsensusReport {
        run_id: meta.run_id,
        timestamp: meta.timestamp,
        serial: meta.serial,
        consensus: ConsensusParams {
            achieved,
            mode: policy.mode,
            require_all: policy.require_all(),
            threshold: policy.threshold,
            min_platforms: policy.min_platforms,
        },
        summary,
        platforms: meta.platforms,
        comparisons: verdicts,
        sources: meta.sources,
        evidence: Vec::new(),
    })
}
