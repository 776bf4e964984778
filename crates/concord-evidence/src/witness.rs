use anyhow::Result;
use serde::{Deserialize, Serialize};

use concord_core::{AgreementPolicy, CombinationGroup, ConsensusVerdict, VerdictStatus};
use concord_normalize::content_hash;

pub const EVIDENCE_SCHEMA_VERSION: &str = "1";

/// What one platform said about the combination, with whatever provenance it
/// supplied. Missing metadata is omitted from the JSON.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Observation {
    pub platform: String,
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_reproducible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WitnessEvidence {
    pub schema_version: String,
    pub architecture: String,
    pub suite: String,
    pub run_id: String,
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    pub status: VerdictStatus,
    pub platforms_total: usize,
    pub platforms_agreeing: usize,
    pub policy: AgreementPolicy,
    pub observations: Vec<Observation>,
    /// sha256 over the canonical JSON of `observations`.
    pub observations_sha256: String,
}

#[derive(Clone, Debug, Default)]
pub struct WitnessContext {
    pub run_id: String,
    pub generated_at: String,
    pub serial: Option<String>,
}

/// Assemble the forensic bundle for a combination.
///
/// Returns `None` unless the verdict is a disagreement. The verdict itself is
/// only read.
pub fn build_witness(
    verdict: &ConsensusVerdict,
    group: &CombinationGroup,
    policy: &AgreementPolicy,
    ctx: &WitnessContext,
) -> Result<Option<WitnessEvidence>> {
    if !verdict.disagreement {
        return Ok(None);
    }

    let mut observations: Vec<Observation> = group
        .records
        .iter()
        .map(|r| Observation {
            platform: r.platform.as_str().to_string(),
            checksum: r.checksum.clone(),
            claimed_reproducible: r.claimed_reproducible,
            build_url: r.provenance.build_url.clone(),
            captured_at: r.provenance.captured_at.clone(),
            serial: r.provenance.serial.clone(),
            source: r.provenance.source.clone(),
        })
        .collect();
    observations.sort();
    observations.dedup();

    Ok(Some(WitnessEvidence {
        schema_version: EVIDENCE_SCHEMA_VERSION.to_string(),
        architecture: verdict.architecture.clone(),
        suite: verdict.suite.clone(),
        run_id: ctx.run_id.clone(),
        generated_at: ctx.generated_at.clone(),
        serial: ctx.serial.clone(),
        status: verdict.status,
        platforms_total: verdict.platforms_total,
        platforms_agreeing: verdict.platforms_agreeing,
        policy: *policy,
        observations_sha256: content_hash(&observations)?,
        observations,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::{evaluate, CanonicalResultRecord, CombinationKey, PlatformName, Provenance};

    fn record(platform: &str, sum: char, url: Option<&str>) -> CanonicalResultRecord {
        CanonicalResultRecord {
            platform: PlatformName::from_str(platform),
            architecture: "arm64".into(),
            suite: "trixie".into(),
            checksum: std::iter::repeat(sum).take(64).collect(),
            claimed_reproducible: None,
            provenance: Provenance { build_url: url.map(str::to_string), ..Provenance::default() },
        }
    }

    fn group(records: Vec<CanonicalResultRecord>) -> CombinationGroup {
        CombinationGroup { key: CombinationKey::new("arm64", "trixie"), records }
    }

    #[test]
    fn produced_only_for_disagreement() {
        let policy = AgreementPolicy::default();
        let agreeing = group(vec![record("github", 'a', None), record("gitlab", 'a', None)]);
        let v = evaluate(&agreeing, &policy).unwrap();
        let ctx = WitnessContext::default();
        assert!(build_witness(&v, &agreeing, &policy, &ctx).unwrap().is_none());

        let split =
            group(vec![record("github", 'a', Some("https://ci/1")), record("gitlab", 'd', None)]);
        let v = evaluate(&split, &policy).unwrap();
        let w = build_witness(&v, &split, &policy, &WitnessContext::default()).unwrap().unwrap();
        assert_eq!(w.observations.len(), 2);
        assert_eq!(w.status, VerdictStatus::Tied);
        assert_eq!(w.observations_sha256.len(), 64);
    }

    #[test]
    fn absent_metadata_is_omitted() {
        let policy = AgreementPolicy::default();
        let split =
            group(vec![record("github", 'a', Some("https://ci/1")), record("gitlab", 'd', None)]);
        let v = evaluate(&split, &policy).unwrap();
        let w = build_witness(&v, &split, &policy, &WitnessContext::default()).unwrap().unwrap();
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["observations"][0]["build_url"], "https://ci/1");
        assert!(json["observations"][1].get("build_url").is_none());
        assert!(json["observations"][1].get("captured_at").is_none());
    }

    #[test]
    fn single_platform_gap_still_gets_evidence() {
        let policy = AgreementPolicy::default();
        let lonely = group(vec![record("github", 'a', None)]);
        let v = evaluate(&lonely, &policy).unwrap();
        let w = build_witness(&v, &lonely, &policy, &WitnessContext::default()).unwrap().unwrap();
        assert_eq!(w.observations.len(), 1);
        assert_eq!(w.status, VerdictStatus::InsufficientPlatforms);
    }
}
