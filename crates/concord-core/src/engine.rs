use std::collections::{BTreeMap, BTreeSet};

use crate::error::ConsensusError;
use crate::model::{
    CombinationGroup, CombinationKey, ConsensusVerdict, PlatformResult, VerdictStatus,
};
use crate::policy::{AgreementPolicy, PolicyMode};

/// Per-group vote count shared by both policies.
///
/// A platform votes for a checksum only when it reported exactly one value for
/// the combination. A platform reporting several values is counted as present
/// but votes for nothing.
#[derive(Debug, Default)]
struct Tally<'a> {
    votes: BTreeMap<&'a str, BTreeSet<&'a str>>,
    conflicted: BTreeSet<&'a str>,
    platforms: BTreeSet<&'a str>,
    distinct: BTreeSet<&'a str>,
}

#[derive(Debug, PartialEq, Eq)]
enum Leader<'a> {
    Nobody,
    Unique { checksum: &'a str, count: usize },
    Tied { count: usize },
}

impl<'a> Tally<'a> {
    fn of(group: &'a CombinationGroup) -> Self {
        let mut per_platform: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for r in &group.records {
            per_platform.entry(r.platform.as_str()).or_default().insert(r.checksum.as_str());
        }

        let mut tally = Tally::default();
        for (platform, sums) in per_platform {
            tally.platforms.insert(platform);
            tally.distinct.extend(sums.iter().copied());
            match sums.len() {
                1 => {
                    if let Some(sum) = sums.into_iter().next() {
                        tally.votes.entry(sum).or_default().insert(platform);
                    }
                }
                _ => {
                    tally.conflicted.insert(platform);
                }
            }
        }
        tally
    }

    fn leader(&self) -> Leader<'a> {
        let max = self.votes.values().map(BTreeSet::len).max().unwrap_or(0);
        if max == 0 {
            return Leader::Nobody;
        }
        let mut top = self.votes.iter().filter(|(_, ps)| ps.len() == max).map(|(sum, _)| *sum);
        match (top.next(), top.next()) {
            (Some(checksum), None) => Leader::Unique { checksum, count: max },
            _ => Leader::Tied { count: max },
        }
    }
}

/// Decide one combination under `policy`.
///
/// Errors only on a contract violation (empty group) or an invalid policy;
/// disagreement is reported through the verdict.
pub fn evaluate(
    group: &CombinationGroup,
    policy: &AgreementPolicy,
) -> Result<ConsensusVerdict, ConsensusError> {
    policy.validate(None)?;
    if group.records.is_empty() {
        return Err(ConsensusError::EmptyGroup {
            architecture: group.key.architecture.clone(),
            suite: group.key.suite.clone(),
        });
    }

    let tally = Tally::of(group);
    let total = tally.platforms.len();
    let leader = tally.leader();
    let floor_met = total >= policy.min_platforms;

    let (status, agreed_checksum) = match policy.mode {
        PolicyMode::Strict => strict_status(&tally, &leader, floor_met),
        PolicyMode::Threshold => threshold_status(&leader, floor_met, policy.threshold),
    };

    let platforms_agreeing = match leader {
        Leader::Nobody => 0,
        Leader::Unique { count, .. } | Leader::Tied { count } => count,
    };

    let platform_results: Vec<PlatformResult> = group
        .records
        .iter()
        .map(|r| PlatformResult {
            platform: r.platform.as_str().to_string(),
            checksum: r.checksum.clone(),
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let consensus = status == VerdictStatus::Agreed;
    Ok(ConsensusVerdict {
        architecture: group.key.architecture.clone(),
        suite: group.key.suite.clone(),
        consensus,
        consensus_checksum: agreed_checksum.map(str::to_string),
        platforms_agreeing,
        platforms_total: total,
        platform_results,
        disagreement: !consensus,
        status,
    })
}

fn strict_status<'a>(
    tally: &Tally<'a>,
    leader: &Leader<'a>,
    floor_met: bool,
) -> (VerdictStatus, Option<&'a str>) {
    if !floor_met {
        return (VerdictStatus::InsufficientPlatforms, None);
    }
    match leader {
        Leader::Unique { checksum, .. }
            if tally.distinct.len() == 1 && tally.conflicted.is_empty() =>
        {
            (VerdictStatus::Agreed, Some(*checksum))
        }
        _ => (VerdictStatus::Divergent, None),
    }
}

fn threshold_status<'a>(
    leader: &Leader<'a>,
    floor_met: bool,
    threshold: usize,
) -> (VerdictStatus, Option<&'a str>) {
    if !floor_met {
        return (VerdictStatus::InsufficientPlatforms, None);
    }
    match leader {
        Leader::Nobody => (VerdictStatus::Divergent, None),
        Leader::Tied { .. } => (VerdictStatus::Tied, None),
        Leader::Unique { count, .. } if *count < threshold => (VerdictStatus::BelowThreshold, None),
        Leader::Unique { checksum, .. } => (VerdictStatus::Agreed, Some(*checksum)),
    }
}

/// Evaluate every group, in key order.
pub fn evaluate_all<'a, I>(
    groups: I,
    policy: &AgreementPolicy,
) -> Result<Vec<ConsensusVerdict>, ConsensusError>
where
    I: IntoIterator<Item = (&'a CombinationKey, &'a CombinationGroup)>,
{
    policy.validate(None)?;
    let mut ordered: Vec<_> = groups.into_iter().collect();
    ordered.sort_by(|a, b| a.0.cmp(b.0));
    ordered.into_iter().map(|(_, g)| evaluate(g, policy)).collect()
}
