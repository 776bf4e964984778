use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::PlatformName;

/// Length of a lower-case hex SHA-256 digest.
pub const CHECKSUM_HEX_LEN: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombinationKey {
    pub architecture: String,
    pub suite: String,
}

impl CombinationKey {
    pub fn new(architecture: impl Into<String>, suite: impl Into<String>) -> Self {
        Self { architecture: architecture.into(), suite: suite.into() }
    }
}

impl std::fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.architecture, self.suite)
    }
}

/// Metadata a platform attached to one result. Every field is optional; a
/// missing value stays missing all the way to the evidence bundle.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Provenance {
    pub fn is_empty(&self) -> bool {
        self.build_url.is_none()
            && self.captured_at.is_none()
            && self.serial.is_none()
            && self.source.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalResultRecord {
    pub platform: PlatformName,
    pub architecture: String,
    pub suite: String,
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_reproducible: Option<bool>,
    #[serde(default, skip_serializing_if = "Provenance::is_empty")]
    pub provenance: Provenance,
}

impl CanonicalResultRecord {
    pub fn key(&self) -> CombinationKey {
        CombinationKey::new(self.architecture.clone(), self.suite.clone())
    }
}

/// All records sharing one (architecture, suite) key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CombinationGroup {
    pub key: CombinationKey,
    pub records: Vec<CanonicalResultRecord>,
}

impl CombinationGroup {
    pub fn platforms(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.platform.as_str()).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Agreed,
    InsufficientPlatforms,
    Divergent,
    Tied,
    BelowThreshold,
}

impl VerdictStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Agreed => "agreed",
            Self::InsufficientPlatforms => "insufficient_platforms",
            Self::Divergent => "divergent",
            Self::Tied => "tied",
            Self::BelowThreshold => "below_threshold",
        }
    }
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlatformResult {
    pub platform: String,
    pub checksum: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusVerdict {
    pub architecture: String,
    pub suite: String,
    pub consensus: bool,
    pub consensus_checksum: Option<String>,
    pub platforms_agreeing: usize,
    pub platforms_total: usize,
    pub platform_results: Vec<PlatformResult>,
    pub disagreement: bool,
    pub status: VerdictStatus,
}

impl ConsensusVerdict {
    pub fn key(&self) -> CombinationKey {
        CombinationKey::new(self.architecture.clone(), self.suite.clone())
    }
}

/// One input document as seen by the run, whether it contributed records or
/// was skipped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub platform: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    pub records: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}
