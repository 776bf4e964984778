use serde::{Deserialize, Serialize};

use crate::error::ConsensusError;

pub const DEFAULT_THRESHOLD: usize = 2;
pub const DEFAULT_MIN_PLATFORMS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Every reporting platform must report the identical checksum.
    Strict,
    /// At least `threshold` platforms must share one checksum, and that value
    /// must lead without a tie.
    Threshold,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgreementPolicy {
    pub mode: PolicyMode,
    pub threshold: usize,
    pub min_platforms: usize,
}

impl Default for AgreementPolicy {
    fn default() -> Self {
        Self::threshold(DEFAULT_THRESHOLD)
    }
}

impl AgreementPolicy {
    pub fn strict() -> Self {
        Self {
            mode: PolicyMode::Strict,
            threshold: DEFAULT_THRESHOLD,
            min_platforms: DEFAULT_MIN_PLATFORMS,
        }
    }

    pub fn threshold(n: usize) -> Self {
        Self { mode: PolicyMode::Threshold, threshold: n, min_platforms: DEFAULT_MIN_PLATFORMS }
    }

    pub fn with_min_platforms(mut self, min_platforms: usize) -> Self {
        self.min_platforms = min_platforms;
        self
    }

    pub fn require_all(&self) -> bool {
        self.mode == PolicyMode::Strict
    }

    /// Reject self-contradictory configurations before any evaluation runs.
    ///
    /// `expected_platforms` is the number of platforms the operator declared
    /// for this run, when known; a threshold or floor above it can never be met.
    pub fn validate(&self, expected_platforms: Option<usize>) -> Result<(), ConsensusError> {
        if self.min_platforms < 1 {
            return Err(ConsensusError::InvalidPolicy("min_platforms must be at least 1".into()));
        }
        if self.mode == PolicyMode::Threshold && self.threshold < 1 {
            return Err(ConsensusError::InvalidPolicy("threshold must be at least 1".into()));
        }
        if let Some(expected) = expected_platforms {
            if self.min_platforms > expected {
                return Err(ConsensusError::InvalidPolicy(format!(
                    "min_platforms={} exceeds the {} expected platform(s)",
                    self.min_platforms, expected
                )));
            }
            if self.mode == PolicyMode::Threshold && self.threshold > expected {
                return Err(ConsensusError::InvalidPolicy(format!(
                    "threshold={} exceeds the {} expected platform(s)",
                    self.threshold, expected
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_two_of_m_with_floor_two() {
        let p = AgreementPolicy::default();
        assert_eq!(p.mode, PolicyMode::Threshold);
        assert_eq!(p.threshold, 2);
        assert_eq!(p.min_platforms, 2);
        assert!(!p.require_all());
        assert!(p.validate(None).is_ok());
    }

    #[test]
    fn zero_threshold_is_invalid() {
        let err = AgreementPolicy::threshold(0).validate(None).unwrap_err();
        assert!(matches!(err, ConsensusError::InvalidPolicy(_)));
    }

    #[test]
    fn zero_floor_is_invalid_in_both_modes() {
        assert!(AgreementPolicy::strict().with_min_platforms(0).validate(None).is_err());
        assert!(AgreementPolicy::threshold(1).with_min_platforms(0).validate(None).is_err());
    }

    #[test]
    fn threshold_above_expected_platforms_is_invalid() {
        assert!(AgreementPolicy::threshold(3).validate(Some(2)).is_err());
        assert!(AgreementPolicy::threshold(2).validate(Some(2)).is_ok());
    }

    #[test]
    fn strict_ignores_threshold_but_not_floor() {
        let mut p = AgreementPolicy::strict();
        p.threshold = 0;
        assert!(p.validate(Some(2)).is_ok());
        assert!(p.with_min_platforms(3).validate(Some(2)).is_err());
    }
}
