use thiserror::Error;

/// Hard failures of the functional core. Disagreement between platforms is a
/// verdict, never one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
    #[error("combination group {architecture}/{suite} has no records")]
    EmptyGroup { architecture: String, suite: String },
    #[error("no combinations to evaluate: every input was missing, filtered or malformed")]
    EmptyRun,
}
