use thiserror::Error;

/// Per-document failures. Neither aborts a run: the document is skipped and
/// its platform simply loses coverage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("source unavailable: {document}: {reason}")]
    SourceUnavailable { document: String, reason: String },
    #[error("malformed report: {document}: {reason}")]
    MalformedReport { document: String, reason: String },
}

impl IngestError {
    pub fn malformed(document: &str, reason: impl Into<String>) -> Self {
        Self::MalformedReport { document: document.to_string(), reason: reason.into() }
    }

    pub fn unavailable(document: &str, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable { document: document.to_string(), reason: reason.into() }
    }

    pub fn document(&self) -> &str {
        match self {
            Self::SourceUnavailable { document, .. } | Self::MalformedReport { document, .. } => {
                document
            }
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::SourceUnavailable { reason, .. } | Self::MalformedReport { reason, .. } => reason,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::MalformedReport { .. } => "malformed_report",
        }
    }
}
