use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use thiserror::Error;

use concord_core::{
    build_report, evaluate_all, group_records, observed_platforms, AgreementPolicy,
    CanonicalResultRecord, ConsensusError, ConsensusReport, RunId, RunMeta, SourceSummary,
};
use concord_evidence::{
    build_witness, evidence_file_name, EvidenceStore, FsEvidenceStore, WitnessContext,
};
use concord_normalize::{normalize_document, IngestError};

use crate::source::{list_sources, SourceDocument};
use crate::util::{now_rfc3339, write_json_atomic};
use crate::Config;

pub const EXIT_CONSENSUS: u8 = 0;
pub const EXIT_NO_CONSENSUS: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_EMPTY_RUN: u8 = 3;
pub const EXIT_IO: u8 = 4;

/// Fatal outcomes. Each of these means no report was written.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[source] ConsensusError),
    #[error("empty run: no usable report documents produced any combination")]
    EmptyRun,
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl RunError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::EmptyRun => EXIT_EMPTY_RUN,
            Self::Io(_) => EXIT_IO,
        }
    }
}

impl From<ConsensusError> for RunError {
    fn from(e: ConsensusError) -> Self {
        match e {
            ConsensusError::EmptyRun => Self::EmptyRun,
            other => Self::Config(other),
        }
    }
}

/// Records and per-document bookkeeping from one pass over the input dir.
#[derive(Debug, Default)]
pub struct Ingested {
    pub records: Vec<CanonicalResultRecord>,
    pub sources: Vec<SourceSummary>,
    pub skipped: Vec<IngestError>,
    pub serials: BTreeSet<String>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub report: ConsensusReport,
    pub report_path: PathBuf,
    pub evidence_files: Vec<PathBuf>,
    pub skipped: Vec<IngestError>,
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        if self.report.achieved() {
            EXIT_CONSENSUS
        } else {
            EXIT_NO_CONSENSUS
        }
    }
}

pub struct Runner {
    pub base_dir: PathBuf,
    pub cfg: Config,
}

impl Runner {
    pub fn new(base_dir: PathBuf, cfg: Config) -> Self {
        Self { base_dir, cfg }
    }

    /// Load `concord.toml` from `config_path` (or `base_dir`), falling back to
    /// defaults when the file does not exist.
    pub fn open(base_dir: PathBuf, config_path: Option<&Path>) -> anyhow::Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Config::config_path(&base_dir));
        let cfg = if path.exists() {
            Config::load_from(&path)?
        } else if config_path.is_some() {
            anyhow::bail!("config file {} does not exist", path.display());
        } else {
            Config::default_for_dir()
        };
        Ok(Self::new(base_dir, cfg))
    }

    pub fn init(base_dir: &Path) -> anyhow::Result<PathBuf> {
        let path = Config::config_path(base_dir);
        if !path.exists() {
            Config::default_for_dir().save_to(&path)?;
        }
        Ok(path)
    }

    /// The run's policy, validated before anything is read.
    pub fn policy(&self) -> Result<AgreementPolicy, RunError> {
        let policy = self.cfg.agreement_policy();
        policy
            .validate(self.cfg.expected_platform_count())
            .map_err(RunError::Config)?;
        Ok(policy)
    }

    pub fn ingest(&self) -> Result<Ingested, RunError> {
        let input = self.cfg.input_dir(&self.base_dir);
        let exclude = vec![self.cfg.report_path(&self.base_dir)];
        let serial = self.cfg.input.serial.as_deref();
        let docs = list_sources(&input, serial, &exclude)?;
        tracing::info!(dir = %input.display(), documents = docs.len(), "listed report documents");

        let mut out = Ingested::default();
        for doc in docs {
            match self.ingest_one(&doc) {
                Ok((summary, records, doc_serial)) => {
                    if let Some(s) = doc_serial {
                        out.serials.insert(s);
                    }
                    out.sources.push(summary);
                    out.records.extend(records);
                }
                Err(err) => {
                    tracing::warn!(
                        platform = doc.platform.as_str(),
                        document = err.document(),
                        kind = err.kind(),
                        reason = err.reason(),
                        "skipping document"
                    );
                    out.sources.push(SourceSummary {
                        platform: doc.platform.as_str().to_string(),
                        file: doc.name.clone(),
                        sha256: None,
                        shape: None,
                        records: 0,
                        skipped: Some(err.to_string()),
                    });
                    out.skipped.push(err);
                }
            }
        }

        let mut seen = BTreeSet::new();
        for s in out.sources.iter().filter(|s| s.skipped.is_none()) {
            if !seen.insert(s.platform.as_str()) {
                tracing::warn!(
                    platform = s.platform.as_str(),
                    "more than one document for platform; results are merged"
                );
            }
        }
        Ok(out)
    }

    fn ingest_one(
        &self,
        doc: &SourceDocument,
    ) -> Result<(SourceSummary, Vec<CanonicalResultRecord>, Option<String>), IngestError> {
        let bytes = std::fs::read(&doc.path)
            .map_err(|e| IngestError::unavailable(&doc.name, e.to_string()))?;
        let normalized = normalize_document(&doc.platform, &doc.name, &bytes)?;

        // With a run serial, every serial the document carries must match it
        // and at least one must be present.
        if let Some(want) = self.cfg.input.serial.as_deref() {
            let carried = [
                doc.declared_serial.as_deref(),
                doc.name_serial.as_deref(),
                normalized.meta.serial.as_deref(),
            ];
            let carried: Vec<&str> = carried.into_iter().flatten().collect();
            if let Some(got) = carried.iter().find(|s| **s != want) {
                return Err(IngestError::unavailable(
                    &doc.name,
                    format!("serial {got} does not match run serial {want}"),
                ));
            }
            if carried.is_empty() {
                return Err(IngestError::unavailable(
                    &doc.name,
                    format!("no sidecar, file name or embedded serial confirms run serial {want}"),
                ));
            }
        }
        let doc_serial = doc
            .external_serial()
            .map(str::to_string)
            .or_else(|| normalized.meta.serial.clone());

        let summary = SourceSummary {
            platform: doc.platform.as_str().to_string(),
            file: doc.name.clone(),
            sha256: Some(normalized.sha256.clone()),
            shape: Some(normalized.shape.label().to_string()),
            records: normalized.records.len(),
            skipped: None,
        };
        Ok((summary, normalized.records, doc_serial))
    }

    /// Remove the report and, when pruning is on, the witness files of an
    /// earlier run. Runs first so a failed run never leaves old output behind.
    fn clear_previous(
        &self,
        report_path: &Path,
        store: Option<&FsEvidenceStore>,
    ) -> Result<(), RunError> {
        match std::fs::remove_file(report_path) {
            Ok(()) => tracing::info!(report = %report_path.display(), "removed previous report"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(anyhow::Error::from(e)
                    .context(format!("remove previous report {}", report_path.display()))
                    .into())
            }
        }
        if let Some(store) = store.filter(|_| self.cfg.prune_stale_evidence()) {
            let removed = store.prune_stale()?;
            if removed > 0 {
                tracing::info!(removed, "removed evidence from an earlier run");
            }
        }
        Ok(())
    }

    /// Run the whole pipeline and write the report.
    ///
    /// Returns `Err` only for fatal conditions, in which case neither a report
    /// nor evidence is left on disk. Disagreement is a normal `Ok` outcome with
    /// a non-zero exit code.
    pub fn evaluate(&self) -> Result<RunOutcome, RunError> {
        let report_path = self.cfg.report_path(&self.base_dir);
        let store = self.cfg.evidence_dir(&self.base_dir).map(FsEvidenceStore::new);
        self.clear_previous(&report_path, store.as_ref())?;

        let policy = self.policy()?;
        let ingested = self.ingest()?;

        let platforms = observed_platforms(&ingested.records);
        let groups = group_records(ingested.records);
        let verdicts = evaluate_all(&groups, &policy)?;

        let run_id = RunId::new();
        let timestamp = now_rfc3339();
        let serial = self.cfg.input.serial.clone().or_else(|| match ingested.serials.len() {
            1 => ingested.serials.iter().next().cloned(),
            _ => None,
        });
        let meta = RunMeta {
            run_id: run_id.clone(),
            timestamp: timestamp.clone(),
            serial: serial.clone(),
            platforms,
            sources: ingested.sources,
        };
        let mut report = build_report(meta, &policy, verdicts)?;

        let mut witnesses = Vec::new();
        if store.is_some() {
            let ctx = WitnessContext {
                run_id: run_id.as_str().to_string(),
                generated_at: timestamp,
                serial,
            };
            for verdict in report.disagreeing() {
                let Some(group) = groups.get(&verdict.key()) else {
                    continue;
                };
                if let Some(witness) = build_witness(verdict, group, &policy, &ctx)? {
                    witnesses.push(witness);
                }
            }
        }
        report.evidence = witnesses
            .iter()
            .map(|w| evidence_file_name(&w.architecture, &w.suite))
            .collect();

        for v in &report.comparisons {
            tracing::debug!(
                combination = %v.key(),
                consensus = v.consensus,
                agreeing = v.platforms_agreeing,
                total = v.platforms_total,
                status = %v.status,
                "verdict"
            );
        }

        write_json_atomic(&report_path, &report)
            .with_context(|| format!("write report {}", report_path.display()))?;

        let mut evidence_files = Vec::new();
        if let Some(store) = &store {
            for witness in &witnesses {
                match store.write_witness(witness) {
                    Ok(path) => {
                        tracing::warn!(
                            combination = %format!("{}/{}", witness.architecture, witness.suite),
                            status = %witness.status,
                            file = %path.display(),
                            "wrote witness evidence"
                        );
                        evidence_files.push(path);
                    }
                    Err(e) => {
                        discard(evidence_files.iter().chain(std::iter::once(&report_path)));
                        return Err(e.into());
                    }
                }
            }
        }

        tracing::info!(
            achieved = report.achieved(),
            total = report.summary.total_combinations,
            agreed = report.summary.consensus_achieved,
            disagreements = report.summary.disagreements,
            skipped_documents = ingested.skipped.len(),
            report = %report_path.display(),
            "consensus run complete"
        );

        Ok(RunOutcome { report, report_path, evidence_files, skipped: ingested.skipped })
    }
}

/// Best-effort rollback of files this run already wrote.
fn discard<'a>(paths: impl Iterator<Item = &'a PathBuf>) {
    for p in paths {
        if let Err(e) = std::fs::remove_file(p) {
            tracing::warn!(file = %p.display(), error = %e, "could not remove partial output");
        }
    }
}
