use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use concord_core::PlatformName;
use concord_normalize::{normalize_document, IngestError};
use concord_runner::{render_markdown, Overrides, RunError, Runner, EXIT_CONFIG, EXIT_IO};

/// `concord normalize` was given a document it cannot parse as a report.
const EXIT_MALFORMED: u8 = 5;

#[derive(Parser)]
#[command(
    name = "concord",
    version,
    about = "Cross-platform consensus for reproducible-build checksums"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default concord.toml in the current directory
    Init,

    /// Compare every platform's report and write the consensus report
    Evaluate {
        /// Config file (default: ./concord.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory holding one report document per platform
        #[arg(long)]
        input: Option<String>,
        /// Where to write the consensus report
        #[arg(long)]
        output: Option<String>,
        /// Every platform must report the same checksum
        #[arg(long, conflicts_with = "threshold")]
        require_all: bool,
        /// Platforms that must share a checksum
        #[arg(long)]
        threshold: Option<usize>,
        /// Platforms that must report a combination before it can agree
        #[arg(long)]
        min_platforms: Option<usize>,
        /// Directory for witness evidence on disagreement
        #[arg(long)]
        evidence_dir: Option<String>,
        /// Build serial; documents for other serials are skipped
        #[arg(long)]
        serial: Option<String>,
        /// Print a markdown summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Print the canonical records parsed from one document
    Normalize {
        file: PathBuf,
        #[arg(long)]
        platform: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_IO
        }
    };
    ExitCode::from(code)
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    let cwd = std::env::current_dir()?;

    match cli.cmd {
        Command::Init => {
            let path = Runner::init(&cwd)?;
            println!("Initialized {}", path.display());
            Ok(0)
        }
        Command::Evaluate {
            config,
            input,
            output,
            require_all,
            threshold,
            min_platforms,
            evidence_dir,
            serial,
            summary,
        } => {
            let mut r = match Runner::open(cwd, config.as_deref()) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("error: {e:#}");
                    return Ok(EXIT_CONFIG);
                }
            };
            r.cfg.apply(&Overrides {
                input_dir: input,
                report: output,
                serial,
                require_all: require_all.then_some(true),
                threshold,
                min_platforms,
                evidence_dir,
            });
            // An explicit threshold means threshold mode even if the file says strict.
            if threshold.is_some() && !require_all {
                r.cfg.policy.require_all = false;
            }

            match r.evaluate() {
                Ok(outcome) => {
                    if summary {
                        print!("{}", render_markdown(&outcome.report));
                    } else {
                        let verdict =
                            if outcome.report.achieved() { "consensus" } else { "no consensus" };
                        println!(
                            "{}: {}/{} combinations agreed, report at {}",
                            verdict,
                            outcome.report.summary.consensus_achieved,
                            outcome.report.summary.total_combinations,
                            outcome.report_path.display()
                        );
                    }
                    Ok(outcome.exit_code())
                }
                Err(e) => {
                    eprintln!("error: {}", describe(&e));
                    Ok(e.exit_code())
                }
            }
        }
        Command::Normalize { file, platform } => match normalize_file(&file, &platform) {
            Ok(doc) => {
                println!("{}", serde_json::to_string_pretty(&doc)?);
                Ok(0)
            }
            Err(e) => {
                eprintln!("error: {e}");
                Ok(normalize_exit_code(&e))
            }
        },
    }
}

fn normalize_file(file: &Path, platform: &str) -> Result<serde_json::Value, IngestError> {
    let name = file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let bytes = std::fs::read(file)
        .map_err(|e| IngestError::unavailable(&file.display().to_string(), e.to_string()))?;
    let doc = normalize_document(&PlatformName::from_str(platform), &name, &bytes)?;
    Ok(serde_json::json!({
        "platform": doc.platform,
        "document": doc.document,
        "shape": doc.shape,
        "sha256": doc.sha256,
        "records": doc.records,
    }))
}

fn normalize_exit_code(e: &IngestError) -> u8 {
    match e {
        IngestError::SourceUnavailable { .. } => EXIT_IO,
        IngestError::MalformedReport { .. } => EXIT_MALFORMED,
    }
}

fn describe(e: &RunError) -> String {
    match e {
        RunError::Io(inner) => format!("{inner:#}"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_document_has_its_own_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();
        let bad = dir.join("github.json");
        std::fs::write(&bad, "{ not json").unwrap();

        let err = normalize_file(&bad, "github").unwrap_err();
        assert_eq!(normalize_exit_code(&err), EXIT_MALFORMED);

        let err = normalize_file(&dir.join("missing.json"), "github").unwrap_err();
        assert_eq!(normalize_exit_code(&err), EXIT_IO);
    }

    #[test]
    fn normalize_prints_canonical_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitlab.json");
        let sum = "ab".repeat(32);
        let doc = serde_json::json!([
            { "architecture": "amd64", "suite": "bookworm", "sha256": sum }
        ]);
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        let out = normalize_file(&path, "gitlab").unwrap();
        assert_eq!(out["shape"], serde_json::json!("flat_list"));
        assert_eq!(out["records"][0]["checksum"], serde_json::json!(sum));
    }
}
