use concord_core::ConsensusReport;

fn short(sum: &str) -> &str {
    sum.get(..12).unwrap_or(sum)
}

/// Markdown digest of a report, suitable for a CI job summary.
pub fn render_markdown(report: &ConsensusReport) -> String {
    let mut s = String::new();
    let verdict = if report.achieved() { "CONSENSUS" } else { "NO CONSENSUS" };
    s.push_str(&format!("# Cross-platform consensus: {}\n\n", verdict));
    if let Some(serial) = &report.serial {
        s.push_str(&format!("**Serial:** {}\n\n", serial));
    }
    let policy = if report.consensus.require_all {
        format!("require all (min {} platforms)", report.consensus.min_platforms)
    } else {
        format!(
            "{} matching (min {} platforms)",
            report.consensus.threshold, report.consensus.min_platforms
        )
    };
    s.push_str(&format!("**Policy:** {}\n\n", policy));
    s.push_str(&format!("**Platforms:** {}\n\n", report.platforms.join(", ")));
    s.push_str(&format!(
        "**Agreed:** {}/{} ({:.1}%)\n\n",
        report.summary.consensus_achieved,
        report.summary.total_combinations,
        report.summary.consensus_rate * 100.0
    ));

    s.push_str("| Architecture | Suite | Status | Agreeing | Checksum |\n");
    s.push_str("|---|---|---|---|---|\n");
    for v in &report.comparisons {
        let sum = v.consensus_checksum.as_deref().map(short).unwrap_or("-");
        s.push_str(&format!(
            "| {} | {} | {} | {}/{} | {} |\n",
            v.architecture, v.suite, v.status, v.platforms_agreeing, v.platforms_total, sum
        ));
    }

    let skipped: Vec<_> = report
        .sources
        .iter()
        .filter_map(|src| src.skipped.as_ref().map(|why| (src, why)))
        .collect();
    if !skipped.is_empty() {
        s.push_str("\n## Skipped documents\n");
        for (src, why) in skipped {
            s.push_str(&format!("- {} ({}): {}\n", src.file, src.platform, why));
        }
    }
    if !report.evidence.is_empty() {
        s.push_str("\n## Witness evidence\n");
        for f in &report.evidence {
            s.push_str(&format!("- {}\n", f));
        }
    }
    s
}
