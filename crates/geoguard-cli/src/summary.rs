//! Human-readable rendering of check results.
//!
//! Console output is produced per file as files are checked; the Markdown
//! section is appended to a CI step summary file when the run fails.

use anyhow::{Context, Result};
use geoguard_core::{FileOutcome, Report};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

const RULE: &str = "============================================================";

/// Size and short content digest of a checked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileStats {
    pub(crate) size: u64,
    pub(crate) digest: String,
}

impl FileStats {
    pub(crate) fn of(data: &[u8]) -> Self {
        Self {
            size: data.len() as u64,
            digest: content_hash(data),
        }
    }
}

/// Compute a short hash of the content (first 8 chars of blake3)
pub(crate) fn content_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.to_hex()[..8].to_string()
}

fn megabytes(size: u64) -> f64 {
    size as f64 / (1024.0 * 1024.0)
}

/// Write the console block for one checked file
pub(crate) fn write_outcome(
    out: &mut impl fmt::Write,
    outcome: &FileOutcome,
    stats: Option<&FileStats>,
) -> fmt::Result {
    let req = &outcome.requirement;

    writeln!(out, "{}", RULE)?;
    writeln!(out, "Checking {}: {}", req.kind, req.file_name)?;
    writeln!(out, "{}", RULE)?;

    if let Some(stats) = stats {
        writeln!(
            out,
            "  File: {:.1} MB, blake3 {}",
            megabytes(stats.size),
            stats.digest
        )?;
    }

    match &outcome.result {
        Ok(result) => {
            writeln!(out, "  Total tags in file: {}", result.total_tags)?;
            for tag in &result.present_tags {
                writeln!(out, "  ok       {}", tag)?;
            }
            for tag in &result.missing_tags {
                writeln!(out, "  MISSING  {}", tag)?;
            }
        }
        Err(e) => {
            writeln!(out, "  FAILED to read or decode {}: {}", req.file_name, e)?;
        }
    }

    Ok(())
}

/// Write the final verdict block
pub(crate) fn write_verdict(out: &mut impl fmt::Write, report: &Report) -> fmt::Result {
    writeln!(out, "{}", RULE)?;

    if report.overall_ok {
        writeln!(out, "ALL CHECKS PASSED")?;
    } else {
        writeln!(out, "CHECKS FAILED")?;
        for line in report.problems() {
            writeln!(out, "  - {}", line)?;
        }
    }

    writeln!(out, "{}", RULE)
}

/// Write the Markdown section for a failed run
pub(crate) fn write_markdown(out: &mut impl fmt::Write, report: &Report) -> fmt::Result {
    writeln!(out, "## Geodata Check Failed")?;
    writeln!(out)?;
    for line in report.problems() {
        writeln!(out, "- `{}`", line)?;
    }
    Ok(())
}

/// Append the Markdown section to `path`, creating the file if needed
pub(crate) fn append_markdown(path: &Path, report: &Report) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open summary file: {}", path.display()))?;

    let mut section = String::new();
    write_markdown(&mut section, report).context("Failed to render summary")?;

    file.write_all(section.as_bytes())
        .with_context(|| format!("Failed to write summary file: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoguard_core::{Error, FileKind, MatchResult, RuleRequirement, TagSet};
    use pretty_assertions::assert_eq;

    fn requirement(name: &str) -> RuleRequirement {
        RuleRequirement::new(name, FileKind::GeoSite, "", ["google", "telegram"])
    }

    fn missing_telegram() -> FileOutcome {
        FileOutcome::matched(
            requirement("geosite.dat"),
            MatchResult {
                file_name: "geosite.dat".to_string(),
                total_tags: 120,
                present_tags: TagSet::from(["google".to_string()]),
                missing_tags: TagSet::from(["telegram".to_string()]),
            },
        )
    }

    #[test]
    fn test_content_hash() {
        let hash1 = content_hash(b"hello");
        let hash2 = content_hash(b"hello");
        let hash3 = content_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 8);
    }

    #[test]
    fn test_write_outcome() {
        let stats = FileStats::of(&[0u8; 16]);
        let mut text = String::new();
        write_outcome(&mut text, &missing_telegram(), Some(&stats)).unwrap();
        assert!(text.contains("Checking geosite: geosite.dat"));
        assert!(text.contains("Total tags in file: 120"));
        assert!(text.contains("ok       google"));
        assert!(text.contains("MISSING  telegram"));
        assert!(text.contains(&stats.digest));
    }

    #[test]
    fn test_write_failed_outcome() {
        let outcome = FileOutcome::failed(
            requirement("geosite.dat"),
            Error::truncated(10, 4, 1),
        );
        let mut text = String::new();
        write_outcome(&mut text, &outcome, None).unwrap();
        assert!(text.contains("FAILED to read or decode geosite.dat"));
        assert!(text.contains("truncated input"));
    }

    #[test]
    fn test_write_verdict() {
        let report = Report::assemble([missing_telegram()]);
        let mut text = String::new();
        write_verdict(&mut text, &report).unwrap();
        assert!(text.contains("CHECKS FAILED"));
        assert!(text.contains("geosite.dat: missing tag 'telegram'"));

        let mut ok = String::new();
        write_verdict(&mut ok, &Report::assemble(Vec::new())).unwrap();
        assert!(ok.contains("ALL CHECKS PASSED"));
    }

    #[test]
    fn test_append_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");
        std::fs::write(&path, "# Run\n\n").unwrap();

        let report = Report::assemble([missing_telegram()]);
        append_markdown(&path, &report).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "# Run\n\n## Geodata Check Failed\n\n- `geosite.dat: missing tag 'telegram'`\n"
        );
    }
}
