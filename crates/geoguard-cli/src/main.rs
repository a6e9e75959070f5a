//! geoguard - Check downloaded geo-rule data files for required tags
//!
//! This tool reads the `geosite.dat` / `geoip.dat` files named in a
//! required-tags configuration from a directory, decodes the tag of every
//! entry, and fails when a required tag is missing or a file cannot be
//! decoded.

mod summary;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use geoguard_core::{
    check_buffer, EntryExtractor, Error as CoreError, FileOutcome, Report, RequiredRules,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use summary::FileStats;
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;

/// Check geosite/geoip data files for required tags
#[derive(Parser, Debug)]
#[command(name = "geoguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the required-tags configuration (JSON)
    #[arg(short, long, default_value = "required_rules.json")]
    config: PathBuf,

    /// Directory holding the downloaded data files
    #[arg(short, long, default_value = "./release-assets")]
    input_dir: PathBuf,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Append a Markdown summary to this file when the check fails
    #[arg(long, env = "GITHUB_STEP_SUMMARY")]
    summary: Option<PathBuf>,

    /// Delete files that failed the check so they are not released
    #[arg(long)]
    prune: bool,
}

/// Output format for the results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Per-file listing and verdict
    Text,
    /// The report as JSON (for scripting)
    Json,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let report = run(&cli)?;

    Ok(if report.overall_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Load the configuration, check every configured file and report
fn run(cli: &Cli) -> Result<Report> {
    let rules = RequiredRules::load(&cli.config)
        .with_context(|| format!("Failed to load configuration: {}", cli.config.display()))?;

    if !cli.input_dir.is_dir() {
        warn!("Input directory does not exist: {}", cli.input_dir.display());
    }

    let extractor = EntryExtractor::new();
    let mut outcomes = Vec::new();

    for requirement in rules.requirements() {
        let path = cli.input_dir.join(&requirement.file_name);
        info!(
            "Checking {} {} (from {})",
            requirement.kind,
            path.display(),
            requirement.source_locator
        );

        let (outcome, stats) = check_file(&extractor, requirement, &path);

        if cli.format == OutputFormat::Text {
            let mut text = String::new();
            summary::write_outcome(&mut text, &outcome, stats.as_ref())
                .context("Failed to render file result")?;
            print!("{}", text);
        }

        // A file that cannot be removed is already failing; keep checking the rest
        if cli.prune && !outcome.is_ok() {
            if let Err(e) = prune_file(&path) {
                warn!("{:#}", e);
            }
        }

        outcomes.push(outcome);
    }

    let report = Report::assemble(outcomes);

    match cli.format {
        OutputFormat::Text => {
            let mut text = String::new();
            summary::write_verdict(&mut text, &report).context("Failed to render verdict")?;
            print!("{}", text);
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        }
    }

    if !report.overall_ok {
        if let Some(path) = &cli.summary {
            summary::append_markdown(path, &report)?;
            debug!("Appended summary to {}", path.display());
        }
    }

    Ok(report)
}

/// Read and check one file; read failures become a failed outcome
fn check_file(
    extractor: &EntryExtractor,
    requirement: geoguard_core::RuleRequirement,
    path: &Path,
) -> (FileOutcome, Option<FileStats>) {
    trace!("Reading {}", path.display());
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return (
                FileOutcome::failed(requirement, CoreError::file_read(path, e)),
                None,
            );
        }
    };

    trace!("Read {} bytes from {}", data.len(), path.display());
    let stats = FileStats::of(&data);
    (check_buffer(extractor, requirement, &data), Some(stats))
}

/// Remove a file that failed the check
fn prune_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove file: {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoguard_core::ErrorKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Encode a rule list with one entry per tag
    fn rule_list(tags: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        for tag in tags {
            let mut entry = vec![0x0A, tag.len() as u8];
            entry.extend_from_slice(tag.as_bytes());
            // A domain sub-message that must be skipped
            entry.extend_from_slice(&[0x12, 0x03, 0x08, 0x02, 0x00]);
            out.push(0x0A);
            out.push(entry.len() as u8);
            out.extend(entry);
        }
        out
    }

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::create_dir(dir.path().join("assets")).unwrap();
            fs::write(
                dir.path().join("rules.json"),
                r#"{
                    "geosite_files": {
                        "geosite.dat": { "url": "https://example.com/geosite.dat", "required_tags": ["google", "telegram"] }
                    },
                    "geoip_files": {
                        "geoip.dat": { "url": "https://example.com/geoip.dat", "required_tags": ["ru"] }
                    }
                }"#,
            )
            .unwrap();
            Self { dir }
        }

        fn asset(&self, name: &str) -> PathBuf {
            self.dir.path().join("assets").join(name)
        }

        fn summary(&self) -> PathBuf {
            self.dir.path().join("summary.md")
        }

        fn write(&self, name: &str, data: &[u8]) {
            fs::write(self.asset(name), data).unwrap();
        }

        fn cli(&self, extra: &[&str]) -> Cli {
            let config = self.dir.path().join("rules.json");
            let assets = self.dir.path().join("assets");
            let mut args = vec![
                "geoguard".to_string(),
                "--config".to_string(),
                config.display().to_string(),
                "--input-dir".to_string(),
                assets.display().to_string(),
                "--format".to_string(),
                "json".to_string(),
                "--summary".to_string(),
                self.summary().display().to_string(),
            ];
            args.extend(extra.iter().map(|s| s.to_string()));
            Cli::try_parse_from(args).unwrap()
        }
    }

    #[test]
    fn test_all_files_pass() {
        let fx = Fixture::new();
        fx.write("geosite.dat", &rule_list(&["google", "telegram", "cn"]));
        fx.write("geoip.dat", &rule_list(&["ru", "private"]));

        let report = run(&fx.cli(&[])).unwrap();
        assert!(report.overall_ok);
        assert_eq!(report.results.len(), 2);
    }

    #[test]
    fn test_missing_tag_fails() {
        let fx = Fixture::new();
        fx.write("geosite.dat", &rule_list(&["google"]));
        fx.write("geoip.dat", &rule_list(&["ru"]));

        let report = run(&fx.cli(&[])).unwrap();
        assert!(!report.overall_ok);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].missing_tags, vec!["telegram".to_string()]);
    }

    #[test]
    fn test_corrupt_and_absent_files_are_errors() {
        let fx = Fixture::new();
        let mut corrupt = rule_list(&["google", "telegram"]);
        corrupt.pop();
        fx.write("geosite.dat", &corrupt);

        let report = run(&fx.cli(&[])).unwrap();
        assert!(!report.overall_ok);
        assert!(report.failures.is_empty());

        let kinds: Vec<_> = report.errors.iter().map(|e| (e.file_name.as_str(), e.kind)).collect();
        assert_eq!(
            kinds,
            vec![("geosite.dat", ErrorKind::Format), ("geoip.dat", ErrorKind::Io)]
        );
    }

    #[test]
    fn test_prune_removes_failed_files() {
        let fx = Fixture::new();
        fx.write("geosite.dat", &rule_list(&["google"]));
        fx.write("geoip.dat", &rule_list(&["ru"]));

        let report = run(&fx.cli(&["--prune"])).unwrap();
        assert!(!report.overall_ok);
        assert!(!fx.asset("geosite.dat").exists());
        assert!(fx.asset("geoip.dat").exists());
    }

    #[test]
    fn test_summary_written_on_failure() {
        let fx = Fixture::new();
        fx.write("geosite.dat", &rule_list(&["google"]));
        fx.write("geoip.dat", &rule_list(&["ru"]));
        run(&fx.cli(&[])).unwrap();
        let text = fs::read_to_string(fx.summary()).unwrap();
        assert!(text.contains("geosite.dat: missing tag 'telegram'"));
    }

    #[test]
    fn test_summary_not_written_on_success() {
        let fx = Fixture::new();
        fx.write("geosite.dat", &rule_list(&["google", "telegram"]));
        fx.write("geoip.dat", &rule_list(&["ru"]));
        let report = run(&fx.cli(&[])).unwrap();
        assert!(report.overall_ok);
        assert!(!fx.summary().exists());
    }

    #[test]
    fn test_summary_path_comes_from_arguments() {
        let fx = Fixture::new();
        assert_eq!(fx.cli(&[]).summary, Some(fx.summary()));
    }

    #[test]
    fn test_failed_prune_does_not_stop_the_run() {
        let fx = Fixture::new();
        // A non-empty directory where geosite.dat should be cannot be removed
        fs::create_dir(fx.asset("geosite.dat")).unwrap();
        fs::write(fx.asset("geosite.dat").join("keep"), b"x").unwrap();
        fx.write("geoip.dat", &rule_list(&["ru"]));

        let report = run(&fx.cli(&["--prune"])).unwrap();
        assert!(!report.overall_ok);
        assert!(fx.asset("geosite.dat").is_dir());

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].file_name, "geosite.dat");
        assert_eq!(report.errors[0].kind, ErrorKind::Io);

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].file_name, "geoip.dat");
        assert!(report.results[0].is_ok());

        let text = fs::read_to_string(fx.summary()).unwrap();
        assert!(text.contains("geosite.dat: failed to read or decode (io)"));
    }

    #[test]
    fn test_bad_configuration_is_fatal() {
        let fx = Fixture::new();
        fs::write(fx.dir.path().join("rules.json"), r#"{"geosite_files": []}"#).unwrap();

        let err = run(&fx.cli(&[])).unwrap_err();
        assert!(err.to_string().contains("Failed to load configuration"));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
