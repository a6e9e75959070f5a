//! Run verdict assembly.
//!
//! A [`Report`] is the only thing handed to the reporting side (console
//! summary, CI step summary, ticket creation). It keeps files with missing
//! tags and files that could not be decoded in separate lists.

use crate::config::RuleRequirement;
use crate::error::{Error, ErrorKind};
use crate::extract::TagExtractor;
use crate::matcher::{match_requirement, MatchResult};
use serde::Serialize;
use tracing::{debug, warn};

/// Result of checking one configured file
#[derive(Debug)]
pub struct FileOutcome {
    /// The requirement the file was checked against
    pub requirement: RuleRequirement,
    /// Match result, or the error that stopped the file
    pub result: Result<MatchResult, Error>,
}

impl FileOutcome {
    /// Creates an outcome for a file that decoded
    pub fn matched(requirement: RuleRequirement, result: MatchResult) -> Self {
        Self {
            requirement,
            result: Ok(result),
        }
    }

    /// Creates an outcome for a file that could not be read or decoded
    pub fn failed(requirement: RuleRequirement, error: Error) -> Self {
        Self {
            requirement,
            result: Err(error),
        }
    }

    /// Returns true if the file decoded and carries every required tag
    pub fn is_ok(&self) -> bool {
        matches!(&self.result, Ok(result) if result.is_ok())
    }
}

/// Decode one buffer and match it against its requirement
///
/// Decode errors are captured in the outcome rather than returned, so one
/// corrupt file does not stop the others from being checked.
pub fn check_buffer(
    extractor: &dyn TagExtractor,
    requirement: RuleRequirement,
    data: &[u8],
) -> FileOutcome {
    match extractor.tags(data) {
        Ok(tags) => {
            let result = match_requirement(&requirement, &tags);
            debug!(
                "{}: {} tags, {} required present, {} missing",
                requirement.file_name,
                result.total_tags,
                result.present_tags.len(),
                result.missing_tags.len()
            );
            FileOutcome::matched(requirement, result)
        }
        Err(e) => {
            warn!("{}: failed to decode: {}", requirement.file_name, e);
            FileOutcome::failed(requirement, e)
        }
    }
}

/// A file that decoded but lacks required tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// File name
    pub file_name: String,
    /// Missing tags in sorted order
    pub missing_tags: Vec<String>,
}

/// A file that could not be read or decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeFailure {
    /// File name
    pub file_name: String,
    /// Error category
    pub kind: ErrorKind,
    /// Error message
    pub message: String,
}

/// Verdict of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    /// True iff every file decoded and none lacks a required tag
    pub overall_ok: bool,
    /// Files with missing tags
    pub failures: Vec<Failure>,
    /// Files that could not be read or decoded
    pub errors: Vec<DecodeFailure>,
    /// Match results of every file that decoded, in check order
    pub results: Vec<MatchResult>,
}

impl Report {
    /// Aggregates per-file outcomes into a verdict
    pub fn assemble(outcomes: impl IntoIterator<Item = FileOutcome>) -> Self {
        let mut report = Report::default();

        for outcome in outcomes {
            match outcome.result {
                Ok(result) => {
                    if !result.is_ok() {
                        report.failures.push(Failure {
                            file_name: result.file_name.clone(),
                            missing_tags: result.missing_tags.iter().cloned().collect(),
                        });
                    }
                    report.results.push(result);
                }
                Err(e) => report.errors.push(DecodeFailure {
                    file_name: outcome.requirement.file_name,
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            }
        }

        report.overall_ok = report.failures.is_empty() && report.errors.is_empty();
        report
    }

    /// One line per problem, suitable for summaries
    pub fn problems(&self) -> Vec<String> {
        let errors = self.errors.iter().map(|e| {
            format!(
                "{}: failed to read or decode ({}): {}",
                e.file_name,
                e.kind.as_str(),
                e.message
            )
        });
        let missing = self.failures.iter().flat_map(|f| {
            f.missing_tags
                .iter()
                .map(move |tag| format!("{}: missing tag '{}'", f.file_name, tag))
        });
        errors.chain(missing).collect()
    }
}
