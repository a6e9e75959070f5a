//! Required-tag matching.

use crate::config::RuleRequirement;
use crate::extract::TagSet;
use serde::Serialize;

/// Outcome of matching one file's tags against its requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// File the tags came from
    pub file_name: String,
    /// Number of distinct tags in the file
    pub total_tags: usize,
    /// Required tags that were found
    pub present_tags: TagSet,
    /// Required tags that were not found
    pub missing_tags: TagSet,
}

impl MatchResult {
    /// Returns true if no required tag is missing
    pub fn is_ok(&self) -> bool {
        self.missing_tags.is_empty()
    }
}

/// Compare the tags found in a file with the tags it must contain.
///
/// Comparison is exact and case-sensitive; tags are not trimmed or folded.
pub fn match_requirement(requirement: &RuleRequirement, tags: &TagSet) -> MatchResult {
    let (present_tags, missing_tags): (TagSet, TagSet) = requirement
        .required_tags
        .iter()
        .cloned()
        .partition(|tag| tags.contains(tag));

    MatchResult {
        file_name: requirement.file_name.clone(),
        total_tags: tags.len(),
        present_tags,
        missing_tags,
    }
}
