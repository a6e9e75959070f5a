//! Required-tag configuration.
//!
//! The configuration is a JSON document listing, per data file, where it is
//! published and which tags it must contain:
//!
//! ```json
//! {
//!   "geosite_files": {
//!     "geosite.dat": { "url": "https://example.com/geosite.dat", "required_tags": ["google"] }
//!   },
//!   "geoip_files": {
//!     "geoip.dat": { "url": "https://example.com/geoip.dat", "required_tags": ["private"] }
//!   }
//! }
//! ```
//!
//! It is loaded and validated once, before any file is decoded, and then
//! handed around as plain values.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Which list layout a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Domain rule lists (`geosite.dat`)
    GeoSite,
    /// CIDR rule lists (`geoip.dat`)
    GeoIp,
}

impl FileKind {
    /// Returns the label used in output
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::GeoSite => "geosite",
            FileKind::GeoIp => "geoip",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured file as written in the JSON document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSpec {
    /// Where the file is published
    pub url: String,
    /// Tags the file must contain
    pub required_tags: Vec<String>,
}

/// The whole configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequiredRules {
    /// Domain list files keyed by file name
    #[serde(default)]
    pub geosite_files: BTreeMap<String, FileSpec>,
    /// IP list files keyed by file name
    #[serde(default)]
    pub geoip_files: BTreeMap<String, FileSpec>,
}

/// Requirement for a single file, ready to be matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleRequirement {
    /// File name, also the name of the downloaded file
    pub file_name: String,
    /// List layout of the file
    pub kind: FileKind,
    /// Opaque source location, only shown in diagnostics
    pub source_locator: String,
    /// Tags that must be present
    pub required_tags: BTreeSet<String>,
}

impl RuleRequirement {
    /// Creates a requirement
    pub fn new<I, S>(
        file_name: impl Into<String>,
        kind: FileKind,
        source_locator: impl Into<String>,
        required_tags: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            file_name: file_name.into(),
            kind,
            source_locator: source_locator.into(),
            required_tags: required_tags.into_iter().map(Into::into).collect(),
        }
    }
}

impl RequiredRules {
    /// Parses and validates a configuration document
    pub fn from_json(text: &str) -> Result<Self> {
        let rules: Self = serde_json::from_str(text)?;
        rules.validate()?;
        debug!(
            "Loaded configuration: {} geosite file(s), {} geoip file(s)",
            rules.geosite_files.len(),
            rules.geoip_files.len()
        );
        Ok(rules)
    }

    /// Reads, parses and validates a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::from_json(&text).map_err(|e| match e {
            Error::Configuration(msg) => {
                Error::configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Checks the structural rules the JSON shape cannot express
    pub fn validate(&self) -> Result<()> {
        if self.geosite_files.is_empty() && self.geoip_files.is_empty() {
            return Err(Error::configuration("no files configured"));
        }

        for (name, spec) in self.files() {
            if name.is_empty() {
                return Err(Error::configuration("empty file name"));
            }
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(Error::configuration(format!(
                    "file name '{}' must be a plain file name",
                    name
                )));
            }
            if spec.required_tags.iter().any(|t| t.is_empty()) {
                return Err(Error::configuration(format!(
                    "'{}' lists an empty required tag",
                    name
                )));
            }
        }

        if let Some(name) = self
            .geosite_files
            .keys()
            .find(|name| self.geoip_files.contains_key(*name))
        {
            return Err(Error::configuration(format!(
                "'{}' is configured as both geosite and geoip",
                name
            )));
        }

        Ok(())
    }

    fn files(&self) -> impl Iterator<Item = (&String, &FileSpec)> {
        self.geosite_files.iter().chain(self.geoip_files.iter())
    }

    /// Returns one requirement per configured file
    ///
    /// Geosite files come first, then geoip files, each in file-name order.
    pub fn requirements(&self) -> Vec<RuleRequirement> {
        let sites = self
            .geosite_files
            .iter()
            .map(|(name, spec)| (name, spec, FileKind::GeoSite));
        let ips = self
            .geoip_files
            .iter()
            .map(|(name, spec)| (name, spec, FileKind::GeoIp));

        sites
            .chain(ips)
            .map(|(name, spec, kind)| {
                RuleRequirement::new(name, kind, &spec.url, spec.required_tags.iter().cloned())
            })
            .collect()
    }
}
