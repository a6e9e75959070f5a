//! # geoguard-core
//!
//! A library for checking that geo-rule data files (`geosite.dat`,
//! `geoip.dat`) still contain the entries downstream routing configurations
//! refer to by name.
//!
//! This crate provides the core functionality for:
//! - Decoding protobuf wire format without a schema
//! - Recovering the tag of every entry in a rule list
//! - Diffing the recovered tags against a required-tag configuration
//! - Assembling a pass/fail report
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`wire`]: Schema-less wire format decoding
//! - [`extract`]: Entry and tag recovery
//! - [`config`]: Required-tag configuration
//! - [`matcher`]: Required-tag matching
//! - [`report`]: Run verdict assembly
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use geoguard_core::{check_buffer, EntryExtractor, Report, RequiredRules};
//! use std::fs;
//!
//! let rules = RequiredRules::load("required_rules.json")?;
//! let extractor = EntryExtractor::new();
//!
//! let mut outcomes = Vec::new();
//! for requirement in rules.requirements() {
//!     let data = fs::read(&requirement.file_name)?;
//!     outcomes.push(check_buffer(&extractor, requirement, &data));
//! }
//!
//! let report = Report::assemble(outcomes);
//! for problem in report.problems() {
//!     println!("{}", problem);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod report;
pub mod wire;

// Re-export primary types for convenience
pub use config::{FileKind, FileSpec, RequiredRules, RuleRequirement};
pub use error::{Error, ErrorKind, Result};
pub use extract::{extract_file, Entry, EntryExtractor, EntryList, ExtractorConfig, TagExtractor, TagSet};
pub use matcher::{match_requirement, MatchResult};
pub use report::{check_buffer, DecodeFailure, Failure, FileOutcome, Report};
pub use wire::{decode_varint, FieldReader, FieldValue, WireField, WireType};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;
