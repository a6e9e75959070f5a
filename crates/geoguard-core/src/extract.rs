//! Entry and tag recovery from geo-rule list files.
//!
//! `geosite.dat` and `geoip.dat` are both a single list message whose field 1
//! repeats once per entry. Each entry is itself a message whose field 1 is the
//! entry's tag (a country or category code); the remaining fields hold the
//! domain or CIDR rule bodies and are never looked at.
//!
//! ## Algorithm Overview
//!
//! 1. Walk the top-level fields of the buffer
//! 2. For every `(entry_field, LEN)` field, walk the nested entry message
//! 3. Take the first `(tag_field, LEN)` field of the entry as its tag
//! 4. Skip every other field at either level
//!
//! An entry without a readable tag is an error rather than a skipped entry:
//! a lost tag is exactly the corruption this check exists to catch.
//!
//! ## Extensibility
//!
//! The [`TagExtractor`] trait allows plugging in a different layout:
//!
//! ```no_run
//! use geoguard_core::extract::{EntryList, TagExtractor};
//! use geoguard_core::Result;
//!
//! struct FixedTags;
//!
//! impl TagExtractor for FixedTags {
//!     fn extract(&self, _data: &[u8]) -> Result<EntryList> {
//!         Ok(EntryList::default())
//!     }
//! }
//! ```

use crate::error::{Error, Result};
use crate::wire::{FieldReader, WireField};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Deduplicated set of tags found in a file
pub type TagSet = BTreeSet<String>;

/// Field number of an entry within the list message
pub const DEFAULT_ENTRY_FIELD: u32 = 1;

/// Field number of the tag within an entry message
pub const DEFAULT_TAG_FIELD: u32 = 1;

/// One recovered rule entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// The entry's identifying tag, never empty
    pub tag: String,
}

/// Entries of one file in source order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntryList {
    entries: Vec<Entry>,
}

impl EntryList {
    /// Creates an entry list from already-recovered entries
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Number of entries, duplicates included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the file held no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries in source order
    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Returns the deduplicated tag set
    pub fn tags(&self) -> TagSet {
        self.entries.iter().map(|e| e.tag.clone()).collect()
    }
}

impl IntoIterator for EntryList {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a EntryList {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Configuration for the extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Field number of entries in the list message
    pub entry_field: u32,
    /// Field number of the tag in an entry message
    pub tag_field: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            entry_field: DEFAULT_ENTRY_FIELD,
            tag_field: DEFAULT_TAG_FIELD,
        }
    }
}

impl ExtractorConfig {
    /// Creates a new extractor config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the field number of entries in the list message
    pub fn entry_field(mut self, number: u32) -> Self {
        self.entry_field = number;
        self
    }

    /// Sets the field number of the tag in an entry message
    pub fn tag_field(mut self, number: u32) -> Self {
        self.tag_field = number;
        self
    }
}

/// Trait for recovering entries from a file buffer
pub trait TagExtractor: Send + Sync {
    /// Decode the buffer into its entries
    fn extract(&self, data: &[u8]) -> Result<EntryList>;

    /// Decode the buffer into its deduplicated tag set
    fn tags(&self, data: &[u8]) -> Result<TagSet> {
        self.extract(data).map(|entries| entries.tags())
    }
}

/// Default extractor for geosite/geoip list files
#[derive(Debug, Clone, Default)]
pub struct EntryExtractor {
    config: ExtractorConfig,
}

impl EntryExtractor {
    /// Creates a new extractor with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new extractor with custom configuration
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Recovers the tag of one entry message
    fn read_entry(&self, data: &[u8], field: &WireField<'_>, index: usize) -> Result<Entry> {
        let mut tag = None;

        // The whole entry is walked so a truncated body still fails the file
        for inner in FieldReader::with_range(data, field.payload.clone()) {
            let inner = inner?;
            if tag.is_none() && inner.is_len(self.config.tag_field) {
                tag = inner.as_bytes();
            }
        }

        let bytes = tag.ok_or_else(|| {
            Error::missing_tag(
                index,
                field.offset,
                format!("no field {} string", self.config.tag_field),
            )
        })?;

        let tag = std::str::from_utf8(bytes).map_err(|e| {
            Error::missing_tag(index, field.offset, format!("tag is not valid UTF-8: {}", e))
        })?;

        if tag.is_empty() {
            return Err(Error::missing_tag(index, field.offset, "tag is empty"));
        }

        trace!("Entry #{} at offset {}: {}", index, field.offset, tag);
        Ok(Entry {
            tag: tag.to_string(),
        })
    }
}

impl TagExtractor for EntryExtractor {
    fn extract(&self, data: &[u8]) -> Result<EntryList> {
        let mut entries = Vec::new();
        let mut skipped = 0usize;

        debug!("Decoding {} bytes", data.len());

        for field in FieldReader::new(data) {
            let field = field?;
            if !field.is_len(self.config.entry_field) {
                skipped += 1;
                continue;
            }

            let entry = self.read_entry(data, &field, entries.len())?;
            entries.push(entry);
        }

        debug!(
            "Decoded {} entries ({} unrelated top-level fields skipped)",
            entries.len(),
            skipped
        );
        Ok(EntryList::new(entries))
    }
}

/// Read a file and extract its entries
///
/// This is a convenience function that reads the file and decodes it with the
/// default extractor.
pub fn extract_file(path: impl AsRef<std::path::Path>) -> Result<EntryList> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
    EntryExtractor::new().extract(&data)
}
