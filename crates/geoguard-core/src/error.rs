//! Error types for the geoguard-core library.
//!
//! Binary-format errors carry the absolute byte offset at which decoding
//! stopped. [`Error::kind`] folds the variants into the coarse categories the
//! report distinguishes: a changed or corrupted format is a different upstream
//! problem from a rule that was removed.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for geoguard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all geoguard operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A varint ran for ten bytes without terminating
    #[error("malformed varint at offset {offset}: no terminating byte within 10 bytes")]
    MalformedVarint {
        /// Offset of the first byte of the varint
        offset: usize,
    },

    /// A field key carried a wire type with no valid decoding
    #[error("unknown wire type {wire_type} at offset {offset}")]
    UnknownWireType {
        /// The raw wire type bits
        wire_type: u8,
        /// Offset of the field key
        offset: usize,
    },

    /// A field key carried a field number outside `1..=MAX_FIELD_NUMBER`
    #[error("invalid field number {number} at offset {offset}")]
    InvalidFieldNumber {
        /// The decoded field number
        number: u64,
        /// Offset of the field key
        offset: usize,
    },

    /// Decoding an atom would read past the end of the buffer
    #[error("truncated input at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedInput {
        /// Offset at which the read was attempted
        offset: usize,
        /// Bytes the atom requires
        needed: u64,
        /// Bytes left before the end of the range
        available: usize,
    },

    /// An entry has no readable tag
    #[error("entry #{entry_index} at offset {offset} has no valid tag: {reason}")]
    MissingOrInvalidTag {
        /// Zero-based position of the entry in the list
        entry_index: usize,
        /// Offset of the entry's key in the file
        offset: usize,
        /// What was wrong with the tag field
        reason: String,
    },

    /// The required-tag configuration is not usable
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The binary layout could not be decoded
    Format,
    /// The layout decoded but an entry had no usable tag
    Tag,
    /// The configuration was rejected
    Configuration,
    /// The input could not be read
    Io,
}

impl ErrorKind {
    /// Short label used in summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Format => "format",
            ErrorKind::Tag => "tag",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Io => "io",
        }
    }
}

impl Error {
    /// Creates a new truncated input error
    pub fn truncated(offset: usize, needed: u64, available: usize) -> Self {
        Self::TruncatedInput {
            offset,
            needed,
            available,
        }
    }

    /// Creates a new missing or invalid tag error
    pub fn missing_tag(entry_index: usize, offset: usize, reason: impl Into<String>) -> Self {
        Self::MissingOrInvalidTag {
            entry_index,
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a new configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Returns the category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedVarint { .. }
            | Self::UnknownWireType { .. }
            | Self::InvalidFieldNumber { .. }
            | Self::TruncatedInput { .. } => ErrorKind::Format,
            Self::MissingOrInvalidTag { .. } => ErrorKind::Tag,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::FileRead { .. } => ErrorKind::Io,
        }
    }

    /// Returns true if this error concerns the content of a single data file
    ///
    /// Such errors fail that file only; configuration errors fail the run.
    pub fn is_per_file(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Configuration)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::truncated(12, 8, 3);
        let msg = err.to_string();
        assert!(msg.contains("offset 12"));
        assert!(msg.contains("need 8 bytes"));

        let err = Error::missing_tag(4, 100, "tag is not valid UTF-8");
        assert!(err.to_string().contains("entry #4"));
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::MalformedVarint { offset: 0 }.kind(), ErrorKind::Format);
        assert_eq!(
            Error::UnknownWireType {
                wire_type: 7,
                offset: 0
            }
            .kind(),
            ErrorKind::Format
        );
        assert_eq!(Error::missing_tag(0, 0, "absent").kind(), ErrorKind::Tag);
        assert_eq!(
            Error::configuration("bad").kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_is_per_file() {
        assert!(Error::truncated(0, 1, 0).is_per_file());
        assert!(Error::file_read("/missing", std::io::ErrorKind::NotFound.into()).is_per_file());
        assert!(!Error::configuration("bad").is_per_file());
    }

    #[test]
    fn test_json_error_is_configuration() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
