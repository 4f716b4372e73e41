//! Errors raised by format handlers.

use thiserror::Error;

/// Error raised when content does not conform to its format.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The document is well-formed but lacks what the format requires.
    #[error("{format} content is malformed: {reason}")]
    Corrupt {
        /// Handler name.
        format: &'static str,
        /// Human-readable explanation.
        reason: String,
    },
    /// The XML reader rejected the document.
    #[error("failed to read {format} XML at byte {position}: {source}")]
    Xml {
        /// Handler name.
        format: &'static str,
        /// Byte offset of the failure.
        position: u64,
        /// Underlying reader error.
        #[source]
        source: quick_xml::Error,
    },
    /// A JSON document could not be decoded.
    #[error("failed to decode {format} JSON: {source}")]
    Json {
        /// Handler name.
        format: &'static str,
        /// Underlying decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// A zip archive could not be read.
    #[error("failed to read {format} archive: {source}")]
    Archive {
        /// Handler name.
        format: &'static str,
        /// Underlying archive error.
        #[source]
        source: zip::result::ZipError,
    },
}

impl FormatError {
    pub(crate) fn corrupt(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            format,
            reason: reason.into(),
        }
    }

    /// Handler that raised the error.
    #[must_use]
    pub const fn format(&self) -> &'static str {
        match self {
            Self::Corrupt { format, .. }
            | Self::Xml { format, .. }
            | Self::Json { format, .. }
            | Self::Archive { format, .. } => format,
        }
    }
}
