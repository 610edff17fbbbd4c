//! Error types for scene file decoding.
//!
//! None of these cross the public `decode_metadata` boundary: they are
//! logged and turned into default values there. The fallible entry points
//! (`try_decode_metadata`, `read_vertex_positions`) expose them for callers
//! that want the reason.

use thiserror::Error;

/// Errors that can occur while decoding a PLY scene file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// First header line is not `ply`
    #[error("Not a PLY file")]
    NotPly,

    /// Buffer ended before `end_header`
    #[error("Header terminator `end_header` not found")]
    MissingTerminator,

    /// A header line could not be understood
    #[error("Malformed header line {line}: {reason}")]
    MalformedHeader { line: usize, reason: String },

    /// Body is not binary little-endian
    #[error("Unsupported body format: {0}")]
    UnsupportedFormat(String),

    /// Body too short for a declared element
    #[error("Truncated body for element `{element}`: need {needed} bytes, have {available}")]
    Truncated {
        element: String,
        needed: usize,
        available: usize,
    },

    /// Element required by the caller is not declared
    #[error("Element `{0}` not declared")]
    MissingElement(String),

    /// Property required by the caller is not declared on the element
    #[error("Element `{element}` has no property `{property}`")]
    MissingProperty { element: String, property: String },

    /// Element sits at or after a list property, so its offset is unknown
    #[error("Element `{0}` is not at a fixed-width body offset")]
    VariableWidth(String),
}

impl CodecError {
    /// Creates a malformed-header error.
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedHeader {
            line,
            reason: reason.into(),
        }
    }

    /// True for input the codec chooses not to read, as opposed to broken input.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedFormat(_))
    }
}
