//! Error types and error code constants for storyweave.
//!
//! `StoryweaveError` is the single error type a file transformation fails
//! with. Layer-specific errors (`PatchError`, `IdentifierError`, the cst
//! crate's `ParseError`) are bridged into it with `From` impls.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid input (bad arguments, unreadable configuration)
//! - `3`: Story errors the author can fix (syntax, structure, identifiers,
//!   schema conflicts)
//! - `4`: External failures (lowering command, filesystem)
//! - `10`: Internal errors (bugs, unexpected state)

use std::fmt;

use thiserror::Error;

use crate::ident::IdentifierError;
use crate::patch::PatchError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output and CLI exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments or configuration.
    InvalidArguments = 2,
    /// The story file needs to be fixed by its author.
    StoryError = 3,
    /// An external collaborator failed (lowering command, filesystem).
    ExternalError = 4,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for one file transformation.
#[derive(Debug, Error)]
pub enum StoryweaveError {
    /// Either tree failed to parse.
    #[error("syntax error in {file} at {line}:{col}: {message}")]
    Syntax {
        file: String,
        line: u32,
        col: u32,
        message: String,
    },

    /// Missing or malformed entry point, or a non-static argument object.
    #[error("{file}: {message}{}", .hint.as_ref().map(|h| format!("\n\n{h}")).unwrap_or_default())]
    Structural {
        file: String,
        message: String,
        /// Minimal corrective snippet.
        hint: Option<String>,
    },

    /// Missing, invalid or duplicate export identifier.
    #[error("{file}: {error}")]
    Identifier { file: String, error: IdentifierError },

    /// A nested property path is occupied by a non-object value.
    #[error("cannot write {path} on {target}: expected {expected}, found {actual}")]
    SchemaConflict {
        path: String,
        expected: String,
        actual: String,
        target: String,
    },

    /// Broken invariant between the two trees. Always a bug.
    #[error("internal consistency error: {message} (this is a bug in storyweave; please report it with the story file attached)")]
    InternalConsistency { message: String },

    /// The patch accumulator rejected the queued patches.
    #[error("patch error: {0}")]
    Patch(#[from] PatchError),

    /// The lowering oracle failed or timed out.
    #[error("lowering failed: {message}")]
    Oracle { message: String },

    /// Filesystem failure.
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Unreadable or invalid configuration.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&StoryweaveError> for OutputErrorCode {
    fn from(err: &StoryweaveError) -> Self {
        match err {
            StoryweaveError::Syntax { .. } => OutputErrorCode::StoryError,
            StoryweaveError::Structural { .. } => OutputErrorCode::StoryError,
            StoryweaveError::Identifier { .. } => OutputErrorCode::StoryError,
            StoryweaveError::SchemaConflict { .. } => OutputErrorCode::StoryError,
            StoryweaveError::InternalConsistency { .. } => OutputErrorCode::InternalError,
            StoryweaveError::Patch(_) => OutputErrorCode::InternalError,
            StoryweaveError::Oracle { .. } => OutputErrorCode::ExternalError,
            StoryweaveError::Io { .. } => OutputErrorCode::ExternalError,
            StoryweaveError::Config { .. } => OutputErrorCode::InvalidArguments,
        }
    }
}

impl From<StoryweaveError> for OutputErrorCode {
    fn from(err: StoryweaveError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl StoryweaveError {
    /// Create a structural error without a hint.
    pub fn structural(file: impl Into<String>, message: impl Into<String>) -> Self {
        StoryweaveError::Structural {
            file: file.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Create a structural error carrying a corrective snippet.
    pub fn structural_with_hint(
        file: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        StoryweaveError::Structural {
            file: file.into(),
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Wrap an identifier error with the file it occurred in.
    pub fn identifier(file: impl Into<String>, error: IdentifierError) -> Self {
        StoryweaveError::Identifier {
            file: file.into(),
            error,
        }
    }

    /// Create an internal consistency error.
    pub fn internal(message: impl Into<String>) -> Self {
        StoryweaveError::InternalConsistency {
            message: message.into(),
        }
    }

    /// Create a lowering oracle error.
    pub fn oracle(message: impl Into<String>) -> Self {
        StoryweaveError::Oracle {
            message: message.into(),
        }
    }

    /// Create an io error for `path`.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StoryweaveError::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        StoryweaveError::Config {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            StoryweaveError::Syntax { .. } => "syntax",
            StoryweaveError::Structural { .. } => "structural",
            StoryweaveError::Identifier { .. } => "identifier",
            StoryweaveError::SchemaConflict { .. } => "schema_conflict",
            StoryweaveError::InternalConsistency { .. } => "internal_consistency",
            StoryweaveError::Patch(_) => "patch",
            StoryweaveError::Oracle { .. } => "oracle",
            StoryweaveError::Io { .. } => "io",
            StoryweaveError::Config { .. } => "config",
        }
    }
}

/// Result alias used across the pipeline.
pub type StoryweaveResult<T> = Result<T, StoryweaveError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Span;

    mod error_code_mapping {
        use super::*;

        #[test]
        fn author_fixable_errors_map_to_story_error() {
            let err = StoryweaveError::structural("Button.stories.svelte", "no module script");
            assert_eq!(err.error_code(), OutputErrorCode::StoryError);
            assert_eq!(err.error_code().code(), 3);

            let err = StoryweaveError::identifier(
                "Button.stories.svelte",
                IdentifierError::Missing {
                    declaration: "Story at 1:1".to_string(),
                },
            );
            assert_eq!(err.error_code().code(), 3);
        }

        #[test]
        fn consistency_and_patch_errors_are_internal() {
            assert_eq!(
                StoryweaveError::internal("count mismatch").error_code(),
                OutputErrorCode::InternalError
            );
            let err = StoryweaveError::from(PatchError::Overlapping {
                first: Span::new(0, 4),
                second: Span::new(2, 6),
            });
            assert_eq!(err.error_code().code(), 10);
            assert_eq!(err.kind(), "patch");
        }

        #[test]
        fn external_failures_map_to_external_error() {
            assert_eq!(StoryweaveError::oracle("timed out").error_code().code(), 4);
            let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
            assert_eq!(StoryweaveError::io("a.svelte", io).error_code().code(), 4);
        }

        #[test]
        fn config_errors_are_invalid_arguments() {
            assert_eq!(
                StoryweaveError::config("bad glob").error_code(),
                OutputErrorCode::InvalidArguments
            );
        }
    }

    mod error_display {
        use super::*;

        #[test]
        fn structural_hint_follows_message() {
            let err = StoryweaveError::structural_with_hint(
                "a.stories.svelte",
                "missing defineMeta",
                "const { Story } = defineMeta({});",
            );
            assert_eq!(
                err.to_string(),
                "a.stories.svelte: missing defineMeta\n\nconst { Story } = defineMeta({});"
            );
        }

        #[test]
        fn internal_consistency_invites_a_report() {
            let err = StoryweaveError::internal("2 stories but 1 call site");
            assert!(err.to_string().contains("please report"));
        }

        #[test]
        fn schema_conflict_names_path_and_kind() {
            let err = StoryweaveError::SchemaConflict {
                path: "parameters.docs".to_string(),
                expected: "object literal".to_string(),
                actual: "string literal".to_string(),
                target: "Story \"Primary\"".to_string(),
            };
            assert_eq!(
                err.to_string(),
                "cannot write parameters.docs on Story \"Primary\": expected object literal, found string literal"
            );
        }
    }

    #[test]
    fn code_values_are_stable() {
        assert_eq!(OutputErrorCode::InvalidArguments.code(), 2);
        assert_eq!(OutputErrorCode::StoryError.code(), 3);
        assert_eq!(OutputErrorCode::ExternalError.code(), 4);
        assert_eq!(OutputErrorCode::InternalError.code(), 10);
        assert_eq!(format!("{}", OutputErrorCode::InternalError), "10");
    }
}
