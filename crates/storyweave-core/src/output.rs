//! JSON output types and serialization for CLI responses.
//!
//! Every response carries `status` first and a `schema_version`. Field
//! order and array order are deterministic: the same input produces the
//! same JSON.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::diagnostics::Warning;
use crate::error::{OutputErrorCode, StoryweaveError};
use crate::patch::SourceMap;

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Error Types
// ============================================================================

/// Error information for error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code.
    pub code: u8,
    /// Stable error kind.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    /// Create from a StoryweaveError.
    pub fn from_error(err: &StoryweaveError) -> Self {
        let code = OutputErrorCode::from(err).code();
        let message = err.to_string();

        let details = match err {
            StoryweaveError::Syntax {
                file, line, col, ..
            } => Some(serde_json::json!({ "file": file, "line": line, "col": col })),
            StoryweaveError::Structural { file, hint, .. } => {
                Some(serde_json::json!({ "file": file, "hint": hint }))
            }
            StoryweaveError::SchemaConflict {
                path,
                expected,
                actual,
                target,
            } => Some(serde_json::json!({
                "path": path,
                "expected": expected,
                "actual": actual,
                "target": target
            })),
            StoryweaveError::Io { path, .. } => Some(serde_json::json!({ "path": path })),
            _ => None,
        };

        ErrorInfo {
            code,
            kind: err.kind().to_string(),
            message,
            details,
        }
    }
}

/// Response emitted when a command fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Error information.
    pub error: ErrorInfo,
}

impl ErrorResponse {
    /// Create an error response from a StoryweaveError.
    pub fn from_error(err: &StoryweaveError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Transform
// ============================================================================

/// Response for the transform command in JSON format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformResponse {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    /// The input file name.
    pub file: String,
    /// Final patched text.
    pub code: String,
    /// Source map for `code`.
    pub map: SourceMap,
    /// Export identifiers in catalog order.
    pub stories: Vec<String>,
    /// Non-fatal warnings raised while transforming.
    pub warnings: Vec<Warning>,
}

impl TransformResponse {
    pub fn new(
        file: impl Into<String>,
        code: String,
        map: SourceMap,
        stories: Vec<String>,
        warnings: Vec<Warning>,
    ) -> Self {
        TransformResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            file: file.into(),
            code,
            map,
            stories,
            warnings,
        }
    }
}

// ============================================================================
// Static index
// ============================================================================

/// Meta entry of a static index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub tags: Vec<String>,
}

/// Story entry of a static index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedStory {
    pub export_name: String,
    pub name: String,
    pub tags: Vec<String>,
}

/// Response for the index command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    pub file: String,
    pub meta: IndexedMeta,
    pub stories: Vec<IndexedStory>,
}

impl IndexResponse {
    pub fn new(file: impl Into<String>, meta: IndexedMeta, stories: Vec<IndexedStory>) -> Self {
        IndexResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            file: file.into(),
            meta,
            stories,
        }
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Outcome of one file in a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFileResult {
    pub file: String,
    /// "ok" or "error".
    pub status: String,
    /// Where the output was written, for successful files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<Warning>,
}

impl BatchFileResult {
    pub fn ok(file: impl Into<String>, output: impl Into<String>, warnings: Vec<Warning>) -> Self {
        BatchFileResult {
            file: file.into(),
            status: "ok".to_string(),
            output: Some(output.into()),
            error: None,
            warnings,
        }
    }

    pub fn failed(file: impl Into<String>, err: &StoryweaveError) -> Self {
        BatchFileResult {
            file: file.into(),
            status: "error".to_string(),
            output: None,
            error: Some(ErrorInfo::from_error(err)),
            warnings: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Response for the batch command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    /// "ok" when every file succeeded, else "partial".
    pub status: String,
    pub schema_version: String,
    pub transformed: u32,
    pub failed: u32,
    pub files: Vec<BatchFileResult>,
}

impl BatchResponse {
    pub fn new(files: Vec<BatchFileResult>) -> Self {
        let transformed = files.iter().filter(|f| f.is_ok()).count() as u32;
        let failed = files.len() as u32 - transformed;
        BatchResponse {
            status: if failed == 0 { "ok" } else { "partial" }.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            transformed,
            failed,
            files,
        }
    }
}

// ============================================================================
// Emit
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_response_tests {
        use super::*;

        #[test]
        fn error_response_has_status_first() {
            let err = StoryweaveError::structural("a.stories.svelte", "missing defineMeta");
            let response = ErrorResponse::from_error(&err);
            let json = serde_json::to_string(&response).unwrap();
            assert!(json.starts_with("{\"status\":\"error\""));
            assert_eq!(response.error.code, 3);
            assert_eq!(response.error.kind, "structural");
        }

        #[test]
        fn schema_conflict_details_name_the_path() {
            let err = StoryweaveError::SchemaConflict {
                path: "parameters.docs".to_string(),
                expected: "object literal".to_string(),
                actual: "array literal".to_string(),
                target: "meta".to_string(),
            };
            let info = ErrorInfo::from_error(&err);
            let details = info.details.unwrap();
            assert_eq!(details["path"], "parameters.docs");
            assert_eq!(details["actual"], "array literal");
        }

        #[test]
        fn internal_errors_have_no_details() {
            let info = ErrorInfo::from_error(&StoryweaveError::internal("boom"));
            assert!(info.details.is_none());
            let json = serde_json::to_string(&info).unwrap();
            assert!(!json.contains("details"));
        }
    }

    mod batch_tests {
        use super::*;

        #[test]
        fn batch_status_reflects_failures() {
            let ok = BatchFileResult::ok("a.stories.svelte", "a.stories.js", Vec::new());
            let failed = BatchFileResult::failed(
                "b.stories.svelte",
                &StoryweaveError::oracle("exit code 1"),
            );
            let response = BatchResponse::new(vec![ok.clone()]);
            assert_eq!(response.status, "ok");

            let response = BatchResponse::new(vec![ok, failed]);
            assert_eq!(response.status, "partial");
            assert_eq!(response.transformed, 1);
            assert_eq!(response.failed, 1);
        }
    }

    #[test]
    fn emit_response_produces_valid_json() {
        let response = IndexResponse::new(
            "Button.stories.svelte",
            IndexedMeta {
                title: Some("Button".to_string()),
                tags: vec!["autodocs".to_string()],
            },
            vec![IndexedStory {
                export_name: "Primary".to_string(),
                name: "Primary".to_string(),
                tags: Vec::new(),
            }],
        );

        let mut output = Vec::new();
        emit_response(&response, &mut output).unwrap();

        let json_str = String::from_utf8(output).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["stories"][0]["export_name"], "Primary");
    }
}
