//! Non-fatal diagnostics.
//!
//! Warnings are plain values routed through a [`Diagnostics`] sink that is
//! passed explicitly down the pipeline. Nothing in the pipeline logs a
//! warning on its own; it hands the warning to the sink and carries on.

use serde::{Deserialize, Serialize};

/// A user value was kept where an inferred value would have been written.
pub const W_EXPLICIT_VALUE_KEPT: &str = "explicit_value_kept";

/// A legacy attribute had no counterpart and was dropped during migration.
pub const W_LEGACY_ATTRIBUTE_DROPPED: &str = "legacy_attribute_dropped";

/// A story body could not be reconstructed for the raw-code diagnostic.
pub const W_RAW_CODE_UNAVAILABLE: &str = "raw_code_unavailable";

/// A non-fatal warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Stable warning code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// The meta or story the warning is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Warning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Warning {
            code: code.into(),
            message: message.into(),
            subject: None,
        }
    }

    /// Attach the meta or story the warning concerns.
    pub fn about(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// Receiver for non-fatal warnings.
pub trait Diagnostics {
    fn warn(&mut self, warning: Warning);
}

/// Sink that logs every warning through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn warn(&mut self, warning: Warning) {
        match &warning.subject {
            Some(subject) => {
                tracing::warn!(code = %warning.code, subject = %subject, "{}", warning.message)
            }
            None => tracing::warn!(code = %warning.code, "{}", warning.message),
        }
    }
}

/// Sink that keeps warnings for later inspection.
///
/// Each warning is also logged at debug level.
#[derive(Debug, Default, Clone)]
pub struct CollectedDiagnostics {
    warnings: Vec<Warning>,
}

impl CollectedDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Returns true if any warning carries `code`.
    pub fn has_code(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }
}

impl Diagnostics for CollectedDiagnostics {
    fn warn(&mut self, warning: Warning) {
        tracing::debug!(code = %warning.code, "{}", warning.message);
        self.warnings.push(warning);
    }
}

impl<D: Diagnostics + ?Sized> Diagnostics for &mut D {
    fn warn(&mut self, warning: Warning) {
        (**self).warn(warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collected_sink_keeps_order() {
        let mut sink = CollectedDiagnostics::new();
        sink.warn(Warning::new(W_EXPLICIT_VALUE_KEPT, "first").about("Story \"A\""));
        sink.warn(Warning::new(W_LEGACY_ATTRIBUTE_DROPPED, "second"));

        let codes: Vec<_> = sink.warnings().iter().map(|w| w.code.as_str()).collect();
        assert_eq!(codes, vec![W_EXPLICIT_VALUE_KEPT, W_LEGACY_ATTRIBUTE_DROPPED]);
        assert!(sink.has_code(W_LEGACY_ATTRIBUTE_DROPPED));
        assert!(!sink.has_code(W_RAW_CODE_UNAVAILABLE));
    }

    #[test]
    fn sink_can_be_passed_by_mutable_reference() {
        fn emit(mut sink: impl Diagnostics) {
            sink.warn(Warning::new(W_RAW_CODE_UNAVAILABLE, "missing"));
        }
        let mut sink = CollectedDiagnostics::new();
        emit(&mut sink);
        assert_eq!(sink.warnings().len(), 1);
    }

    #[test]
    fn warning_without_subject_omits_field() {
        let json = serde_json::to_string(&Warning::new("code", "msg")).unwrap();
        assert!(!json.contains("subject"));
    }
}
