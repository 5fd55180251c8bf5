//! Diagnostic infrastructure for error reporting
//!
//! Every problem found while resolving entities or lowering code is reported
//! through [`Diagnostic`]. Fatal ones travel inside
//! [`CompileError`](crate::error::CompileError); warnings are collected by
//! [`Diagnostics`] and handed back with the compilation output.

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, LabelStyle, Severity};
use codespan_reporting::files::{Files, SimpleFiles};
use codespan_reporting::term;
use termcolor::{ColorChoice, StandardStream, WriteColor};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::span::FileRange;

/// Error code for a diagnostic
///
/// `E1xxx` name resolution, `E2xxx` types, `E3xxx` mutability and ownership,
/// `E4xxx` entity dependencies, `E5xxx` TODO markers, `W0xxx` warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        self.0
    }
}

/// A diagnostic message with source code context
#[derive(Debug, Clone)]
pub struct Diagnostic {
    inner: CsDiagnostic<usize>,
    code: Option<ErrorCode>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            inner: CsDiagnostic::new(severity).with_message(message),
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self::new(Severity::Note, message)
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self.inner = self.inner.with_code(code.0);
        self
    }

    /// Add a primary label (main error location)
    pub fn with_primary_label(mut self, range: FileRange, message: impl Into<String>) -> Self {
        let label = Label::primary(range.file.as_usize(), range.as_range()).with_message(message);
        self.inner.labels.push(label);
        self
    }

    /// Add a secondary label (related location, e.g. an earlier declaration)
    pub fn with_secondary_label(mut self, range: FileRange, message: impl Into<String>) -> Self {
        let label = Label::secondary(range.file.as_usize(), range.as_range()).with_message(message);
        self.inner.labels.push(label);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.inner.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.inner.notes.push(format!("help: {}", help.into()));
        self
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }

    pub fn severity(&self) -> Severity {
        self.inner.severity
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    pub fn is_error(&self) -> bool {
        matches!(self.inner.severity, Severity::Error | Severity::Bug)
    }

    /// Range of the first primary label, if any
    pub fn primary_range(&self) -> Option<FileRange> {
        self.label_range(LabelStyle::Primary)
    }

    /// Range of the first secondary label, if any
    pub fn secondary_range(&self) -> Option<FileRange> {
        self.label_range(LabelStyle::Secondary)
    }

    fn label_range(&self, style: LabelStyle) -> Option<FileRange> {
        self.inner
            .labels
            .iter()
            .find(|label| label.style == style)
            .map(|label| {
                FileRange::new(
                    crate::span::FileId(label.file_id as u32),
                    label.range.start as u32,
                    label.range.end as u32,
                )
            })
    }

    pub fn notes(&self) -> &[String] {
        &self.inner.notes
    }

    /// Emit the diagnostic to stderr with colors
    pub fn emit(
        &self,
        files: &SimpleFiles<String, String>,
    ) -> Result<(), codespan_reporting::files::Error> {
        let mut writer = StandardStream::stderr(ColorChoice::Auto);
        self.emit_to(&mut writer, files)
    }

    /// Emit the diagnostic to any color-aware writer
    pub fn emit_to(
        &self,
        writer: &mut dyn WriteColor,
        files: &SimpleFiles<String, String>,
    ) -> Result<(), codespan_reporting::files::Error> {
        let config = codespan_reporting::term::Config::default();
        term::emit(writer, &config, files, &self.inner)
    }

    /// Get the underlying codespan diagnostic (for testing/custom rendering)
    pub fn inner(&self) -> &CsDiagnostic<usize> {
        &self.inner
    }

    /// Convert to JSON representation for IDE integration
    pub fn to_json(
        &self,
        files: &SimpleFiles<String, String>,
    ) -> Result<String, serde_json::Error> {
        let json_diag = JsonDiagnostic::from_diagnostic(self, files);
        serde_json::to_string_pretty(&json_diag)
    }
}

/// JSON representation of a diagnostic for IDE integration
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonDiagnostic {
    pub code: Option<String>,
    pub severity: String,
    pub message: String,
    pub labels: Vec<JsonLabel>,
    pub notes: Vec<String>,
}

/// JSON representation of a diagnostic label
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLabel {
    pub file: String,
    /// 1-indexed
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub message: Option<String>,
    /// "primary" or "secondary"
    pub style: String,
}

impl JsonDiagnostic {
    pub fn from_diagnostic(diag: &Diagnostic, files: &SimpleFiles<String, String>) -> Self {
        let severity = match diag.inner.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
            Severity::Help => "help",
            Severity::Bug => "bug",
        };

        let labels = diag
            .inner
            .labels
            .iter()
            .filter_map(|label| {
                let file = files.get(label.file_id).ok()?;
                let start = file.location((), label.range.start).ok()?;
                let end = file.location((), label.range.end).ok()?;
                Some(JsonLabel {
                    file: file.name().to_string(),
                    start_line: start.line_number,
                    start_column: start.column_number,
                    end_line: end.line_number,
                    end_column: end.column_number,
                    message: Some(label.message.clone()),
                    style: match label.style {
                        LabelStyle::Primary => "primary",
                        LabelStyle::Secondary => "secondary",
                    }
                    .to_string(),
                })
            })
            .collect();

        JsonDiagnostic {
            code: diag.code.map(|c| c.0.to_string()),
            severity: severity.to_string(),
            message: diag.inner.message.clone(),
            labels,
            notes: diag.inner.notes.clone(),
        }
    }
}

/// Collector for non-fatal diagnostics
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(code = ?diagnostic.code.map(|c| c.0), "{}", diagnostic.message());
        self.items.push(diagnostic);
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items
            .iter()
            .filter(|d| d.severity() == Severity::Warning)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

/// Helper to create a SimpleFiles instance from source code
pub fn create_files(
    path: impl Into<PathBuf>,
    source: impl Into<String>,
) -> SimpleFiles<String, String> {
    let mut files = SimpleFiles::new();
    files.add(path.into().display().to_string(), source.into());
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FileId;

    #[test]
    fn test_create_error_diagnostic() {
        let diag = Diagnostic::error("Test error message");
        assert_eq!(diag.severity(), Severity::Error);
        assert!(diag.is_error());
    }

    #[test]
    fn test_diagnostic_with_code() {
        let diag = Diagnostic::error("Test error").with_code(ErrorCode("E1001"));
        assert_eq!(diag.code(), Some(ErrorCode("E1001")));
    }

    #[test]
    fn test_labels_keep_ranges() {
        let diag = Diagnostic::error("Duplicate name")
            .with_primary_label(FileRange::new(FileId(0), 10, 14), "duplicate")
            .with_secondary_label(FileRange::new(FileId(0), 2, 6), "existing entity found here");
        assert_eq!(diag.primary_range(), Some(FileRange::new(FileId(0), 10, 14)));
        assert_eq!(diag.secondary_range(), Some(FileRange::new(FileId(0), 2, 6)));
    }

    #[test]
    fn test_json_output() {
        let files = create_files("main.qat", "fn main() {}\n");
        let diag = Diagnostic::warning("unused")
            .with_code(ErrorCode("W0001"))
            .with_primary_label(FileRange::new(FileId(0), 3, 7), "here");
        let json = diag.to_json(&files).unwrap();
        assert!(json.contains("\"severity\": \"warning\""));
        assert!(json.contains("\"start_column\": 4"));
    }

    #[test]
    fn test_sink_only_reports_warnings() {
        let mut sink = Diagnostics::new();
        sink.push(Diagnostic::warning("first"));
        sink.push(Diagnostic::note("second"));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.warnings().count(), 1);
    }
}
