//! Diagnostic accumulation for resolution
//!
//! Resolution never halts on a user error: each detection site pushes a
//! diagnostic here and substitutes an error sentinel in the semantic tree, so
//! a single run reports as many independent problems as possible. Rendering
//! is the driver's business; this crate only carries severity, location and
//! the formatted message, plus a conversion to `codespan-reporting` for
//! drivers that want rustc-style output.

use wf_span::FileSpan;

/// How serious a diagnostic is
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Severity {
    /// Extra context for another diagnostic (e.g. a rejected overload candidate)
    Info,
    /// Suspicious but resolution continues with a defined meaning
    Warning,
    /// The construct is invalid; an error sentinel replaces it
    Error,
}

/// One reported problem
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// How serious the problem is
    pub severity: Severity,
    /// Where the problem was detected
    pub span: FileSpan,
    /// Formatted, human-readable message
    pub message: String,
    /// Stable machine-readable code (e.g. `resolve::undefined_name`)
    pub code: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(span: FileSpan, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            span,
            message: message.into(),
            code: None,
        }
    }

    /// Create a warning diagnostic
    pub fn warning(span: FileSpan, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            span,
            message: message.into(),
            code: None,
        }
    }

    /// Create an info diagnostic
    pub fn info(span: FileSpan, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            span,
            message: message.into(),
            code: None,
        }
    }

    /// Attach a stable code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Convert to a codespan diagnostic for rustc-style output
    pub fn to_codespan(&self) -> codespan_reporting::diagnostic::Diagnostic<usize> {
        use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label};

        let base = match self.severity {
            Severity::Error => CsDiagnostic::error(),
            Severity::Warning => CsDiagnostic::warning(),
            Severity::Info => CsDiagnostic::note(),
        };

        let mut diag = base.with_message(self.message.clone());
        if let Some(code) = &self.code {
            diag = diag.with_code(code.clone());
        }
        if !self.span.is_synthesized() {
            diag = diag.with_labels(vec![Label::primary(
                self.span.file.0 as usize,
                self.span.range(),
            )]);
        }
        diag
    }
}

/// Ordered accumulator for diagnostics
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// All diagnostics in report order
    pub fn all(&self) -> &[Diagnostic] {
        &self.items
    }

    /// Whether any diagnostic is an error
    pub fn has_errors(&self) -> bool {
        self.items
            .iter()
            .any(|diag| diag.severity == Severity::Error)
    }

    /// Number of error-severity diagnostics
    pub fn error_count(&self) -> usize {
        self.items
            .iter()
            .filter(|diag| diag.severity == Severity::Error)
            .count()
    }

    /// Whether nothing was reported
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wf_span::{FileId, Span};

    fn span() -> FileSpan {
        FileSpan::new(FileId(0), Span::new(0, 4))
    }

    #[test]
    fn test_error_counting() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::info(span(), "candidate rejected"));
        assert!(!diags.has_errors());
        diags.push(Diagnostic::error(span(), "undefined name `foo`"));
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.all().len(), 2);
    }

    #[test]
    fn test_codespan_conversion_keeps_code() {
        let diag = Diagnostic::error(span(), "no conversion").with_code("resolve::no_conversion");
        let cs = diag.to_codespan();
        assert_eq!(cs.code.as_deref(), Some("resolve::no_conversion"));
        assert_eq!(cs.labels.len(), 1);
    }

    #[test]
    fn test_synthesized_span_has_no_label() {
        let diag = Diagnostic::error(FileSpan::synthesized(), "late failure");
        assert!(diag.to_codespan().labels.is_empty());
    }
}
