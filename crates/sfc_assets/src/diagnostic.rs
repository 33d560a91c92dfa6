//! Diagnostics for host display.
//!
//! Errors and graph warnings are mapped into this shape, with spans resolved
//! to line/column against the template source, before reaching the user.

use crate::document::Span;
use crate::error::{AssemblyGraphWarning, Error};

/// Severity level for a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A labeled source span within a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticLabel {
    pub text: Option<String>,
    /// Byte offset of the span start.
    pub start: u32,
    /// Byte offset of the span end (exclusive).
    pub end: u32,
    /// 1-based line number.
    pub line: u32,
    /// 0-based column number.
    pub column: u32,
}

impl DiagnosticLabel {
    /// Create a label from a span, computing line/column from source text.
    pub fn new(text: Option<String>, span: Span, source_text: &str) -> Self {
        let (line, column) = byte_offset_to_line_column(source_text, span.start as usize);
        Self {
            text,
            start: span.start,
            end: span.end,
            line,
            column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    /// Human-readable message text.
    pub text: String,
    /// Optional hint for fixing the issue; empty when there is none.
    pub hint: String,
    pub labels: Vec<DiagnosticLabel>,
}

impl Diagnostic {
    /// Build an error diagnostic. `source_text` is the template the error's
    /// span, if any, points into.
    pub fn from_error(source_text: &str, error: &Error) -> Self {
        let hint = match error {
            Error::ResourceResolution { .. } => "check that the referenced file exists",
            Error::MapComposition { .. } => {
                "the preprocessor returned a source map that cannot be parsed"
            }
            Error::VirtualModuleCollision { .. } => {
                "two inline scripts produced the same virtual module path"
            }
            _ => "",
        };
        let labels = error
            .span()
            .map(|span| vec![DiagnosticLabel::new(None, span, source_text)])
            .unwrap_or_default();
        Self {
            severity: DiagnosticSeverity::Error,
            text: error.to_string(),
            hint: hint.to_string(),
            labels,
        }
    }

    pub fn from_warning(warning: &AssemblyGraphWarning) -> Self {
        let hint = match &warning.importer {
            Some(importer) => format!("imported by `{importer}`"),
            None => String::new(),
        };
        Self {
            severity: DiagnosticSeverity::Warning,
            text: warning.to_string(),
            hint,
            labels: Vec::new(),
        }
    }
}

/// Convert a UTF-8 byte offset to a 1-based line and 0-based column.
fn byte_offset_to_line_column(source: &str, offset: usize) -> (u32, u32) {
    let mut line = 1u32;
    let mut col = 0u32;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_resolution_error_points_at_element() {
        let source = "<div></div>\n  <link rel=\"stylesheet\" href=\"missing.css\">";
        let error = Error::ResourceResolution {
            path: PathBuf::from("/src/missing.css"),
            span: Some(Span::new(14, 56)),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        let diagnostic = Diagnostic::from_error(source, &error);
        assert_eq!(diagnostic.severity, DiagnosticSeverity::Error);
        assert_eq!(diagnostic.text, "cannot resolve stylesheet `/src/missing.css`");
        assert_eq!(diagnostic.labels.len(), 1);
        assert_eq!(diagnostic.labels[0].line, 2);
        assert_eq!(diagnostic.labels[0].column, 2);
    }

    #[test]
    fn test_error_without_span() {
        let error = Error::VirtualModuleCollision {
            path: "./a_0.js".to_string(),
        };
        let diagnostic = Diagnostic::from_error("", &error);
        assert!(diagnostic.labels.is_empty());
        assert!(!diagnostic.hint.is_empty());
    }

    #[test]
    fn test_warning() {
        let warning = AssemblyGraphWarning {
            importer: Some("/a.html".to_string()),
            module: "/gone.html".to_string(),
        };
        let diagnostic = Diagnostic::from_warning(&warning);
        assert_eq!(diagnostic.severity, DiagnosticSeverity::Warning);
        assert_eq!(diagnostic.text, "module `/gone.html` is unknown to the module graph");
        assert_eq!(diagnostic.hint, "imported by `/a.html`");
    }

    #[test]
    fn test_line_column_counts_chars() {
        assert_eq!(byte_offset_to_line_column("héllo", 3), (1, 2));
        assert_eq!(byte_offset_to_line_column("a\nb", 2), (2, 0));
    }
}
