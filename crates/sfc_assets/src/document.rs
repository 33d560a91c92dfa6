//! Template document data model.
//!
//! A [`ParsedTemplate`] is what the template parser collaborator hands back:
//! byte ranges and MIME tags, nothing else. The extractor turns it into a
//! [`TemplateDocument`] whose resources own their text.

use std::path::PathBuf;

/// A byte range into the template source text.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub const fn is_empty(self) -> bool {
        self.start >= self.end
    }

    /// Slice `source` by this span, clamped to the source bounds.
    pub fn source_text(self, source: &str) -> &str {
        let end = (self.end as usize).min(source.len());
        let start = (self.start as usize).min(end);
        source.get(start..end).unwrap_or_default()
    }
}

/// Where a resource's content lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOrigin {
    Inline,
    External,
}

/// A `<script>` or stylesheet element as reported by the template parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResource {
    pub mime_type: String,
    /// Content span for inline resources; the element span for external ones.
    pub span: Span,
    /// The `src`/`href` reference of an external resource.
    pub src: Option<String>,
}

impl RawResource {
    pub fn inline(mime_type: impl Into<String>, span: Span) -> Self {
        Self {
            mime_type: mime_type.into(),
            span,
            src: None,
        }
    }

    pub fn external(mime_type: impl Into<String>, span: Span, src: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            span,
            src: Some(src.into()),
        }
    }
}

/// Output of the template parser collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTemplate {
    /// The URL the document is addressed by; used to derive virtual paths.
    pub url: String,
    pub scripts: Vec<RawResource>,
    pub stylesheets: Vec<RawResource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    Inline { content: String },
    External { src: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptResource {
    pub mime_type: String,
    pub source: ScriptSource,
    pub span: Span,
    /// Position among the document's scripts.
    pub index: usize,
}

impl ScriptResource {
    pub fn origin(&self) -> ResourceOrigin {
        match self.source {
            ScriptSource::Inline { .. } => ResourceOrigin::Inline,
            ScriptSource::External { .. } => ResourceOrigin::External,
        }
    }

    /// File extension used for the script's virtual module.
    pub fn extension(&self) -> &'static str {
        script_extension(&self.mime_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleSource {
    Inline { content: String },
    /// A stylesheet reference resolved to an absolute path; read by the pipeline.
    External { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleResource {
    pub mime_type: String,
    pub source: StyleSource,
    pub span: Span,
    /// Position among the document's stylesheets.
    pub index: usize,
}

impl StyleResource {
    pub fn origin(&self) -> ResourceOrigin {
        match self.source {
            StyleSource::Inline { .. } => ResourceOrigin::Inline,
            StyleSource::External { .. } => ResourceOrigin::External,
        }
    }
}

/// One template after extraction. Immutable except for inline script
/// rewriting, which happens once virtual paths are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDocument {
    /// Owning module identity (absolute path or logical id).
    pub id: String,
    pub url: String,
    pub source: String,
    pub scripts: Vec<ScriptResource>,
    pub styles: Vec<StyleResource>,
}

/// Map a script MIME/type tag to a module file extension.
pub fn script_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "text/typescript" | "application/typescript" | "ts" => ".ts",
        "text/tsx" | "tsx" => ".tsx",
        "text/jsx" | "jsx" => ".jsx",
        "application/json" | "json" => ".json",
        _ => ".js",
    }
}
