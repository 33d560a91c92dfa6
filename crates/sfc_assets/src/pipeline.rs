//! Stylesheet transform pipeline.
//!
//! Each stylesheet resource goes through up to three steps:
//!
//! 1. an optional external preprocessing transformer,
//! 2. CSS scoping, when the document has a scope token,
//! 3. finalization into a [`TransformedFragment`].
//!
//! Maps produced along the way are composed so the fragment's map always
//! points at the pre-transform text, which is embedded as the source content.

use std::fs;
use std::path::{Path, PathBuf};

use oxc_sourcemap::SourceMap;
use rayon::prelude::*;

use crate::css_scoping::{ScopeRequest, ScopedStyleStrategy, StyleScoper};
use crate::document::{StyleResource, StyleSource};
use crate::error::{BoxError, Error, Result};
use crate::sourcemap::{self, MapInput};

/// Arguments handed to a [`StyleTransformer`].
#[derive(Debug, Clone, Copy)]
pub struct TransformRequest<'a> {
    /// The stylesheet's MIME/type tag, e.g. `text/css` or `text/scss`.
    pub mime_type: &'a str,
    pub content: &'a str,
    /// Absolute path of the stylesheet, or of its document for inline styles.
    pub path: &'a Path,
    /// Position of the stylesheet within its document.
    pub index: usize,
    /// Source name the stylesheet is mapped under: its path, or
    /// `<document>?style&index=<n>` for inline styles.
    pub source: &'a str,
}

/// Everything a transformer may return.
#[derive(Debug)]
pub enum TransformOutput {
    Code(String),
    Bytes(Vec<u8>),
    /// An object result. `code` wins over `css` when both are set.
    Object {
        code: Option<String>,
        css: Option<String>,
        map: Option<MapInput>,
    },
}

impl From<String> for TransformOutput {
    fn from(code: String) -> Self {
        Self::Code(code)
    }
}

impl From<&str> for TransformOutput {
    fn from(code: &str) -> Self {
        Self::Code(code.to_string())
    }
}

/// The external preprocessing transformer contract.
///
/// Implementations must be idempotent and free of side effects visible to the
/// pipeline; siblings of one document are transformed concurrently.
pub trait StyleTransformer: Send + Sync {
    fn transform(&self, request: &TransformRequest<'_>) -> Result<TransformOutput, BoxError>;
}

impl<F> StyleTransformer for F
where
    F: Fn(&TransformRequest<'_>) -> Result<TransformOutput, BoxError> + Send + Sync,
{
    fn transform(&self, request: &TransformRequest<'_>) -> Result<TransformOutput, BoxError> {
        self(request)
    }
}

/// Final code and map of one stylesheet resource.
#[derive(Debug, Clone)]
pub struct TransformedFragment {
    pub code: String,
    /// Maps `code` to the original text. `None` means unmapped.
    pub map: Option<SourceMap>,
    /// Name the fragment's original text is attributed to.
    pub source: String,
}

/// Transformer output reduced to one shape.
struct Normalized {
    code: String,
    map: Option<SourceMap>,
}

fn normalize(output: TransformOutput, path: &str) -> Result<Normalized> {
    let transform_error = |source: BoxError| Error::Transform {
        path: path.to_string(),
        span: None,
        source,
    };
    match output {
        TransformOutput::Code(code) => Ok(Normalized { code, map: None }),
        TransformOutput::Bytes(bytes) => {
            let code = String::from_utf8(bytes).map_err(|e| transform_error(Box::new(e)))?;
            Ok(Normalized { code, map: None })
        }
        TransformOutput::Object { code, css, map } => {
            let code = code
                .or(css)
                .ok_or_else(|| transform_error("transformer returned neither `code` nor `css`".into()))?;
            let map = map.map(|map| map.into_sourcemap(path)).transpose()?;
            Ok(Normalized { code, map })
        }
    }
}

/// Runs the pipeline for the stylesheets of one document.
pub struct StylePipeline<'a> {
    pub document_id: &'a str,
    pub transformer: Option<&'a dyn StyleTransformer>,
    pub scoper: &'a dyn StyleScoper,
    pub strategy: ScopedStyleStrategy,
    /// Scope token; `None` or empty skips scoping.
    pub scope: Option<&'a str>,
    pub sourcemap: bool,
}

impl StylePipeline<'_> {
    /// Process every stylesheet concurrently.
    ///
    /// Results are ordered by the resources' positions in the document,
    /// whatever order the tasks finish in. The first failure in that order
    /// is returned.
    pub fn process_all(&self, styles: &[StyleResource]) -> Result<Vec<TransformedFragment>> {
        let mut results: Vec<(usize, Result<TransformedFragment>)> = styles
            .par_iter()
            .map(|style| (style.index, self.process(style)))
            .collect();
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    pub fn process(&self, resource: &StyleResource) -> Result<TransformedFragment> {
        let (original, path) = match &resource.source {
            StyleSource::Inline { content } => (content.clone(), PathBuf::from(self.document_id)),
            StyleSource::External { path } => {
                let content =
                    fs::read_to_string(path).map_err(|source| Error::ResourceResolution {
                        path: path.clone(),
                        span: Some(resource.span),
                        source,
                    })?;
                (content, path.clone())
            }
        };
        let label = self.source_label(resource, &path);

        // 1. Preprocess.
        let (code, prior_map) = match self.transformer {
            Some(transformer) => {
                let request = TransformRequest {
                    mime_type: &resource.mime_type,
                    content: &original,
                    path: &path,
                    index: resource.index,
                    source: &label,
                };
                let output = transformer.transform(&request).map_err(|source| Error::Transform {
                    path: label.clone(),
                    span: Some(resource.span),
                    source,
                })?;
                let normalized = normalize(output, &label)?;
                (normalized.code, normalized.map)
            }
            None => {
                let map = self
                    .sourcemap
                    .then(|| sourcemap::identity_map(&label, &original));
                (original.clone(), map)
            }
        };

        // 2. Scope.
        let (code, map) = match self.scope.filter(|token| !token.is_empty()) {
            Some(token) => {
                // Multi-hop chains keep attributing to the first file in the chain.
                let filename = prior_map
                    .as_ref()
                    .and_then(sourcemap::primary_source)
                    .unwrap_or_else(|| label.clone());
                let scoped = self
                    .scoper
                    .scope(&ScopeRequest {
                        code: &code,
                        token,
                        filename: &filename,
                        strategy: self.strategy,
                    })
                    .map_err(|e| Error::Scope {
                        path: label.clone(),
                        message: e.to_string(),
                    })?;
                let map = match (scoped.map, prior_map) {
                    (Some(scope_map), Some(prior)) if self.sourcemap => {
                        Some(sourcemap::compose(&scope_map, &prior))
                    }
                    _ => None,
                };
                (scoped.code, map)
            }
            None => (code, prior_map),
        };

        // 3. Finalize.
        let map = map
            .filter(|_| self.sourcemap)
            .map(|map| sourcemap::embed_source_content(&map, &label, &original));
        tracing::debug!(
            source = %label,
            mapped = map.is_some(),
            "processed stylesheet"
        );
        Ok(TransformedFragment {
            code,
            map,
            source: label,
        })
    }

    /// External sheets are named by path; inline ones by document and index.
    fn source_label(&self, resource: &StyleResource, path: &Path) -> String {
        match resource.source {
            StyleSource::External { .. } => path.to_string_lossy().into_owned(),
            StyleSource::Inline { .. } => {
                format!("{}?style&index={}", self.document_id, resource.index)
            }
        }
    }
}
