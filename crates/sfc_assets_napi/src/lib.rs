//! Component template asset pipeline for Node.js build tools.
//!
//! A `BuildSession` lives as long as one build. The host plugin forwards its
//! `transform`, `resolveId` and `load` hooks to it, and calls `render` once
//! the module graph is complete to get the CSS bundles to emit.

mod error;

#[cfg(all(
    feature = "allocator",
    not(any(
        target_arch = "arm",
        target_os = "freebsd",
        target_os = "windows",
        target_family = "wasm"
    ))
))]
#[global_allocator]
static ALLOC: mimalloc_safe::MiMalloc = mimalloc_safe::MiMalloc;

use std::mem;
use std::sync::Arc;

use napi::{Task, bindgen_prelude::AsyncTask};
use napi_derive::napi;

use sfc_assets::sourcemap::identity_map;
use sfc_assets::{
    BoxError, HtmlTemplateParser, LightningCssScoper, MapInput, ModuleGenerator, ModuleGraph,
    ModuleGraphEntry, SessionOptions, StyleTransformer, TemplateParser, TransformOutput,
    TransformRequest,
};

use crate::error::SfcError;

/// Controls whether and how source maps are emitted.
#[napi(string_enum)]
pub enum SourcemapOption {
    /// Emit a side-car `<name>.map` file referenced from the CSS.
    #[napi(value = "external")]
    External,
    /// Append an inline `sourceMappingURL=data:...` comment.
    #[napi(value = "inline")]
    Inline,
    /// Both the inline comment and the side-car file.
    #[napi(value = "both")]
    Both,
}

/// How the scope token is spelled inside selectors.
#[napi(string_enum)]
pub enum ScopedStyleStrategy {
    /// `.sel.TOKEN` (default).
    #[napi(value = "class")]
    Class,
    /// `.sel:where(.TOKEN)`
    #[napi(value = "where")]
    Where,
    /// `.sel[data-TOKEN]`
    #[napi(value = "attribute")]
    Attribute,
}

/// What the host's module graph can be used for.
#[napi(string_enum)]
pub enum GraphCapability {
    /// Import edges are available; bundles follow dependency order.
    #[napi(value = "moduleGraph")]
    ModuleGraph,
    /// No import edges; all styles go into one bundle sorted by module id.
    #[napi(value = "nameSort")]
    NameSort,
}

/// Which CSS scoper rewrites selectors.
#[napi(string_enum)]
pub enum Scoper {
    /// Edits selectors in place and keeps all other text untouched (default).
    #[napi(value = "selector")]
    Selector,
    /// Parses and reprints the stylesheet with lightningcss.
    #[napi(value = "lightningcss")]
    Lightningcss,
}

/// Options for a build session.
#[napi(object)]
#[derive(Default)]
pub struct SessionConfig {
    #[napi(ts_type = "'external' | 'inline' | 'both'")]
    pub sourcemap: Option<SourcemapOption>,

    /// @default "class"
    #[napi(ts_type = "'class' | 'where' | 'attribute'")]
    pub scoped_style_strategy: Option<ScopedStyleStrategy>,

    /// Set to `false` to leave selectors unscoped.
    ///
    /// @default true
    pub scoped: Option<bool>,

    /// Entry module ids. When empty, modules marked `isEntry` are used.
    pub entries: Option<Vec<String>>,

    /// @default "moduleGraph"
    #[napi(ts_type = "'moduleGraph' | 'nameSort'")]
    pub graph_capability: Option<GraphCapability>,

    /// Emit one CSS file with this name for all entries.
    pub single_bundle: Option<String>,

    /// @default "selector"
    #[napi(ts_type = "'selector' | 'lightningcss'")]
    pub scoper: Option<Scoper>,
}

impl From<SessionConfig> for SessionOptions {
    fn from(config: SessionConfig) -> Self {
        let mut options = SessionOptions::new()
            .with_sourcemap(match config.sourcemap {
                Some(SourcemapOption::External) => sfc_assets::SourcemapOption::External,
                Some(SourcemapOption::Inline) => sfc_assets::SourcemapOption::Inline,
                Some(SourcemapOption::Both) => sfc_assets::SourcemapOption::Both,
                None => sfc_assets::SourcemapOption::None,
            })
            .with_scoped_style_strategy(match config.scoped_style_strategy {
                Some(ScopedStyleStrategy::Where) => sfc_assets::ScopedStyleStrategy::Where,
                Some(ScopedStyleStrategy::Attribute) => sfc_assets::ScopedStyleStrategy::Attribute,
                _ => sfc_assets::ScopedStyleStrategy::Class,
            })
            .with_scoped(config.scoped.unwrap_or(true))
            .with_entries(config.entries.unwrap_or_default())
            .with_graph_capability(match config.graph_capability {
                Some(GraphCapability::NameSort) => sfc_assets::GraphCapability::NameSort,
                _ => sfc_assets::GraphCapability::ModuleGraph,
            });
        if let Some(name) = config.single_bundle {
            options = options.with_single_bundle(name);
        }
        if matches!(config.scoper, Some(Scoper::Lightningcss)) {
            options = options.with_scoper(LightningCssScoper);
        }
        options
    }
}

/// A stylesheet already run through the host's preprocessor.
#[napi(object)]
#[derive(Clone)]
pub struct PreprocessedStyle {
    pub code: String,
    /// Source map JSON from the preprocessor.
    pub map: Option<String>,
}

/// Per-document transform options.
#[napi(object)]
#[derive(Default)]
pub struct TransformOptions {
    /// Preprocessed stylesheet content, indexed by stylesheet order in the
    /// document. An entry of `undefined` means "use the original content".
    pub preprocessed_styles: Option<Vec<Option<PreprocessedStyle>>>,
}

#[napi(object)]
pub struct TransformResult {
    /// The generated JavaScript module.
    pub code: String,
    /// Source map JSON string; empty when maps are disabled or inlined.
    pub map: String,
    /// The document's scope token; empty when unscoped.
    pub scope: String,
    /// Virtual module ids of the document's inline scripts.
    pub scripts: Vec<String>,
    pub errors: Vec<SfcError>,
}

/// One module of the host's graph.
#[napi(object)]
pub struct ModuleInfo {
    pub id: String,
    pub is_entry: Option<bool>,
    pub imported_ids: Option<Vec<String>>,
}

/// A file to emit.
#[napi(object)]
pub struct EmittedFile {
    pub file_name: String,
    pub source: String,
}

#[napi(object)]
pub struct RenderResult {
    pub files: Vec<EmittedFile>,
    /// Graph edges that pointed at unknown modules and were skipped.
    pub warnings: Vec<SfcError>,
}

/// Serves host-preprocessed styles by stylesheet index.
struct HostPreprocessed {
    styles: Vec<Option<PreprocessedStyle>>,
}

impl StyleTransformer for HostPreprocessed {
    fn transform(&self, request: &TransformRequest<'_>) -> Result<TransformOutput, BoxError> {
        let output = match self.styles.get(request.index).cloned().flatten() {
            Some(style) => TransformOutput::Object {
                code: Some(style.code),
                css: None,
                map: style.map.map(MapInput::Json),
            },
            // Untouched styles keep mapping onto themselves.
            None => TransformOutput::Object {
                code: Some(request.content.to_string()),
                css: None,
                map: Some(MapInput::Map(identity_map(request.source, request.content))),
            },
        };
        Ok(output)
    }
}

fn transform_impl(
    session: &sfc_assets::BuildSession,
    id: &str,
    source_text: &str,
    options: TransformOptions,
) -> TransformResult {
    let run = || {
        let parsed = HtmlTemplateParser.parse(source_text, id)?;
        let transformer = options
            .preprocessed_styles
            .map(|styles| HostPreprocessed { styles });
        let transformer = transformer
            .as_ref()
            .map(|t| t as &dyn StyleTransformer)
            .or(session.options().transformer.as_deref());
        session.transform_with(id, source_text, &parsed, &ModuleGenerator, transformer)
    };

    match run() {
        Ok(result) => TransformResult {
            code: result.code,
            map: result.map,
            scope: result.scope,
            scripts: result.scripts,
            errors: Vec::new(),
        },
        Err(error) => TransformResult {
            code: String::new(),
            map: String::new(),
            scope: String::new(),
            scripts: Vec::new(),
            errors: vec![SfcError::from_error(source_text, &error)],
        },
    }
}

/// Per-build state: virtual modules and collected styles.
///
/// @example
/// ```javascript
/// import { BuildSession } from '@sfc-assets/binding';
///
/// const session = new BuildSession({ sourcemap: 'external' });
/// const { code } = session.transformSync('/src/comp.html', source);
/// const { files } = session.render([{ id: '/src/comp.html', isEntry: true }]);
/// ```
#[napi]
pub struct BuildSession {
    inner: Arc<sfc_assets::BuildSession>,
}

#[napi]
impl BuildSession {
    #[napi(constructor)]
    pub fn new(config: Option<SessionConfig>) -> Self {
        let options = SessionOptions::from(config.unwrap_or_default());
        Self {
            inner: Arc::new(sfc_assets::BuildSession::new(options)),
        }
    }

    /// Transform a template document on the current thread.
    #[napi]
    pub fn transform_sync(
        &self,
        id: String,
        source_text: String,
        options: Option<TransformOptions>,
    ) -> TransformResult {
        transform_impl(&self.inner, &id, &source_text, options.unwrap_or_default())
    }

    /// Transform a template document on a worker thread.
    #[napi]
    pub fn transform(
        &self,
        id: String,
        source_text: String,
        options: Option<TransformOptions>,
    ) -> AsyncTask<TransformTask> {
        AsyncTask::new(TransformTask {
            session: Arc::clone(&self.inner),
            id,
            source_text,
            options: options.unwrap_or_default(),
        })
    }

    /// Returns the id when it names a virtual module, `null` otherwise.
    #[napi]
    pub fn resolve_id(&self, id: String) -> Option<String> {
        self.inner.resolve_id(&id)
    }

    /// Returns a virtual module's content, `null` for any other id.
    #[napi]
    pub fn load(&self, id: String) -> Option<String> {
        self.inner.load(&id).map(|content| content.to_string())
    }

    /// Forget the styles recorded for a deleted module.
    #[napi]
    pub fn invalidate(&self, id: String) -> bool {
        self.inner.invalidate(&id)
    }

    /// Assemble the CSS bundles for the given module graph.
    #[napi]
    pub fn render(&self, modules: Vec<ModuleInfo>) -> RenderResult {
        let graph: ModuleGraph = modules
            .into_iter()
            .map(|module| {
                let entry = ModuleGraphEntry::new(module.id)
                    .with_imports(module.imported_ids.unwrap_or_default());
                if module.is_entry.unwrap_or(false) { entry.entry() } else { entry }
            })
            .collect();

        let mut files = Vec::new();
        let warnings = self.inner.emit(&graph, &mut files);
        RenderResult {
            files: files
                .into_iter()
                .map(|asset| EmittedFile {
                    file_name: asset.file_name,
                    source: asset.source,
                })
                .collect(),
            warnings: warnings.iter().map(SfcError::from_warning).collect(),
        }
    }
}

pub struct TransformTask {
    session: Arc<sfc_assets::BuildSession>,
    id: String,
    source_text: String,
    options: TransformOptions,
}

#[napi]
impl Task for TransformTask {
    type JsValue = TransformResult;
    type Output = TransformResult;

    fn compute(&mut self) -> napi::Result<Self::Output> {
        let source_text = mem::take(&mut self.source_text);
        let options = mem::take(&mut self.options);
        Ok(transform_impl(&self.session, &self.id, &source_text, options))
    }

    fn resolve(&mut self, _: napi::Env, result: Self::Output) -> napi::Result<Self::JsValue> {
        Ok(result)
    }
}

/// Derive the scope token for a module id.
#[napi]
pub fn scope_token(id: String) -> String {
    sfc_assets::scope_token(&id)
}
