//! The build session: the context object every pipeline call goes through.
//!
//! A session owns the virtual module registry and the style aggregator for
//! one build. Documents may be transformed from several threads at once; the
//! host calls [`BuildSession::render`] or [`BuildSession::emit`] only after
//! all of them have finished.

use std::sync::Arc;

use tracing::instrument;

use crate::aggregator::StyleAggregator;
use crate::bundle::{AssetSink, BundleAssembler, BundleOutput};
use crate::codegen::{CodeGenerator, GenerateOptions, ModuleGenerator};
use crate::document::ParsedTemplate;
use crate::error::{AssemblyGraphWarning, Result};
use crate::extractor::{TemplateParser, extract, rewrite_inline_scripts};
use crate::graph::{GraphProvider, HostGraph};
use crate::options::{SessionOptions, SourcemapOption};
use crate::pipeline::{StylePipeline, StyleTransformer};
use crate::virtual_modules::VirtualModules;

/// Output of transforming one document.
#[derive(Debug)]
pub struct TransformResult {
    /// The generated JavaScript module.
    pub code: String,
    /// Source map JSON for `code`; empty when maps are disabled or inlined.
    pub map: String,
    /// The scope token applied to the document's styles; empty when unscoped.
    pub scope: String,
    /// Virtual module paths of the document's inline scripts, in order.
    pub scripts: Vec<String>,
    /// Number of stylesheet fragments recorded for the document.
    pub styles: usize,
}

pub struct BuildSession {
    options: SessionOptions,
    provider: Box<dyn GraphProvider>,
    modules: VirtualModules,
    styles: StyleAggregator,
}

impl std::fmt::Debug for BuildSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildSession")
            .field("options", &self.options)
            .field("provider", &self.provider)
            .field("virtual_modules", &self.modules.len())
            .field("style_modules", &self.styles.len())
            .finish()
    }
}

impl Default for BuildSession {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl BuildSession {
    pub fn new(options: SessionOptions) -> Self {
        let provider = options.graph_capability.provider();
        tracing::debug!(?provider, "starting build session");
        Self {
            options,
            provider,
            modules: VirtualModules::new(),
            styles: StyleAggregator::new(),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn virtual_modules(&self) -> &VirtualModules {
        &self.modules
    }

    pub fn styles(&self) -> &StyleAggregator {
        &self.styles
    }

    /// Parse `source` with `parser` and transform it with the default
    /// [`ModuleGenerator`].
    pub fn transform(
        &self,
        module_id: &str,
        source: &str,
        parser: &dyn TemplateParser,
    ) -> Result<TransformResult> {
        let parsed = parser.parse(source, module_id)?;
        self.transform_parsed(module_id, source, &parsed, &ModuleGenerator)
    }

    /// Transform an already parsed document with the session's transformer.
    pub fn transform_parsed(
        &self,
        module_id: &str,
        source: &str,
        parsed: &ParsedTemplate,
        generator: &dyn CodeGenerator,
    ) -> Result<TransformResult> {
        self.transform_with(
            module_id,
            source,
            parsed,
            generator,
            self.options.transformer.as_deref(),
        )
    }

    /// Transform a document with an explicit style transformer.
    ///
    /// The document's previously recorded fragments, if any, are replaced only
    /// once every step succeeded.
    #[instrument(level = "debug", skip_all, fields(module_id = %module_id))]
    pub fn transform_with(
        &self,
        module_id: &str,
        source: &str,
        parsed: &ParsedTemplate,
        generator: &dyn CodeGenerator,
        transformer: Option<&dyn StyleTransformer>,
    ) -> Result<TransformResult> {
        let mut document = extract(parsed, module_id, source);
        let scope = self.options.scope_for(module_id);
        tracing::debug!(
            scripts = document.scripts.len(),
            styles = document.styles.len(),
            scope = scope.as_deref(),
            "extracted resources"
        );

        let pipeline = StylePipeline {
            document_id: module_id,
            transformer,
            scoper: self.options.scoper.as_ref(),
            strategy: self.options.scoped_style_strategy,
            scope: scope.as_deref(),
            sourcemap: self.options.sourcemap.is_enabled(),
        };
        let fragments = pipeline.process_all(&document.styles)?;

        let scripts = rewrite_inline_scripts(&mut document, &self.modules)?;
        let generated = generator.generate(
            &document,
            &GenerateOptions {
                filename: module_id,
                sourcemap: self.options.sourcemap.is_enabled(),
            },
        )?;

        let style_count = fragments.len();
        self.styles.replace(module_id, fragments);

        let mut code = generated.code;
        let map = match (generated.map, self.options.sourcemap) {
            (Some(map), SourcemapOption::Inline) => {
                code.push_str("//# sourceMappingURL=");
                code.push_str(&map.to_data_url());
                String::new()
            }
            (Some(map), SourcemapOption::Both) => {
                code.push_str("//# sourceMappingURL=");
                code.push_str(&map.to_data_url());
                map.to_json_string()
            }
            (Some(map), _) => map.to_json_string(),
            (None, _) => String::new(),
        };

        Ok(TransformResult {
            code,
            map,
            scope: scope.unwrap_or_default(),
            scripts,
            styles: style_count,
        })
    }

    /// Answer a host resolve request. `None` means the id is not a virtual
    /// module and the host should resolve it itself.
    pub fn resolve_id(&self, id: &str) -> Option<String> {
        self.modules.resolve(id)
    }

    /// Answer a host load request for a virtual module.
    pub fn load(&self, id: &str) -> Option<Arc<str>> {
        self.modules.load(id)
    }

    /// Drop everything recorded for a module the host deleted: its styles
    /// and the virtual modules of its inline scripts.
    pub fn invalidate(&self, module_id: &str) -> bool {
        let scripts = self.modules.remove_owned(module_id);
        let styles = self.styles.remove(module_id);
        tracing::debug!(module_id, scripts, styles, "invalidated module");
        styles || scripts > 0
    }

    /// Assemble the CSS bundles for the current graph.
    #[instrument(level = "debug", skip_all)]
    pub fn render(&self, graph: &dyn HostGraph) -> BundleOutput {
        BundleAssembler {
            aggregator: &self.styles,
            provider: self.provider.as_ref(),
            options: &self.options,
        }
        .assemble(graph)
    }

    /// Assemble and hand every resulting file to `sink`.
    pub fn emit(&self, graph: &dyn HostGraph, sink: &mut dyn AssetSink) -> Vec<AssemblyGraphWarning> {
        let output = self.render(graph);
        for bundle in output.bundles {
            for asset in bundle.into_assets(self.options.sourcemap) {
                sink.emit_file(asset.file_name, asset.source);
            }
        }
        output.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::EmittedAsset;
    use crate::extractor::HtmlTemplateParser;
    use crate::graph::{ModuleGraph, ModuleGraphEntry};

    #[test]
    fn test_transform_records_styles_and_scripts() {
        let session = BuildSession::new(SessionOptions::new().with_scope_hash(|_| "s1".to_string()));
        let source = "<script>let a = 1;</script><style>.a{}</style><div></div>";
        let result = session.transform("/src/c.html", source, &HtmlTemplateParser).unwrap();

        assert_eq!(result.scope, "s1");
        assert_eq!(result.scripts, ["/src/c_0.js"]);
        assert!(result.code.contains("\"/src/c_0.js\""));
        assert_eq!(session.load("/src/c_0.js").as_deref(), Some("let a = 1;"));
        assert_eq!(session.resolve_id("/src/c_0.js").as_deref(), Some("/src/c_0.js"));
        assert_eq!(session.resolve_id("/src/other.js"), None);

        let fragments = session.styles().fragments("/src/c.html");
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].code, ".a.s1{}");
        assert!(result.map.is_empty());
    }

    #[test]
    fn test_retransform_replaces_fragments() {
        let session = BuildSession::default();
        session
            .transform("/c.html", "<style>.a{}</style><style>.b{}</style>", &HtmlTemplateParser)
            .unwrap();
        session
            .transform("/c.html", "<style>.c{}</style>", &HtmlTemplateParser)
            .unwrap();
        assert_eq!(session.styles().fragments("/c.html").len(), 1);
    }

    #[test]
    fn test_retransform_with_edited_script() {
        let session = BuildSession::default();
        session
            .transform("/c.html", "<script>let a = 1;</script><script>b()</script>", &HtmlTemplateParser)
            .unwrap();
        let result = session
            .transform("/c.html", "<script>let a = 2;</script>", &HtmlTemplateParser)
            .unwrap();

        assert_eq!(result.scripts, ["/c_0.js"]);
        assert_eq!(session.load("/c_0.js").as_deref(), Some("let a = 2;"));
        assert_eq!(session.load("/c_1.js"), None);
    }

    #[test]
    fn test_other_document_cannot_take_over_a_script_path() {
        let session = BuildSession::default();
        // Both documents are addressed by the same url.
        let parsed = |content: &str| {
            HtmlTemplateParser
                .parse(&format!("<script>{content}</script>"), "/c.html")
                .unwrap()
        };
        session
            .transform_parsed("/c.html", "<script>x</script>", &parsed("x"), &ModuleGenerator)
            .unwrap();
        let err = session
            .transform_parsed("/d.html", "<script>y</script>", &parsed("y"), &ModuleGenerator)
            .unwrap_err();
        assert!(matches!(err, crate::Error::VirtualModuleCollision { .. }));
        assert_eq!(session.load("/c_0.js").as_deref(), Some("x"));
    }

    #[test]
    fn test_invalidate_drops_scripts() {
        let session = BuildSession::default();
        session
            .transform("/c.html", "<script>let a = 1;</script>", &HtmlTemplateParser)
            .unwrap();
        assert!(session.invalidate("/c.html"));
        assert_eq!(session.resolve_id("/c_0.js"), None);
        assert!(!session.invalidate("/c.html"));
    }

    #[test]
    fn test_failed_transform_keeps_previous_fragments() {
        let session = BuildSession::default();
        session
            .transform("/c.html", "<style>.a{}</style>", &HtmlTemplateParser)
            .unwrap();
        let err = session.transform(
            "/c.html",
            "<link rel=stylesheet href=./does-not-exist.css>",
            &HtmlTemplateParser,
        );
        assert!(err.is_err());
        assert_eq!(session.styles().fragments("/c.html").len(), 1);
    }

    #[test]
    fn test_inline_module_map() {
        let session = BuildSession::new(SessionOptions::new().with_sourcemap(SourcemapOption::Inline));
        let result = session
            .transform("/c.html", "<div></div>", &HtmlTemplateParser)
            .unwrap();
        assert!(result.map.is_empty());
        assert!(result.code.contains("//# sourceMappingURL=data:application/json;"));
    }

    #[test]
    fn test_emit_to_sink() {
        let session = BuildSession::new(SessionOptions::new().with_scoped(false));
        session
            .transform("/a.html", "<style>.a{}</style>", &HtmlTemplateParser)
            .unwrap();
        let graph: ModuleGraph = [ModuleGraphEntry::new("/a.html").entry()].into_iter().collect();
        let mut assets: Vec<EmittedAsset> = Vec::new();
        let warnings = session.emit(&graph, &mut assets);
        assert!(warnings.is_empty());
        assert_eq!(assets, [EmittedAsset::new("a.css", ".a{}")]);

        assert!(session.invalidate("/a.html"));
        assert!(session.render(&graph).bundles.is_empty());
    }
}
