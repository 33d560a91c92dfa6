//! SFC Assets
//!
//! Splits component templates into script and stylesheet resources, scopes
//! and source-maps the stylesheets, and stitches them into per-entry CSS
//! bundles in dependency order.
//!
//! ## Flow
//!
//! ```text
//! template ─▶ TemplateParser ─▶ extract ─┬─▶ VirtualModules (inline scripts)
//!                                        └─▶ StylePipeline ─▶ StyleAggregator
//!                                                                  │
//! host graph ─▶ GraphProvider ─▶ BundleAssembler ◀─────────────────┘
//!                                      │
//!                                      ▼
//!                              <entry>.css + <entry>.css.map
//! ```
//!
//! Everything is driven through a [`BuildSession`]:
//!
//! ```
//! use sfc_assets::{BuildSession, HtmlTemplateParser, ModuleGraph, ModuleGraphEntry, SessionOptions};
//!
//! let session = BuildSession::new(SessionOptions::new().with_scope_hash(|_| "e1a2b3".into()));
//! session
//!     .transform("/src/comp.html", "<style>.btn { color: red; }</style>", &HtmlTemplateParser)
//!     .unwrap();
//!
//! let graph: ModuleGraph = [ModuleGraphEntry::new("/src/comp.html").entry()].into_iter().collect();
//! let output = session.render(&graph);
//! assert_eq!(output.bundles[0].file_name, "comp.css");
//! assert_eq!(output.bundles[0].code, ".btn.e1a2b3 { color: red; }");
//! ```

mod aggregator;
mod bundle;
mod codegen;
mod css_scoping;
mod diagnostic;
mod document;
mod error;
mod extractor;
mod graph;
mod options;
mod pipeline;
mod scope;
mod session;
pub mod sourcemap;
mod virtual_modules;

pub use aggregator::StyleAggregator;
pub use bundle::{
    AssetSink, BundleArtifact, BundleAssembler, BundleOutput, EmittedAsset, FnSink,
    concat_fragments,
};
pub use codegen::{CodeGenerator, GenerateOptions, GeneratedModule, ModuleGenerator};
pub use css_scoping::{
    LightningCssScoper, ScopeOutput, ScopeRequest, ScopedStyleStrategy, SelectorScoper,
    StyleScoper,
};
pub use diagnostic::{Diagnostic, DiagnosticLabel, DiagnosticSeverity};
pub use document::{
    ParsedTemplate, RawResource, ResourceOrigin, ScriptResource, ScriptSource, Span,
    StyleResource, StyleSource, TemplateDocument,
};
pub use error::{AssemblyGraphWarning, BoxError, Error, Result};
pub use extractor::{HtmlTemplateParser, TemplateParser, extract, rewrite_inline_scripts};
pub use graph::{
    ChunkPlan, DependencyOrder, GraphCapability, GraphProvider, HostGraph, ModuleChunk,
    ModuleGraph, ModuleGraphEntry, NameSortOrder, collect_modules,
};
pub use options::{SessionOptions, SourcemapOption};
pub use pipeline::{
    StylePipeline, StyleTransformer, TransformOutput, TransformRequest, TransformedFragment,
};
pub use scope::scope_token;
pub use session::{BuildSession, TransformResult};
pub use sourcemap::MapInput;
pub use virtual_modules::{VirtualModules, virtual_path};
