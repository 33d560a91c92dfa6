//! Options for a build session.
//!
//! Everything here is fixed when the [`BuildSession`](crate::BuildSession) is
//! created. Collaborators that callers may swap out (the preprocessing
//! transformer, the CSS scoper, the scope hash and the bundle namer) are trait
//! objects or boxed closures.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use cow_utils::CowUtils;

use crate::css_scoping::{ScopedStyleStrategy, SelectorScoper, StyleScoper};
use crate::graph::GraphCapability;
use crate::pipeline::StyleTransformer;
use crate::scope::scope_token;

/// How source maps are attached to emitted bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourcemapOption {
    /// No maps are built.
    #[default]
    None,
    /// A side-car `<name>.map` file referenced by a trailing comment.
    External,
    /// A trailing data URL comment; no side-car file.
    Inline,
    /// Both the data URL comment and the side-car file.
    Both,
}

impl SourcemapOption {
    pub fn is_enabled(self) -> bool {
        self != Self::None
    }

    /// Whether a side-car `.map` asset is emitted.
    pub fn emits_file(self) -> bool {
        matches!(self, Self::External | Self::Both)
    }
}

/// Function type for scope hash and file name overrides.
pub type NameFn = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Options for one build session.
pub struct SessionOptions {
    pub sourcemap: SourcemapOption,

    pub scoped_style_strategy: ScopedStyleStrategy,

    /// When `false`, stylesheets are never scoped.
    pub scoped: bool,

    /// Replaces [`scope_token`] for deriving a module's scope token.
    pub scope_hash: Option<NameFn>,

    /// Entry module ids. When empty, the host graph's entry points are used.
    pub entries: Vec<String>,

    /// Selects the graph provider once, when the session is created.
    pub graph_capability: GraphCapability,

    /// Combine every entry into one CSS file with this name.
    pub single_bundle: Option<String>,

    /// Maps an entry id to its CSS file name. Defaults to the entry's base
    /// name with a `.css` extension.
    pub file_namer: Option<NameFn>,

    /// The external preprocessing transformer.
    pub transformer: Option<Arc<dyn StyleTransformer>>,

    /// The CSS scoping collaborator.
    pub scoper: Arc<dyn StyleScoper>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            sourcemap: SourcemapOption::default(),
            scoped_style_strategy: ScopedStyleStrategy::default(),
            scoped: true,
            scope_hash: None,
            entries: Vec::new(),
            graph_capability: GraphCapability::default(),
            single_bundle: None,
            file_namer: None,
            transformer: None,
            scoper: Arc::new(SelectorScoper),
        }
    }
}

impl std::fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOptions")
            .field("sourcemap", &self.sourcemap)
            .field("scoped_style_strategy", &self.scoped_style_strategy)
            .field("scoped", &self.scoped)
            .field("scope_hash", &self.scope_hash.as_ref().map(|_| "Some(<fn>)"))
            .field("entries", &self.entries)
            .field("graph_capability", &self.graph_capability)
            .field("single_bundle", &self.single_bundle)
            .field("file_namer", &self.file_namer.as_ref().map(|_| "Some(<fn>)"))
            .field("transformer", &self.transformer.as_ref().map(|_| "Some(<dyn>)"))
            .finish_non_exhaustive()
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sourcemap(mut self, sourcemap: SourcemapOption) -> Self {
        self.sourcemap = sourcemap;
        self
    }

    #[must_use]
    pub fn with_scoped_style_strategy(mut self, strategy: ScopedStyleStrategy) -> Self {
        self.scoped_style_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_scoped(mut self, scoped: bool) -> Self {
        self.scoped = scoped;
        self
    }

    /// Override how scope tokens are derived from module ids.
    #[must_use]
    pub fn with_scope_hash(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.scope_hash = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_entries<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries = entries.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_graph_capability(mut self, capability: GraphCapability) -> Self {
        self.graph_capability = capability;
        self
    }

    /// Emit a single CSS file named `file_name` for all entries.
    #[must_use]
    pub fn with_single_bundle(mut self, file_name: impl Into<String>) -> Self {
        self.single_bundle = Some(file_name.into());
        self
    }

    #[must_use]
    pub fn with_file_namer(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.file_namer = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_transformer(mut self, transformer: impl StyleTransformer + 'static) -> Self {
        self.transformer = Some(Arc::new(transformer));
        self
    }

    #[must_use]
    pub fn with_scoper(mut self, scoper: impl StyleScoper + 'static) -> Self {
        self.scoper = Arc::new(scoper);
        self
    }

    /// The scope token for a module, or `None` when scoping is disabled.
    pub fn scope_for(&self, module_id: &str) -> Option<String> {
        if !self.scoped {
            return None;
        }
        Some(match &self.scope_hash {
            Some(hash) => hash(module_id),
            None => scope_token(module_id),
        })
    }

    /// The CSS file name for an entry's bundle.
    pub fn file_name_for(&self, entry: &str) -> String {
        if let Some(namer) = &self.file_namer {
            return namer(entry);
        }
        default_file_name(entry)
    }
}

/// `<base name without extension>.css`
pub fn default_file_name(entry: &str) -> String {
    let entry = entry.cow_replace('\\', "/");
    // Strip query strings some hosts append to module ids.
    let path = entry.split('?').next().unwrap_or_default();
    let base = path.rsplit('/').next().unwrap_or_default();
    let stem = match base.rfind('.') {
        Some(dot) if dot > 0 => &base[..dot],
        _ => base,
    };
    if stem.is_empty() {
        "style.css".to_string()
    } else {
        format!("{stem}.css")
    }
}

/// Resolve `reference` against the directory of `document_id`.
///
/// Absolute references are returned unchanged apart from `.`/`..` cleanup.
pub fn resolve_reference(document_id: &str, reference: &str) -> PathBuf {
    let reference = Path::new(reference);
    if reference.is_absolute() {
        return normalize_path(reference);
    }
    let dir = Path::new(document_id).parent().unwrap_or(Path::new(""));
    normalize_path(&dir.join(reference))
}

/// Resolve `.` and `..` segments without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never climb above the root.
                match components.last() {
                    Some(Component::RootDir | Component::Prefix(_)) => {}
                    Some(Component::ParentDir) | None => components.push(component),
                    Some(_) => {
                        components.pop();
                    }
                }
            }
            _ => components.push(component),
        }
    }
    components.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SessionOptions::default();
        assert_eq!(options.sourcemap, SourcemapOption::None);
        assert!(options.scoped);
        assert_eq!(options.graph_capability, GraphCapability::ModuleGraph);
        assert!(options.single_bundle.is_none());
    }

    #[test]
    fn test_builder() {
        let options = SessionOptions::new()
            .with_sourcemap(SourcemapOption::External)
            .with_entries(["/src/a.html"])
            .with_single_bundle("all.css")
            .with_scope_hash(|_| "e1a2b3".to_string());
        assert!(options.sourcemap.emits_file());
        assert_eq!(options.entries, ["/src/a.html"]);
        assert_eq!(options.single_bundle.as_deref(), Some("all.css"));
        assert_eq!(options.scope_for("/src/comp.html").as_deref(), Some("e1a2b3"));
        assert!(format!("{options:?}").contains("Some(<fn>)"));
    }

    #[test]
    fn test_scope_disabled() {
        let options = SessionOptions::new().with_scoped(false);
        assert_eq!(options.scope_for("/src/comp.html"), None);
    }

    #[test]
    fn test_default_scope_uses_token_generator() {
        let options = SessionOptions::new();
        assert_eq!(
            options.scope_for("/src/comp.html"),
            Some(scope_token("/src/comp.html"))
        );
    }

    #[test]
    fn test_file_names() {
        assert_eq!(default_file_name("/src/pages/a.html"), "a.css");
        assert_eq!(default_file_name("C:\\src\\index.html"), "index.css");
        assert_eq!(default_file_name("/src/comp.html?html-proxy"), "comp.css");
        assert_eq!(default_file_name("main"), "main.css");
        assert_eq!(default_file_name("/src/"), "style.css");

        let options = SessionOptions::new().with_file_namer(|id| format!("{}.bundle.css", id.len()));
        assert_eq!(options.file_name_for("abc"), "3.bundle.css");
    }

    #[test]
    fn test_resolve_reference() {
        assert_eq!(
            resolve_reference("/src/comp.html", "./comp.css"),
            PathBuf::from("/src/comp.css")
        );
        assert_eq!(
            resolve_reference("/src/pages/comp.html", "../styles/base.css"),
            PathBuf::from("/src/styles/base.css")
        );
        assert_eq!(
            resolve_reference("/src/comp.html", "/abs/theme.css"),
            PathBuf::from("/abs/theme.css")
        );
        assert_eq!(resolve_reference("/comp.html", "../../x.css"), PathBuf::from("/x.css"));
    }
}
