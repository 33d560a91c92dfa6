//! Host module graph access and bundle ordering.
//!
//! The host build tool owns the module graph; this crate only reads it at
//! emission time through [`HostGraph`]. How much of it can be used is decided
//! once per session by [`GraphCapability`], which selects the
//! [`GraphProvider`] that turns entries into ordered module lists.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::AssemblyGraphWarning;

/// One module as described by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleGraphEntry {
    pub id: String,
    pub is_entry: bool,
    pub imported_ids: Vec<String>,
}

impl ModuleGraphEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn entry(mut self) -> Self {
        self.is_entry = true;
        self
    }

    #[must_use]
    pub fn with_imports<I, S>(mut self, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imported_ids = imports.into_iter().map(Into::into).collect();
        self
    }
}

/// Read-only view of the host's module graph.
pub trait HostGraph {
    /// Modules the host marks as build entry points, in host order.
    fn entry_ids(&self) -> Vec<String>;

    /// Imports of `id`, or `None` when the host does not know the module.
    fn imported_ids(&self, id: &str) -> Option<&[String]>;
}

/// A [`HostGraph`] built from [`ModuleGraphEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: FxHashMap<String, ModuleGraphEntry>,
    /// Insertion order, so entries come back in the order the host gave them.
    order: Vec<String>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a module.
    pub fn insert(&mut self, entry: ModuleGraphEntry) {
        if !self.modules.contains_key(&entry.id) {
            self.order.push(entry.id.clone());
        }
        self.modules.insert(entry.id.clone(), entry);
    }

    pub fn get(&self, id: &str) -> Option<&ModuleGraphEntry> {
        self.modules.get(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl FromIterator<ModuleGraphEntry> for ModuleGraph {
    fn from_iter<T: IntoIterator<Item = ModuleGraphEntry>>(iter: T) -> Self {
        let mut graph = Self::new();
        for entry in iter {
            graph.insert(entry);
        }
        graph
    }
}

impl HostGraph for ModuleGraph {
    fn entry_ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.modules.get(*id).is_some_and(|m| m.is_entry))
            .cloned()
            .collect()
    }

    fn imported_ids(&self, id: &str) -> Option<&[String]> {
        self.modules.get(id).map(|m| m.imported_ids.as_slice())
    }
}

/// What the host graph can be trusted for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum GraphCapability {
    /// Full adjacency is available; bundles follow dependency order.
    #[default]
    ModuleGraph,
    /// No usable adjacency; every known module goes into one bundle in
    /// lexicographic order.
    NameSort,
}

impl GraphCapability {
    pub fn provider(self) -> Box<dyn GraphProvider> {
        match self {
            Self::ModuleGraph => Box::new(DependencyOrder),
            Self::NameSort => Box::new(NameSortOrder),
        }
    }
}

/// Modules that make up one output bundle, in concatenation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleChunk {
    /// The entry the chunk is named after.
    pub entry: String,
    pub modules: Vec<String>,
}

/// Result of planning a build's bundles.
#[derive(Debug, Default)]
pub struct ChunkPlan {
    pub chunks: Vec<ModuleChunk>,
    pub warnings: Vec<AssemblyGraphWarning>,
}

/// Turns entries into ordered module lists.
pub trait GraphProvider: Send + Sync + fmt::Debug {
    /// `entries` are the resolved entry ids; `known_modules` every module
    /// that recorded stylesheet fragments, sorted.
    fn plan(&self, graph: &dyn HostGraph, entries: &[String], known_modules: &[String])
    -> ChunkPlan;
}

/// Depth-first traversal of the host's import edges, one chunk per entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyOrder;

impl GraphProvider for DependencyOrder {
    fn plan(&self, graph: &dyn HostGraph, entries: &[String], _: &[String]) -> ChunkPlan {
        let mut plan = ChunkPlan::default();
        for entry in entries {
            let modules = collect_modules(graph, entry, &mut plan.warnings);
            plan.chunks.push(ModuleChunk {
                entry: entry.clone(),
                modules,
            });
        }
        plan
    }
}

/// Fallback for hosts without adjacency information.
#[derive(Debug, Default, Clone, Copy)]
pub struct NameSortOrder;

/// Chunk name used when the fallback has no entry to name its bundle after.
pub const FALLBACK_CHUNK_NAME: &str = "style";

impl GraphProvider for NameSortOrder {
    fn plan(&self, _: &dyn HostGraph, entries: &[String], known_modules: &[String]) -> ChunkPlan {
        let mut modules = known_modules.to_vec();
        modules.sort_unstable();
        modules.dedup();
        let entry = entries
            .first()
            .cloned()
            .unwrap_or_else(|| FALLBACK_CHUNK_NAME.to_string());
        ChunkPlan {
            chunks: vec![ModuleChunk { entry, modules }],
            warnings: Vec::new(),
        }
    }
}

/// Every module reachable from `entry`, each once, dependencies first.
///
/// A module is marked visited when first discovered and appended once all of
/// its imports have been handled, so cycles terminate and an import always
/// precedes its importer unless they are on the same cycle. Unknown modules
/// produce a warning and are skipped; an unknown entry is still returned so
/// its own fragments are not lost.
pub fn collect_modules(
    graph: &dyn HostGraph,
    entry: &str,
    warnings: &mut Vec<AssemblyGraphWarning>,
) -> Vec<String> {
    let mut visited: FxHashSet<&str> = FxHashSet::default();
    let mut order = Vec::new();

    visited.insert(entry);
    let Some(imports) = graph.imported_ids(entry) else {
        warn_unknown(warnings, None, entry);
        return vec![entry.to_string()];
    };
    let mut stack: Vec<(&str, std::slice::Iter<'_, String>)> = vec![(entry, imports.iter())];

    while let Some((current, imports)) = stack.last_mut() {
        match imports.next() {
            Some(child) => {
                if !visited.insert(child.as_str()) {
                    continue;
                }
                match graph.imported_ids(child) {
                    Some(grandchildren) => stack.push((child.as_str(), grandchildren.iter())),
                    None => warn_unknown(warnings, Some(*current), child),
                }
            }
            None => {
                order.push((*current).to_string());
                stack.pop();
            }
        }
    }
    order
}

fn warn_unknown(warnings: &mut Vec<AssemblyGraphWarning>, importer: Option<&str>, module: &str) {
    tracing::warn!(importer, module, "skipping module unknown to the host graph");
    warnings.push(AssemblyGraphWarning {
        importer: importer.map(ToString::to_string),
        module: module.to_string(),
    });
}
