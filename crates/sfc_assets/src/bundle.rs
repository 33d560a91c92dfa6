//! Bundle assembly and emission.
//!
//! At emission time the graph provider orders each entry's modules, and the
//! recorded fragments of those modules are concatenated into one CSS bundle
//! per entry (or one for the whole build in single-bundle mode). Fragment maps
//! are shifted by the line each fragment starts on and merged into a single
//! bundle map.

use std::sync::Arc;

use oxc_sourcemap::SourceMap;
use rustc_hash::FxHashSet;

use crate::aggregator::StyleAggregator;
use crate::error::AssemblyGraphWarning;
use crate::graph::{GraphProvider, HostGraph, ModuleChunk};
use crate::options::{SessionOptions, SourcemapOption};
use crate::pipeline::TransformedFragment;
use crate::sourcemap::ConcatMapBuilder;

/// One concatenated CSS bundle.
#[derive(Debug, Clone)]
pub struct BundleArtifact {
    /// The entry this bundle belongs to, or the bundle name in single-bundle mode.
    pub entry: String,
    pub file_name: String,
    pub code: String,
    pub map: Option<SourceMap>,
}

impl BundleArtifact {
    /// Name of the side-car map file.
    pub fn map_file_name(&self) -> String {
        format!("{}.map", self.file_name)
    }

    /// Render into the files to write, attaching the map as `mode` asks.
    pub fn into_assets(self, mode: SourcemapOption) -> Vec<EmittedAsset> {
        let map_file_name = self.map_file_name();
        let mut code = self.code;
        let mut assets = Vec::with_capacity(2);
        let Some(map) = self.map.filter(|_| mode.is_enabled()) else {
            assets.push(EmittedAsset::new(self.file_name, code));
            return assets;
        };

        if !code.is_empty() && !code.ends_with('\n') {
            code.push('\n');
        }
        match mode {
            SourcemapOption::Inline | SourcemapOption::Both => {
                code.push_str("/*# sourceMappingURL=");
                code.push_str(&map.to_data_url());
                code.push_str(" */");
            }
            SourcemapOption::External => {
                code.push_str("/*# sourceMappingURL=");
                code.push_str(&map_file_name);
                code.push_str(" */");
            }
            SourcemapOption::None => {}
        }
        assets.push(EmittedAsset::new(self.file_name, code));
        if mode.emits_file() {
            assets.push(EmittedAsset::new(map_file_name, map.to_json_string()));
        }
        assets
    }
}

/// A file handed to the host's asset sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    pub file_name: String,
    pub source: String,
}

impl EmittedAsset {
    pub fn new(file_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            source: source.into(),
        }
    }
}

/// The host's asset emission sink.
pub trait AssetSink {
    fn emit_file(&mut self, file_name: String, source: String);
}

impl AssetSink for Vec<EmittedAsset> {
    fn emit_file(&mut self, file_name: String, source: String) {
        self.push(EmittedAsset { file_name, source });
    }
}

/// Adapts a closure into an [`AssetSink`].
pub struct FnSink<F>(pub F);

impl<F: FnMut(String, String)> AssetSink for FnSink<F> {
    fn emit_file(&mut self, file_name: String, source: String) {
        (self.0)(file_name, source);
    }
}

/// Result of one assembly pass.
#[derive(Debug, Default)]
pub struct BundleOutput {
    pub bundles: Vec<BundleArtifact>,
    pub warnings: Vec<AssemblyGraphWarning>,
}

/// Builds bundles from aggregated fragments.
pub struct BundleAssembler<'a> {
    pub aggregator: &'a StyleAggregator,
    pub provider: &'a dyn GraphProvider,
    pub options: &'a SessionOptions,
}

impl BundleAssembler<'_> {
    /// Run one assembly pass.
    ///
    /// Bundles come out in entry order. Entries whose modules own no CSS
    /// produce no bundle.
    pub fn assemble(&self, graph: &dyn HostGraph) -> BundleOutput {
        let entries = if self.options.entries.is_empty() {
            graph.entry_ids()
        } else {
            self.options.entries.clone()
        };
        let known_modules = self.aggregator.module_ids();
        let plan = self.provider.plan(graph, &entries, &known_modules);

        let chunks = match &self.options.single_bundle {
            Some(name) => vec![merge_chunks(name, plan.chunks)],
            None => plan.chunks,
        };

        let bundles = chunks
            .iter()
            .filter_map(|chunk| self.concatenate(chunk))
            .collect();
        BundleOutput {
            bundles,
            warnings: plan.warnings,
        }
    }

    fn concatenate(&self, chunk: &ModuleChunk) -> Option<BundleArtifact> {
        let fragments: Vec<Arc<TransformedFragment>> = chunk
            .modules
            .iter()
            .flat_map(|module| self.aggregator.fragments(module))
            .collect();
        if fragments.is_empty() {
            tracing::debug!(entry = %chunk.entry, "no stylesheets; skipping bundle");
            return None;
        }

        let file_name = match &self.options.single_bundle {
            Some(name) => name.clone(),
            None => self.options.file_name_for(&chunk.entry),
        };
        let (code, map) = concat_fragments(
            fragments.iter().map(|fragment| &**fragment),
            self.options.sourcemap.is_enabled(),
        );
        let map = map.map(|map| with_file(&map, &file_name));

        tracing::debug!(
            entry = %chunk.entry,
            file_name = %file_name,
            modules = chunk.modules.len(),
            fragments = fragments.len(),
            "assembled bundle"
        );
        Some(BundleArtifact {
            entry: chunk.entry.clone(),
            file_name,
            code,
            map,
        })
    }
}

/// Merge chunks into one, keeping the first occurrence of each module.
fn merge_chunks(name: &str, chunks: Vec<ModuleChunk>) -> ModuleChunk {
    let mut seen = FxHashSet::default();
    let mut modules = Vec::new();
    for chunk in chunks {
        for module in chunk.modules {
            if seen.insert(module.clone()) {
                modules.push(module);
            }
        }
    }
    ModuleChunk {
        entry: name.to_string(),
        modules,
    }
}

/// Concatenate fragments, each starting on a fresh line.
///
/// The merged map is only built when `sourcemap` is set; fragments without a
/// map contribute code but no mappings.
pub fn concat_fragments<'f>(
    fragments: impl IntoIterator<Item = &'f TransformedFragment>,
    sourcemap: bool,
) -> (String, Option<SourceMap>) {
    let mut code = String::new();
    let mut builder = sourcemap.then(ConcatMapBuilder::new);
    let mut line: u32 = 0;

    for fragment in fragments {
        if !code.is_empty() && !code.ends_with('\n') {
            code.push('\n');
            line += 1;
        }
        if let (Some(builder), Some(map)) = (builder.as_mut(), fragment.map.as_ref()) {
            builder.add_sourcemap(map, line);
        }
        code.push_str(&fragment.code);
        line += count_lines(&fragment.code);
    }

    (code, builder.map(ConcatMapBuilder::into_sourcemap))
}

/// Line terminators in `text`, counting `\r\n` once.
#[expect(clippy::cast_possible_truncation)]
fn count_lines(text: &str) -> u32 {
    let bytes = text.as_bytes();
    let mut count: usize = 0;
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'\n' => count += 1,
            b'\r' if bytes.get(i + 1) != Some(&b'\n') => count += 1,
            _ => {}
        }
    }
    count as u32
}

/// Copy `map` with its `file` set.
fn with_file(map: &SourceMap, file: &str) -> SourceMap {
    let mut map = map.clone();
    map.set_file(file);
    map
}
