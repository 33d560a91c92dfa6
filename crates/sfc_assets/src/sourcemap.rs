//! Source map building, normalization, composition and concatenation.
//!
//! Every stylesheet fragment ends up with one map that points from its final
//! code straight back to the pre-transform text, however many rewrites ran in
//! between. [`compose`] chains two maps, [`ConcatMapBuilder`] stitches many
//! fragment maps into one bundle map.

use oxc_sourcemap::{SourceMap, SourceMapBuilder};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// Byte offset to line/column conversion for one source text.
///
/// Lines and columns are 0-based; columns count UTF-16 code units, as the
/// source map format requires.
#[derive(Debug)]
pub struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<u32>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            line_starts: compute_line_starts(source),
        }
    }

    #[expect(clippy::cast_possible_truncation)]
    pub fn line_column(&self, byte_offset: u32) -> (u32, u32) {
        let byte_offset = byte_offset.min(self.source.len().try_into().unwrap_or(u32::MAX));
        let line = match self.line_starts.binary_search(&byte_offset) {
            Ok(exact) => exact,
            Err(insert_pos) => insert_pos.saturating_sub(1),
        };
        let line_start = self.line_starts[line] as usize;
        let segment = &self.source.as_bytes()[line_start..byte_offset as usize];
        let column = if segment.is_ascii() {
            segment.len() as u32
        } else {
            self.source
                .get(line_start..byte_offset as usize)
                .map_or(segment.len(), |s| s.encode_utf16().count()) as u32
        };
        (line as u32, column)
    }
}

/// Byte offsets of the first character of every line. `\r\n` counts once.
#[expect(clippy::cast_possible_truncation)]
fn compute_line_starts(source: &str) -> Vec<u32> {
    let bytes = source.as_bytes();
    let mut starts = vec![0u32];
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'\n' => starts.push((i + 1) as u32),
            b'\r' if bytes.get(i + 1) != Some(&b'\n') => starts.push((i + 1) as u32),
            _ => {}
        }
    }
    starts
}

/// Builds a map for output that is assembled from slices of one original text.
///
/// Callers append to their own output buffer and report, at each point where
/// output resumes copying original text, which original byte offset it came
/// from. The generated position is tracked by scanning the bytes appended
/// since the previous call.
pub struct MappingBuilder<'a> {
    source_id: u32,
    index: LineIndex<'a>,
    inner: SourceMapBuilder,
    last_generated_update: usize,
    generated_line: u32,
    generated_column: u32,
    last_position: Option<u32>,
}

impl<'a> MappingBuilder<'a> {
    /// `source_path` is the name recorded in `sources`; `source_text` is the
    /// text original offsets refer to and is embedded as `sourcesContent`.
    pub fn new(source_path: &str, source_text: &'a str) -> Self {
        let mut inner = SourceMapBuilder::default();
        let source_id = inner.set_source_and_content(source_path, source_text);
        Self {
            source_id,
            index: LineIndex::new(source_text),
            inner,
            last_generated_update: 0,
            generated_line: 0,
            generated_column: 0,
            last_position: None,
        }
    }

    pub fn into_sourcemap(self) -> SourceMap {
        self.inner.into_sourcemap()
    }

    /// Map the current end of `output` to `original_position`.
    ///
    /// Consecutive calls for the same original position are collapsed.
    pub fn add_source_mapping(&mut self, output: &[u8], original_position: u32) {
        if self.last_position == Some(original_position) {
            return;
        }
        let (original_line, original_column) = self.index.line_column(original_position);
        self.update_generated_line_and_column(output);
        self.inner.add_token(
            self.generated_line,
            self.generated_column,
            original_line,
            original_column,
            Some(self.source_id),
            None,
        );
        self.last_position = Some(original_position);
    }

    /// Like [`Self::add_source_mapping`], without collapsing repeats.
    pub fn add_source_mapping_force(&mut self, output: &[u8], original_position: u32) {
        self.last_position = None;
        self.add_source_mapping(output, original_position);
    }

    /// Append `original[start..end]` to `output`, mapping its first byte and
    /// the start of every line it spans.
    #[expect(clippy::cast_possible_truncation)]
    pub fn push_original(&mut self, output: &mut String, start: usize, end: usize) {
        let source = self.index.source;
        let end = end.min(source.len());
        if start >= end {
            return;
        }
        let mut cursor = start;
        for (i, b) in source.as_bytes()[start..end].iter().enumerate() {
            let at = start + i;
            if at == cursor {
                self.add_source_mapping(output.as_bytes(), at as u32);
            }
            if *b == b'\n' || (*b == b'\r' && source.as_bytes().get(at + 1) != Some(&b'\n')) {
                output.push_str(&source[cursor..=at]);
                cursor = at + 1;
            }
        }
        if cursor < end {
            output.push_str(&source[cursor..end]);
        }
    }

    #[expect(clippy::cast_possible_truncation)]
    fn update_generated_line_and_column(&mut self, output: &[u8]) {
        let start = self.last_generated_update;
        if start >= output.len() {
            self.last_generated_update = output.len();
            return;
        }
        let new_bytes = &output[start..];

        let mut last_newline = None;
        let mut newline_count: u32 = 0;
        let mut i = 0;
        while i < new_bytes.len() {
            match new_bytes[i] {
                b'\n' => {
                    newline_count += 1;
                    last_newline = Some(i);
                }
                b'\r' => {
                    newline_count += 1;
                    if new_bytes.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                    last_newline = Some(i);
                }
                _ => {}
            }
            i += 1;
        }

        let utf16_len = |bytes: &[u8]| -> u32 {
            if bytes.is_ascii() {
                bytes.len() as u32
            } else {
                std::str::from_utf8(bytes).map_or(bytes.len(), |s| s.encode_utf16().count())
                    as u32
            }
        };

        if let Some(last) = last_newline {
            self.generated_line += newline_count;
            self.generated_column = utf16_len(&new_bytes[last + 1..]);
        } else {
            self.generated_column += utf16_len(new_bytes);
        }
        self.last_generated_update = output.len();
    }
}

/// A map that points every line of `text` at itself.
pub fn identity_map(source_path: &str, text: &str) -> SourceMap {
    let mut builder = MappingBuilder::new(source_path, text);
    let mut output = String::with_capacity(text.len());
    builder.push_original(&mut output, 0, text.len());
    builder.into_sourcemap()
}

/// A source map in any of the shapes a transformer may hand back.
pub enum MapInput {
    /// Serialized JSON.
    Json(String),
    /// Serialized JSON as raw bytes.
    Bytes(Vec<u8>),
    /// An already parsed map.
    Map(SourceMap),
    /// A builder that has not been finalized yet.
    Builder(SourceMapBuilder),
}

impl std::fmt::Debug for MapInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(json) => f.debug_tuple("Json").field(&json.len()).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Map(_) => f.write_str("Map(..)"),
            Self::Builder(_) => f.write_str("Builder(..)"),
        }
    }
}

impl From<String> for MapInput {
    fn from(json: String) -> Self {
        Self::Json(json)
    }
}

impl From<SourceMap> for MapInput {
    fn from(map: SourceMap) -> Self {
        Self::Map(map)
    }
}

impl MapInput {
    /// Finalize into a parsed, validated map. `path` labels errors.
    pub fn into_sourcemap(self, path: &str) -> Result<SourceMap> {
        let map = match self {
            Self::Json(json) => parse_json(&json, path)?,
            Self::Bytes(bytes) => {
                let json = String::from_utf8(bytes).map_err(|e| Error::map_composition(path, e))?;
                parse_json(&json, path)?
            }
            Self::Map(map) => map,
            Self::Builder(builder) => builder.into_sourcemap(),
        };
        validate(&map, path)?;
        Ok(map)
    }
}

fn parse_json(json: &str, path: &str) -> Result<SourceMap> {
    SourceMap::from_json_string(json).map_err(|e| Error::map_composition(path, e))
}

/// Reject maps whose tokens point at sources the map does not declare.
fn validate(map: &SourceMap, path: &str) -> Result<()> {
    let source_count = map.get_sources().count();
    for token in map.get_tokens() {
        if let Some(id) = token.get_source_id()
            && id as usize >= source_count
        {
            return Err(Error::map_composition(
                path,
                format!("mapping refers to source #{id} but only {source_count} are declared"),
            ));
        }
    }
    Ok(())
}

/// The name a map attributes its positions to: its first source, else its `file`.
pub fn primary_source(map: &SourceMap) -> Option<String> {
    map.get_sources()
        .next()
        .map(|source| AsRef::<str>::as_ref(source).to_string())
        .or_else(|| map.get_file().map(|file| file.to_string()))
}

/// Copies sources from an existing map into a new builder, on first use.
#[derive(Default)]
struct SourceTable {
    ids: FxHashMap<(String, String), u32>,
}

impl SourceTable {
    fn get_or_insert(
        &mut self,
        builder: &mut SourceMapBuilder,
        map: &SourceMap,
        source_id: u32,
    ) -> u32 {
        let name = map
            .get_source(source_id)
            .map(|s| s.to_string())
            .unwrap_or_default();
        let content = map
            .get_source_content(source_id)
            .map(|s| s.to_string())
            .unwrap_or_default();
        self.insert(builder, name, content)
    }

    fn insert(&mut self, builder: &mut SourceMapBuilder, name: String, content: String) -> u32 {
        if let Some(id) = self.ids.get(&(name.clone(), content.clone())) {
            return *id;
        }
        let id = builder.set_source_and_content(&name, &content);
        self.ids.insert((name, content), id);
        id
    }
}

/// Compose `outer` (final → intermediate) with `inner` (intermediate →
/// original), producing final → original.
///
/// Tokens of `outer` whose intermediate position `inner` does not cover are
/// dropped: that output has no original text.
pub fn compose(outer: &SourceMap, inner: &SourceMap) -> SourceMap {
    let lookup = inner.generate_lookup_table();
    let mut builder = SourceMapBuilder::default();
    let mut sources = SourceTable::default();

    for token in outer.get_tokens() {
        let intermediate_line = token.get_src_line();
        let intermediate_col = token.get_src_col();
        let Some(original) = inner.lookup_token(&lookup, intermediate_line, intermediate_col)
        else {
            continue;
        };
        let Some(inner_source) = original.get_source_id() else {
            continue;
        };
        let source_id = sources.get_or_insert(&mut builder, inner, inner_source);

        // Within one copied segment the column offset carries over.
        let original_col = if original.get_dst_line() == intermediate_line {
            original.get_src_col() + intermediate_col.saturating_sub(original.get_dst_col())
        } else {
            original.get_src_col()
        };
        let name_id = original
            .get_name_id()
            .and_then(|id| inner.get_name(id))
            .map(|name| builder.add_name(&name.to_string()));

        builder.add_token(
            token.get_dst_line(),
            token.get_dst_col(),
            original.get_src_line(),
            original_col,
            Some(source_id),
            name_id,
        );
    }

    builder.into_sourcemap()
}

/// Rebuild `map` so the source standing for `path` embeds `content`.
///
/// The source named `path` is chosen; failing that, a single-source map's only
/// source. Other sources keep whatever content they carried.
pub fn embed_source_content(map: &SourceMap, path: &str, content: &str) -> SourceMap {
    let names: Vec<String> = map
        .get_sources()
        .map(|source| AsRef::<str>::as_ref(source).to_string())
        .collect();
    let primary = names
        .iter()
        .position(|name| name == path)
        .or_else(|| (names.len() == 1).then_some(0));

    let mut builder = SourceMapBuilder::default();
    let mut sources = SourceTable::default();
    let mut remapped: FxHashMap<u32, u32> = FxHashMap::default();

    for token in map.get_tokens() {
        let source_id = token.get_source_id().map(|id| {
            *remapped.entry(id).or_insert_with(|| {
                if primary == Some(id as usize) {
                    sources.insert(&mut builder, names[id as usize].clone(), content.to_string())
                } else {
                    sources.get_or_insert(&mut builder, map, id)
                }
            })
        });
        let name_id = token
            .get_name_id()
            .and_then(|id| map.get_name(id))
            .map(|name| builder.add_name(&name.to_string()));
        builder.add_token(
            token.get_dst_line(),
            token.get_dst_col(),
            token.get_src_line(),
            token.get_src_col(),
            source_id,
            name_id,
        );
    }

    builder.into_sourcemap()
}

/// Concatenates fragment maps, each starting at column 0 of a given line.
#[derive(Default)]
pub struct ConcatMapBuilder {
    builder: SourceMapBuilder,
    sources: SourceTable,
}

impl ConcatMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every token of `map`, shifted down by `line_offset` lines.
    pub fn add_sourcemap(&mut self, map: &SourceMap, line_offset: u32) {
        let mut remapped: FxHashMap<u32, u32> = FxHashMap::default();
        for token in map.get_tokens() {
            let source_id = token.get_source_id().map(|id| {
                *remapped
                    .entry(id)
                    .or_insert_with(|| self.sources.get_or_insert(&mut self.builder, map, id))
            });
            let name_id = token
                .get_name_id()
                .and_then(|id| map.get_name(id))
                .map(|name| self.builder.add_name(&name.to_string()));
            self.builder.add_token(
                token.get_dst_line() + line_offset,
                token.get_dst_col(),
                token.get_src_line(),
                token.get_src_col(),
                source_id,
                name_id,
            );
        }
    }

    pub fn into_sourcemap(self) -> SourceMap {
        self.builder.into_sourcemap()
    }
}
