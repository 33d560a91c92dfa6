//! CSS scoping.
//!
//! Rewrites selectors so a component's rules only match that component's
//! markup. The scope token is attached to the rightmost compound of every
//! complex selector, ahead of its pseudo-classes and pseudo-elements:
//!
//! ```text
//! .btn:hover        ->  .btn.TOKEN:hover
//! nav > a::after    ->  nav > a.TOKEN::after
//! :global(.x) .y    ->  .x .y.TOKEN
//! ```
//!
//! `:global(...)` is unwrapped and left unscoped; `:root`, `html`, `body` and
//! nesting (`&`) compounds are never scoped.
//!
//! Two [`StyleScoper`] implementations are provided. [`SelectorScoper`] edits
//! the text in place and keeps all other bytes (whitespace, comments,
//! declarations) untouched. [`LightningCssScoper`] parses the stylesheet with
//! lightningcss and reprints it.

use std::convert::Infallible;

use lightningcss::css_modules;
use lightningcss::printer::PrinterOptions;
use lightningcss::selector::{Combinator, Component, PseudoClass, Selector, SelectorList};
use lightningcss::stylesheet::{ParserFlags, ParserOptions, StyleSheet};
use lightningcss::values::ident::Ident;
use lightningcss::values::string::CowArcStr;
use lightningcss::visit_types;
use lightningcss::visitor::{Visit, VisitTypes, Visitor};
use oxc_sourcemap::SourceMap;
use smallvec::smallvec;

use crate::error::BoxError;
use crate::sourcemap::MappingBuilder;

/// How the scope token is spelled inside a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopedStyleStrategy {
    /// `.sel.TOKEN`
    #[default]
    Class,
    /// `.sel:where(.TOKEN)`, which adds no specificity.
    Where,
    /// `.sel[data-TOKEN]`
    Attribute,
}

impl ScopedStyleStrategy {
    /// The selector text appended to a compound.
    pub fn marker(self, token: &str) -> String {
        match self {
            Self::Class => format!(".{token}"),
            Self::Where => format!(":where(.{token})"),
            Self::Attribute => format!("[data-{token}]"),
        }
    }
}

/// Input to a scoping pass.
#[derive(Debug, Clone, Copy)]
pub struct ScopeRequest<'a> {
    pub code: &'a str,
    pub token: &'a str,
    /// Name recorded in the produced map's `sources`.
    pub filename: &'a str,
    pub strategy: ScopedStyleStrategy,
}

/// Result of a scoping pass.
#[derive(Debug)]
pub struct ScopeOutput {
    pub code: String,
    /// Maps `code` back to the request's input code.
    pub map: Option<SourceMap>,
}

/// The CSS scoping collaborator.
pub trait StyleScoper: Send + Sync {
    fn scope(&self, request: &ScopeRequest<'_>) -> Result<ScopeOutput, BoxError>;
}

// ---------------------------------------------------------------------------
// Text scoper
// ---------------------------------------------------------------------------

/// At-rules whose block holds further style rules.
const CONDITIONAL_AT_RULES: &[&str] = &[
    "media",
    "supports",
    "layer",
    "container",
    "document",
    "-moz-document",
    "starting-style",
];

/// Whitespace-preserving scoper that only inserts scope markers and removes
/// `:global(` wrappers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectorScoper;

impl StyleScoper for SelectorScoper {
    fn scope(&self, request: &ScopeRequest<'_>) -> Result<ScopeOutput, BoxError> {
        let marker = request.strategy.marker(request.token);
        let mut scanner = CssScanner::new(request.code, &marker);
        scanner.rule_list(false);
        let mut edits = scanner.edits;
        edits.sort_by_key(|edit| edit.start);

        let code = request.code;
        let mut builder = MappingBuilder::new(request.filename, code);
        let mut output = String::with_capacity(code.len() + edits.len() * marker.len());
        let mut position = 0;
        for edit in &edits {
            builder.push_original(&mut output, position, edit.start);
            output.push_str(edit.insert);
            position = edit.end;
        }
        builder.push_original(&mut output, position, code.len());

        Ok(ScopeOutput {
            code: output,
            map: Some(builder.into_sourcemap()),
        })
    }
}

/// Replace `start..end` of the input with `insert`.
#[derive(Debug)]
struct Edit<'m> {
    start: usize,
    end: usize,
    insert: &'m str,
}

struct CssScanner<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    marker: &'a str,
    edits: Vec<Edit<'a>>,
}

impl<'a> CssScanner<'a> {
    fn new(source: &'a str, marker: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            marker,
            edits: Vec::new(),
        }
    }

    /// Scan a list of rules until EOF, or until the closing `}` when `nested`.
    fn rule_list(&mut self, nested: bool) {
        loop {
            self.skip_trivia();
            let Some(&b) = self.bytes.get(self.pos) else {
                return;
            };
            match b {
                b'}' => {
                    self.pos += 1;
                    if nested {
                        return;
                    }
                }
                b';' => self.pos += 1,
                b'@' => self.at_rule(),
                _ => self.style_rule(),
            }
        }
    }

    fn at_rule(&mut self) {
        let name_start = self.pos + 1;
        let mut name_end = name_start;
        while self
            .bytes
            .get(name_end)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
        {
            name_end += 1;
        }
        let name = self.source[name_start..name_end].to_ascii_lowercase();

        match self.prelude_end(name_end) {
            Some((brace, b'{')) => {
                self.pos = brace + 1;
                if CONDITIONAL_AT_RULES.contains(&name.as_str()) {
                    self.rule_list(true);
                } else {
                    self.skip_block();
                }
            }
            Some((end, b'}')) => self.pos = end,
            Some((end, _)) => self.pos = end + 1,
            None => self.pos = self.bytes.len(),
        }
    }

    fn style_rule(&mut self) {
        let start = self.pos;
        match self.prelude_end(start) {
            Some((brace, b'{')) => {
                self.scope_selector_list(start, brace);
                self.pos = brace + 1;
                self.skip_block();
            }
            Some((end, b'}')) => self.pos = end,
            Some((end, _)) => self.pos = end + 1,
            None => self.pos = self.bytes.len(),
        }
    }

    /// Find the `{`, `;` or `}` ending a prelude that starts at `from`.
    fn prelude_end(&self, from: usize) -> Option<(usize, u8)> {
        let mut depth = 0usize;
        let mut i = from;
        while let Some(&b) = self.bytes.get(i) {
            match b {
                b'\\' => i += 1,
                b'"' | b'\'' => i = self.string_end(i),
                b'/' if self.bytes.get(i + 1) == Some(&b'*') => i = self.comment_end(i) - 1,
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth = depth.saturating_sub(1),
                b'{' | b';' | b'}' if depth == 0 => return Some((i, b)),
                _ => {}
            }
            i += 1;
        }
        None
    }

    /// Skip to just past the `}` closing the block whose `{` was consumed.
    fn skip_block(&mut self) {
        let mut depth = 1usize;
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b'\\' => self.pos += 1,
                b'"' | b'\'' => self.pos = self.string_end(self.pos),
                b'/' if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    self.pos = self.comment_end(self.pos) - 1;
                }
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.bytes.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
                self.pos += 1;
            }
            if self.bytes.get(self.pos) == Some(&b'/') && self.bytes.get(self.pos + 1) == Some(&b'*')
            {
                self.pos = self.comment_end(self.pos);
            } else {
                return;
            }
        }
    }

    /// Offset just past the comment starting at `start`.
    fn comment_end(&self, start: usize) -> usize {
        self.source[start + 2..]
            .find("*/")
            .map_or(self.bytes.len(), |i| start + 2 + i + 2)
    }

    /// Offset of the closing quote of the string starting at `start`.
    fn string_end(&self, start: usize) -> usize {
        let quote = self.bytes[start];
        let mut i = start + 1;
        while let Some(&b) = self.bytes.get(i) {
            match b {
                b'\\' => i += 1,
                b'\n' => return i,
                _ if b == quote => return i,
                _ => {}
            }
            i += 1;
        }
        self.bytes.len()
    }

    fn scope_selector_list(&mut self, start: usize, end: usize) {
        let mut depth = 0usize;
        let mut piece_start = start;
        let mut i = start;
        while i < end {
            match self.bytes[i] {
                b'\\' => i += 1,
                b'"' | b'\'' => i = self.string_end(i),
                b'/' if self.bytes.get(i + 1) == Some(&b'*') => i = self.comment_end(i) - 1,
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => {
                    self.scope_complex_selector(piece_start, i);
                    piece_start = i + 1;
                }
                _ => {}
            }
            i += 1;
        }
        self.scope_complex_selector(piece_start, end);
    }

    fn scope_complex_selector(&mut self, start: usize, end: usize) {
        let (start, end) = self.trim_trivia(start, end);
        if start == end {
            return;
        }

        // The rightmost compound begins after the last top-level combinator.
        let mut depth = 0usize;
        let mut compound_start = start;
        let mut i = start;
        while i < end {
            match self.bytes[i] {
                b'\\' => i += 1,
                b'"' | b'\'' => i = self.string_end(i),
                b'/' if self.bytes.get(i + 1) == Some(&b'*') => i = self.comment_end(i) - 1,
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth = depth.saturating_sub(1),
                b'>' | b'+' | b'~' | b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' if depth == 0 => {
                    compound_start = i + 1;
                }
                _ => {}
            }
            i += 1;
        }

        let global_in_last = self.unwrap_globals(start, end, compound_start);
        if global_in_last || !self.is_scopable(compound_start, end) {
            return;
        }
        let at = self.pseudo_start(compound_start, end).unwrap_or(end);
        self.edits.push(Edit {
            start: at,
            end: at,
            insert: self.marker,
        });
    }

    /// Narrow `start..end` past leading and trailing whitespace and comments.
    fn trim_trivia(&self, mut start: usize, mut end: usize) -> (usize, usize) {
        loop {
            while start < end && self.bytes[start].is_ascii_whitespace() {
                start += 1;
            }
            if self.source[start..end].starts_with("/*") {
                start = self.comment_end(start).min(end);
            } else {
                break;
            }
        }
        loop {
            while end > start && self.bytes[end - 1].is_ascii_whitespace() {
                end -= 1;
            }
            let text = &self.source[start..end];
            match text.strip_suffix("*/").and_then(|rest| rest.rfind("/*")) {
                Some(open) => end = start + open,
                None => break,
            }
        }
        (start, end)
    }

    /// Queue removal of every `:global(` wrapper in `start..end`. Returns
    /// whether one of them sits in the compound beginning at `last_compound`.
    fn unwrap_globals(&mut self, start: usize, end: usize, last_compound: usize) -> bool {
        const GLOBAL: &str = ":global(";
        let mut found_in_last = false;
        let mut search = start;
        while let Some(found) = self.source[search..end].find(GLOBAL) {
            let open = search + found;
            let Some(close) = self.matching_paren(open + GLOBAL.len() - 1, end) else {
                break;
            };
            self.edits.push(Edit {
                start: open,
                end: open + GLOBAL.len(),
                insert: "",
            });
            self.edits.push(Edit {
                start: close,
                end: close + 1,
                insert: "",
            });
            if close >= last_compound {
                found_in_last = true;
            }
            search = close + 1;
        }
        found_in_last
    }

    fn matching_paren(&self, open: usize, end: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut i = open;
        while i < end {
            match self.bytes[i] {
                b'\\' => i += 1,
                b'"' | b'\'' => i = self.string_end(i),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }
        None
    }

    fn is_scopable(&self, start: usize, end: usize) -> bool {
        let compound = &self.source[start..end];
        if compound.contains('&') || compound.starts_with(":root") {
            return false;
        }
        let type_len = compound
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
            .count();
        let type_name = &compound[..type_len];
        !(type_name.eq_ignore_ascii_case("html") || type_name.eq_ignore_ascii_case("body"))
    }

    /// First top-level `:` of the compound, where pseudo-classes begin.
    fn pseudo_start(&self, start: usize, end: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut i = start;
        while i < end {
            match self.bytes[i] {
                b'\\' => i += 1,
                b'"' | b'\'' => i = self.string_end(i),
                b'/' if self.bytes.get(i + 1) == Some(&b'*') => i = self.comment_end(i) - 1,
                b'(' | b'[' => depth += 1,
                b')' | b']' => depth = depth.saturating_sub(1),
                b':' if depth == 0 => return Some(i),
                _ => {}
            }
            i += 1;
        }
        None
    }
}

// ---------------------------------------------------------------------------
// lightningcss scoper
// ---------------------------------------------------------------------------

/// Scoper backed by a full lightningcss parse.
///
/// Output is reprinted (normalized whitespace, shortened colors), so the
/// produced map is what keeps positions attributable.
#[derive(Debug, Default, Clone, Copy)]
pub struct LightningCssScoper;

impl StyleScoper for LightningCssScoper {
    fn scope(&self, request: &ScopeRequest<'_>) -> Result<ScopeOutput, BoxError> {
        // CSS modules mode parses `:global()` into `PseudoClass::Global`
        // instead of an opaque custom function. The `[local]` pattern keeps
        // every name unchanged.
        let options = ParserOptions {
            filename: request.filename.to_string(),
            flags: ParserFlags::NESTING,
            error_recovery: true,
            css_modules: Some(css_modules::Config {
                pattern: css_modules::Pattern {
                    segments: smallvec![css_modules::Segment::Local],
                },
                animation: false,
                grid: false,
                custom_idents: false,
                container: false,
                dashed_idents: false,
                pure: false,
            }),
            ..ParserOptions::default()
        };
        let mut stylesheet =
            StyleSheet::parse(request.code, options).map_err(|e| e.to_string())?;

        let mut visitor = ScopeVisitor {
            token: request.token,
            strategy: request.strategy,
        };
        let Ok(()) = stylesheet.visit(&mut visitor);

        let mut source_map = parcel_sourcemap::SourceMap::new("/");
        let source_index = source_map.add_source(request.filename);
        source_map
            .set_source_content(source_index as usize, request.code)
            .map_err(|e| format!("{e:?}"))?;

        let result = stylesheet
            .to_css(PrinterOptions {
                source_map: Some(&mut source_map),
                ..PrinterOptions::default()
            })
            .map_err(|e| e.to_string())?;
        let json = source_map.to_json(None).map_err(|e| format!("{e:?}"))?;
        let map = SourceMap::from_json_string(&json).map_err(|e| e.to_string())?;

        Ok(ScopeOutput {
            code: result.code,
            map: Some(map),
        })
    }
}

struct ScopeVisitor<'a> {
    token: &'a str,
    strategy: ScopedStyleStrategy,
}

impl<'i> Visitor<'i> for ScopeVisitor<'_> {
    type Error = Infallible;

    fn visit_types(&self) -> VisitTypes {
        visit_types!(SELECTORS)
    }

    fn visit_selector_list(&mut self, selectors: &mut SelectorList<'i>) -> Result<(), Self::Error> {
        let scoped: Vec<Selector<'i>> = selectors
            .0
            .iter()
            .map(|selector| self.scope_selector(selector))
            .collect();
        selectors.0 = scoped.into();
        Ok(())
    }
}

type Compound<'i> = (Option<Combinator>, Vec<Component<'i>>);

impl ScopeVisitor<'_> {
    fn scope_component<'i>(&self) -> Component<'i> {
        match self.strategy {
            ScopedStyleStrategy::Class => Component::Class(Ident(self.token.to_string().into())),
            ScopedStyleStrategy::Where => {
                let class = Component::Class(Ident(self.token.to_string().into()));
                let inner: Selector<'i> = vec![class].into();
                Component::Where(Box::new([inner]))
            }
            ScopedStyleStrategy::Attribute => {
                let name: CowArcStr<'i> = format!("data-{}", self.token).into();
                Component::AttributeInNoNamespaceExists {
                    local_name: Ident(name.clone()),
                    local_name_lower: Ident(name),
                }
            }
        }
    }

    fn scope_selector<'i>(&self, selector: &Selector<'i>) -> Selector<'i> {
        let compounds = split_into_compounds(selector);
        let last = compounds.len().saturating_sub(1);

        let mut components: Vec<Component<'i>> = Vec::new();
        for (i, (combinator, compound)) in compounds.into_iter().enumerate() {
            if i > 0
                && let Some(combinator) = combinator
            {
                components.push(Component::Combinator(combinator));
            }
            let had_global = compound.iter().any(is_global);
            let compound = unwrap_globals(compound);
            if i == last && !had_global && is_scopable(&compound) {
                components.extend(self.inject_scope(compound));
            } else {
                components.extend(compound);
            }
        }

        if components.is_empty() {
            return selector.clone();
        }
        components.into()
    }

    /// Insert the scope component before the first pseudo-class/element.
    fn inject_scope<'i>(&self, mut compound: Vec<Component<'i>>) -> Vec<Component<'i>> {
        let at = compound
            .iter()
            .position(|c| is_pseudo_class(c) || matches!(c, Component::PseudoElement(_)))
            .unwrap_or(compound.len());
        compound.insert(at, self.scope_component());
        compound
    }
}

/// Split a selector into `(combinator, compound)` pairs in source order, with
/// pseudo-elements folded back into the compound they follow.
fn split_into_compounds<'i>(selector: &Selector<'i>) -> Vec<Compound<'i>> {
    // Components are stored right to left by compound, left to right within
    // one; combinators separate the compounds.
    let raw = selector.iter_raw_match_order().as_slice();
    let mut combinators = selector
        .iter_raw_match_order()
        .rev()
        .filter_map(|c| c.as_combinator());

    let mut compounds: Vec<Compound<'i>> = Vec::new();
    for (i, slice) in raw.split(|c| c.is_combinator()).rev().enumerate() {
        let combinator = if i == 0 { None } else { combinators.next() };
        // `::before` is stored behind an internal pseudo-element combinator.
        if matches!(combinator, Some(Combinator::PseudoElement))
            && let Some(previous) = compounds.last_mut()
        {
            previous.1.extend(slice.iter().cloned());
            continue;
        }
        compounds.push((combinator, slice.to_vec()));
    }
    compounds
}

/// Replace every `:global(...)` with its inner components.
fn unwrap_globals<'i>(compound: Vec<Component<'i>>) -> Vec<Component<'i>> {
    let mut result = Vec::with_capacity(compound.len());
    for component in compound {
        if let Component::NonTSPseudoClass(PseudoClass::Global { selector }) = &component {
            for (i, (combinator, inner)) in split_into_compounds(selector).into_iter().enumerate() {
                if i > 0
                    && let Some(combinator) = combinator
                {
                    result.push(Component::Combinator(combinator));
                }
                result.extend(inner);
            }
        } else {
            result.push(component);
        }
    }
    result
}

fn is_global(component: &Component<'_>) -> bool {
    matches!(component, Component::NonTSPseudoClass(PseudoClass::Global { .. }))
}

fn is_scopable(compound: &[Component<'_>]) -> bool {
    if compound.is_empty() || compound.iter().any(|c| matches!(c, Component::Nesting)) {
        return false;
    }
    if matches!(compound, [Component::Root]) {
        return false;
    }
    !compound.iter().any(|c| match c {
        Component::LocalName(local) => {
            let name = local.name.0.as_ref();
            name == "body" || name == "html"
        }
        _ => false,
    })
}

fn is_pseudo_class(component: &Component<'_>) -> bool {
    matches!(
        component,
        Component::NonTSPseudoClass(_)
            | Component::Negation(_)
            | Component::Root
            | Component::Empty
            | Component::Scope
            | Component::Nth(_)
            | Component::NthOf(_)
            | Component::Is(_)
            | Component::Where(_)
            | Component::Has(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_with(source: &str, strategy: ScopedStyleStrategy) -> String {
        SelectorScoper
            .scope(&ScopeRequest {
                code: source,
                token: "xxxxxx",
                filename: "test.css",
                strategy,
            })
            .unwrap()
            .code
    }

    fn scope(source: &str) -> String {
        scope_with(source, ScopedStyleStrategy::Class)
    }

    fn lightning(source: &str) -> String {
        LightningCssScoper
            .scope(&ScopeRequest {
                code: source,
                token: "xxxxxx",
                filename: "test.css",
                strategy: ScopedStyleStrategy::Class,
            })
            .unwrap()
            .code
    }

    #[test]
    fn test_class() {
        assert_eq!(scope(".btn { color: red; }"), ".btn.xxxxxx { color: red; }");
    }

    #[test]
    fn test_element_and_id() {
        assert_eq!(scope("h1{}#main{}"), "h1.xxxxxx{}#main.xxxxxx{}");
    }

    #[test]
    fn test_selector_list() {
        assert_eq!(scope(".a, .b {}"), ".a.xxxxxx, .b.xxxxxx {}");
    }

    #[test]
    fn test_only_last_compound_is_scoped() {
        assert_eq!(scope(".nav > a + b ~ i {}"), ".nav > a + b ~ i.xxxxxx {}");
        assert_eq!(scope(".nav  li {}"), ".nav  li.xxxxxx {}");
    }

    #[test]
    fn test_pseudo_placement() {
        assert_eq!(scope("a:hover{}"), "a.xxxxxx:hover{}");
        assert_eq!(scope("h3::before{}"), "h3.xxxxxx::before{}");
        assert_eq!(scope(":hover{}"), ".xxxxxx:hover{}");
        assert_eq!(
            scope("li:not(.a:hover){}"),
            "li.xxxxxx:not(.a:hover){}"
        );
    }

    #[test]
    fn test_attribute_value_with_colon() {
        assert_eq!(
            scope("a[href=\"http://x\"] {}"),
            "a[href=\"http://x\"].xxxxxx {}"
        );
    }

    #[test]
    fn test_escaped_colon() {
        assert_eq!(scope(".md\\:flex{}"), ".md\\:flex.xxxxxx{}");
    }

    #[test]
    fn test_global() {
        assert_eq!(scope(":global(.dark) .btn{}"), ".dark .btn.xxxxxx{}");
        assert_eq!(scope(".card :global(p){}"), ".card p{}");
        assert_eq!(
            scope(":global(.a:not(.b)) i{}"),
            ".a:not(.b) i.xxxxxx{}"
        );
    }

    #[test]
    fn test_unscoped_compounds() {
        assert_eq!(scope(":root{--x:1}"), ":root{--x:1}");
        assert_eq!(scope("html, body{}"), "html, body{}");
        assert_eq!(scope("body.dark{}"), "body.dark{}");
        assert_eq!(scope("body h1{}"), "body h1.xxxxxx{}");
    }

    #[test]
    fn test_conditional_at_rules_are_descended() {
        assert_eq!(
            scope("@media (min-width: 640px) { .a { b: c } }"),
            "@media (min-width: 640px) { .a.xxxxxx { b: c } }"
        );
        assert_eq!(
            scope("@supports (display:grid){@layer x{.a{}}}"),
            "@supports (display:grid){@layer x{.a.xxxxxx{}}}"
        );
    }

    #[test]
    fn test_other_at_rules_are_skipped() {
        let source = "@import url(\"a.css\");@keyframes spin{from{a:b}to{a:c}}@font-face{font-family:x}.a{}";
        assert_eq!(
            scope(source),
            "@import url(\"a.css\");@keyframes spin{from{a:b}to{a:c}}@font-face{font-family:x}.a.xxxxxx{}"
        );
    }

    #[test]
    fn test_nested_rules_are_left_alone() {
        assert_eq!(
            scope(".a { color: red; & .b { color: blue } }"),
            ".a.xxxxxx { color: red; & .b { color: blue } }"
        );
    }

    #[test]
    fn test_comments_and_strings_are_skipped() {
        assert_eq!(
            scope("/* .x{} */ .a { content: \"}\" } .b{}"),
            "/* .x{} */ .a.xxxxxx { content: \"}\" } .b.xxxxxx{}"
        );
        assert_eq!(scope(".a /* note */ {}"), ".a.xxxxxx /* note */ {}");
        assert_eq!(scope(".a/* x */.b {}"), ".a/* x */.b.xxxxxx {}");
        assert_eq!(scope(".a /* x, y */ .b {}"), ".a /* x, y */ .b.xxxxxx {}");
        assert_eq!(scope(".a /* :hover */, .c {}"), ".a.xxxxxx /* :hover */, .c.xxxxxx {}");
        assert_eq!(scope("/* lead */ .a {}"), "/* lead */ .a.xxxxxx {}");
    }

    #[test]
    fn test_strategies() {
        assert_eq!(
            scope_with(".a:hover{}", ScopedStyleStrategy::Where),
            ".a:where(.xxxxxx):hover{}"
        );
        assert_eq!(
            scope_with(".a{}", ScopedStyleStrategy::Attribute),
            ".a[data-xxxxxx]{}"
        );
    }

    #[test]
    fn test_map_points_back_to_input_lines() {
        let source = "\n\n.btn {\n  color: red;\n}\n";
        let output = SelectorScoper
            .scope(&ScopeRequest {
                code: source,
                token: "e1a2b3",
                filename: "comp.css",
                strategy: ScopedStyleStrategy::Class,
            })
            .unwrap();
        assert_eq!(output.code, "\n\n.btn.e1a2b3 {\n  color: red;\n}\n");
        let map = output.map.unwrap();
        let lookup = map.generate_lookup_table();
        // Copying resumes after the marker: generated (2, 11) -> original (2, 4).
        let token = map.lookup_token(&lookup, 2, 12).unwrap();
        assert_eq!(token.get_dst_col(), 11);
        assert_eq!(token.get_src_line(), 2);
        assert_eq!(token.get_src_col(), 4);
    }

    #[test]
    fn test_lightningcss_class() {
        assert_eq!(lightning(".class{}"), ".class.xxxxxx {\n}\n");
    }

    #[test]
    fn test_lightningcss_last_compound_only() {
        assert_eq!(
            lightning(".a .b:hover{}"),
            ".a .b.xxxxxx:hover {\n}\n"
        );
    }

    #[test]
    fn test_lightningcss_global_and_root() {
        assert_eq!(lightning(":global(.dark) .b{}"), ".dark .b.xxxxxx {\n}\n");
        assert_eq!(lightning(":root{}"), ":root {\n}\n");
        assert_eq!(lightning("html,body{}"), "html, body {\n}\n");
    }

    #[test]
    fn test_lightningcss_produces_map() {
        let output = LightningCssScoper
            .scope(&ScopeRequest {
                code: ".a{}\n.b{}",
                token: "xxxxxx",
                filename: "test.css",
                strategy: ScopedStyleStrategy::Class,
            })
            .unwrap();
        let map = output.map.unwrap();
        assert!(map.get_tokens().next().is_some());
    }
}
