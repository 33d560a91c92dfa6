//! Default code generator.
//!
//! Turns a [`TemplateDocument`] whose inline scripts have already been
//! rewritten into a JavaScript module:
//!
//! ```js
//! export * from "./comp_0.js";
//! import "./vendor.js";
//! export default `<div class="btn">Hi</div>`;
//! ```
//!
//! Scripts come first, in document order. The markup follows as a template
//! literal, with the contents of inline scripts and styles removed and
//! external resource elements kept as they were written.

use oxc_sourcemap::SourceMap;

use crate::document::{ResourceOrigin, ScriptSource, Span, TemplateDocument};
use crate::error::{Error, Result};
use crate::sourcemap::MappingBuilder;

/// Options passed to a [`CodeGenerator`] for one document.
#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions<'a> {
    /// Name recorded in the module map's `sources`.
    pub filename: &'a str,
    pub sourcemap: bool,
}

/// A generated JavaScript module.
#[derive(Debug, Clone)]
pub struct GeneratedModule {
    pub code: String,
    pub map: Option<SourceMap>,
}

/// The code generator collaborator, invoked once per document after its
/// resources have been rewritten.
pub trait CodeGenerator: Send + Sync {
    fn generate(
        &self,
        document: &TemplateDocument,
        options: &GenerateOptions<'_>,
    ) -> Result<GeneratedModule>;
}

/// Generates an ES module that re-exports scripts and default-exports markup.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModuleGenerator;

impl CodeGenerator for ModuleGenerator {
    fn generate(
        &self,
        document: &TemplateDocument,
        options: &GenerateOptions<'_>,
    ) -> Result<GeneratedModule> {
        let source = document.source.as_str();
        let mut code = String::with_capacity(source.len() + 64);
        let mut builder = options
            .sourcemap
            .then(|| MappingBuilder::new(options.filename, source));

        for script in &document.scripts {
            if let Some(builder) = builder.as_mut() {
                builder.add_source_mapping_force(code.as_bytes(), script.span.start);
            }
            match &script.source {
                // Already rewritten into a re-export statement.
                ScriptSource::Inline { content } => code.push_str(content.trim_end()),
                ScriptSource::External { src } => {
                    code.push_str("import ");
                    code.push_str(&js_string_literal(src));
                    code.push(';');
                }
            }
            code.push('\n');
        }

        code.push_str("export default `");
        let mut cursor = 0usize;
        for span in removed_spans(document) {
            let start = span.start as usize;
            if start < cursor {
                continue;
            }
            let end = span.end as usize;
            if end > source.len() {
                return Err(invalid_span(start, end, source.len()));
            }
            push_markup(&mut code, builder.as_mut(), source, cursor, start)?;
            cursor = end;
        }
        push_markup(&mut code, builder.as_mut(), source, cursor, source.len())?;
        code.push_str("`;\n");

        Ok(GeneratedModule {
            code,
            map: builder.map(MappingBuilder::into_sourcemap),
        })
    }
}

/// Content spans of inline resources, sorted by position.
fn removed_spans(document: &TemplateDocument) -> Vec<Span> {
    let scripts = document
        .scripts
        .iter()
        .filter(|s| s.origin() == ResourceOrigin::Inline)
        .map(|s| s.span);
    let styles = document
        .styles
        .iter()
        .filter(|s| s.origin() == ResourceOrigin::Inline)
        .map(|s| s.span);
    let mut spans: Vec<Span> = scripts.chain(styles).collect();
    spans.sort_unstable_by_key(|span| span.start);
    spans
}

/// Append escaped `source[start..end]`, mapping each line of it.
fn push_markup(
    code: &mut String,
    mut builder: Option<&mut MappingBuilder<'_>>,
    source: &str,
    start: usize,
    end: usize,
) -> Result<()> {
    if start >= end {
        return Ok(());
    }
    let Some(text) = source.get(start..end) else {
        return Err(invalid_span(start, end, source.len()));
    };
    let mut offset = start;
    for line in text.split_inclusive('\n') {
        if let Some(builder) = builder.as_deref_mut() {
            #[expect(clippy::cast_possible_truncation)]
            builder.add_source_mapping(code.as_bytes(), offset as u32);
        }
        code.push_str(&escape_template_literal(line));
        offset += line.len();
    }
    Ok(())
}

fn invalid_span(start: usize, end: usize, len: usize) -> Error {
    Error::Codegen {
        message: format!("span {start}..{end} does not fit the {len}-byte template"),
    }
}

/// Escape a string for safe embedding inside a JavaScript template literal.
///
/// Escapes backticks, `${` sequences, and backslashes.
pub fn escape_template_literal(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '`' => result.push_str("\\`"),
            '$' if chars.peek() == Some(&'{') => result.push_str("\\$"),
            '\\' => result.push_str("\\\\"),
            _ => result.push(c),
        }
    }

    result
}

/// Quote `s` as a double-quoted JavaScript string literal.
pub fn js_string_literal(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\u{2028}' => result.push_str("\\u2028"),
            '\u{2029}' => result.push_str("\\u2029"),
            _ => result.push(c),
        }
    }
    result.push('"');
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ScriptResource, StyleResource, StyleSource};

    fn document() -> TemplateDocument {
        let source = "<script>let a = 1;</script>\n<div>`${x}`</div>\n<style>.a{}</style>\n<script src=\"./v.js\"></script>";
        TemplateDocument {
            id: "/src/comp.html".to_string(),
            url: "/src/comp.html".to_string(),
            source: source.to_string(),
            scripts: vec![
                ScriptResource {
                    mime_type: "text/javascript".to_string(),
                    source: ScriptSource::Inline {
                        content: "export * from \"/src/comp_0.js\";".to_string(),
                    },
                    span: Span::new(8, 18),
                    index: 0,
                },
                ScriptResource {
                    mime_type: "text/javascript".to_string(),
                    source: ScriptSource::External {
                        src: "./v.js".to_string(),
                    },
                    span: Span::new(66, 96),
                    index: 1,
                },
            ],
            styles: vec![StyleResource {
                mime_type: "text/css".to_string(),
                source: StyleSource::Inline {
                    content: ".a{}".to_string(),
                },
                span: Span::new(53, 57),
                index: 0,
            }],
        }
    }

    #[test]
    fn test_generate_module() {
        let output = ModuleGenerator
            .generate(
                &document(),
                &GenerateOptions {
                    filename: "/src/comp.html",
                    sourcemap: false,
                },
            )
            .unwrap();
        assert_eq!(
            output.code,
            "export * from \"/src/comp_0.js\";\nimport \"./v.js\";\nexport default `<script></script>\n<div>\\`\\${x}\\`</div>\n<style></style>\n<script src=\"./v.js\"></script>`;\n"
        );
        assert!(output.map.is_none());
    }

    #[test]
    fn test_generate_map_points_scripts_at_template() {
        let output = ModuleGenerator
            .generate(
                &document(),
                &GenerateOptions {
                    filename: "/src/comp.html",
                    sourcemap: true,
                },
            )
            .unwrap();
        let map = output.map.unwrap();
        let lookup = map.generate_lookup_table();
        // Line 1 is the external script import; its element starts on line 3.
        let token = map.lookup_token(&lookup, 1, 0).unwrap();
        assert_eq!(token.get_src_line(), 3);
        let token = map.lookup_token(&lookup, 0, 0).unwrap();
        assert_eq!((token.get_src_line(), token.get_src_col()), (0, 8));
    }

    #[test]
    fn test_out_of_range_span_is_an_error() {
        let mut document = document();
        document.styles[0].span = Span::new(53, 500);
        let err = ModuleGenerator
            .generate(
                &document,
                &GenerateOptions {
                    filename: "/src/comp.html",
                    sourcemap: false,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Codegen { .. }));
        assert_eq!(err.to_string(), "code generation failed: span 53..500 does not fit the 96-byte template");
    }

    #[test]
    fn test_js_string_literal() {
        assert_eq!(js_string_literal("./a.js"), "\"./a.js\"");
        assert_eq!(js_string_literal("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn test_escape_template_literal() {
        assert_eq!(escape_template_literal("a`b"), "a\\`b");
        assert_eq!(escape_template_literal("${x}"), "\\${x}");
        assert_eq!(escape_template_literal("$x"), "$x");
    }
}
