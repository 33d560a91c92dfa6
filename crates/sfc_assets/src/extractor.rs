//! Resource extraction.
//!
//! A [`TemplateParser`] reports where a template's scripts and stylesheets
//! are; [`extract`] turns that report into owned [`ScriptResource`]s and
//! [`StyleResource`]s, and [`rewrite_inline_scripts`] later swaps inline
//! script bodies for re-exports of their virtual modules.

use cow_utils::CowUtils;

use crate::codegen::js_string_literal;
use crate::document::{
    ParsedTemplate, RawResource, ScriptResource, ScriptSource, Span, StyleResource, StyleSource,
    TemplateDocument,
};
use crate::error::Result;
use crate::options::resolve_reference;
use crate::virtual_modules::{VirtualModules, virtual_path};

/// The template parser collaborator.
///
/// Implementations report resource spans and MIME tags; they are trusted
/// verbatim.
pub trait TemplateParser: Send + Sync {
    fn parse(&self, source: &str, module_id: &str) -> Result<ParsedTemplate>;
}

/// Split a parsed template into owned resources.
///
/// Inline contents are copied out of `source`; external stylesheet references
/// are resolved against the directory of `module_id`. External scripts keep
/// their reference as written.
pub fn extract(parsed: &ParsedTemplate, module_id: &str, source: &str) -> TemplateDocument {
    let scripts = parsed
        .scripts
        .iter()
        .enumerate()
        .map(|(index, raw)| ScriptResource {
            mime_type: raw.mime_type.clone(),
            source: match &raw.src {
                Some(src) => ScriptSource::External { src: src.clone() },
                None => ScriptSource::Inline {
                    content: raw.span.source_text(source).to_string(),
                },
            },
            span: raw.span,
            index,
        })
        .collect();

    let styles = parsed
        .stylesheets
        .iter()
        .enumerate()
        .map(|(index, raw)| StyleResource {
            mime_type: raw.mime_type.clone(),
            source: match &raw.src {
                Some(href) => StyleSource::External {
                    path: resolve_reference(module_id, href),
                },
                None => StyleSource::Inline {
                    content: raw.span.source_text(source).to_string(),
                },
            },
            span: raw.span,
            index,
        })
        .collect();

    let url = if parsed.url.is_empty() { module_id } else { &parsed.url };
    TemplateDocument {
        id: module_id.to_string(),
        url: url.to_string(),
        source: source.to_string(),
        scripts,
        styles,
    }
}

/// Register every inline script as a virtual module and replace its content
/// with a re-export of that module. Returns the assigned paths in order.
///
/// The document's previously registered scripts are replaced as a whole, so
/// edited or removed scripts do not linger.
pub fn rewrite_inline_scripts(
    document: &mut TemplateDocument,
    modules: &VirtualModules,
) -> Result<Vec<String>> {
    let mut entries = Vec::new();
    for script in &document.scripts {
        if let ScriptSource::Inline { content } = &script.source {
            let path = virtual_path(&document.url, script.extension(), script.index);
            entries.push((path, content.clone()));
        }
    }
    modules.replace_owned(&document.id, &entries)?;

    let mut paths = entries.into_iter().map(|(path, _)| path);
    let mut assigned = Vec::new();
    for script in &mut document.scripts {
        let ScriptSource::Inline { content } = &mut script.source else {
            continue;
        };
        let Some(path) = paths.next() else {
            break;
        };
        *content = reexport_statement(&path);
        assigned.push(path);
    }
    Ok(assigned)
}

/// `export * from "<path>";`
pub fn reexport_statement(path: &str) -> String {
    format!("export * from {};", js_string_literal(path))
}

/// A lightweight HTML scanner for `<script>`, `<style>` and
/// `<link rel="stylesheet">` elements.
///
/// Comments are skipped, as is the raw text inside `<script>`, `<style>`,
/// `<textarea>` and `<title>`, so markup-like text there is not mistaken for
/// elements.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlTemplateParser;

impl TemplateParser for HtmlTemplateParser {
    fn parse(&self, source: &str, module_id: &str) -> Result<ParsedTemplate> {
        let mut parsed = ParsedTemplate {
            url: module_id.to_string(),
            ..ParsedTemplate::default()
        };
        let mut pos = 0;

        while let Some(offset) = source[pos..].find('<') {
            let start = pos + offset;
            let rest = &source[start..];

            if rest.starts_with("<!--") {
                pos = rest.find("-->").map_or(source.len(), |end| start + end + 3);
                continue;
            }
            let Some(tag) = OpenTag::parse(source, start) else {
                pos = start + 1;
                continue;
            };

            match tag.name.as_str() {
                "script" | "style" | "textarea" | "title" if !tag.self_closing => {
                    let (content_end, element_end) = find_closing_tag(source, tag.end, &tag.name);
                    #[expect(clippy::cast_possible_truncation)]
                    let content = Span::new(tag.end as u32, content_end as u32);
                    #[expect(clippy::cast_possible_truncation)]
                    let element = Span::new(start as u32, element_end as u32);
                    if tag.name == "script" {
                        let mime = script_mime_type(tag.attr("lang"), tag.attr("type"));
                        parsed.scripts.push(match tag.attr("src") {
                            Some(src) => RawResource::external(mime, element, src),
                            None => RawResource::inline(mime, content),
                        });
                    } else if tag.name == "style" {
                        let mime = style_mime_type(tag.attr("lang"), tag.attr("type"));
                        parsed.stylesheets.push(RawResource::inline(mime, content));
                    }
                    pos = element_end;
                }
                "link" => {
                    let is_stylesheet = tag.attr("rel").is_some_and(|rel| {
                        rel.split_ascii_whitespace()
                            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
                    });
                    if is_stylesheet && let Some(href) = tag.attr("href") {
                        #[expect(clippy::cast_possible_truncation)]
                        let element = Span::new(start as u32, tag.end as u32);
                        parsed.stylesheets.push(RawResource::external(
                            stylesheet_mime_type(href),
                            element,
                            href,
                        ));
                    }
                    pos = tag.end;
                }
                _ => pos = tag.end,
            }
        }

        Ok(parsed)
    }
}

/// An opening tag: lowercased name, attributes, and the offset after `>`.
#[derive(Debug)]
struct OpenTag {
    name: String,
    attrs: Vec<(String, String)>,
    end: usize,
    self_closing: bool,
}

impl OpenTag {
    /// Parse the tag starting at `source[start] == '<'`.
    fn parse(source: &str, start: usize) -> Option<Self> {
        let bytes = source.as_bytes();
        let mut i = start + 1;
        if !bytes.get(i)?.is_ascii_alphabetic() {
            return None;
        }
        let name_start = i;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'-' | b':')) {
            i += 1;
        }
        let name = source[name_start..i].cow_to_ascii_lowercase().into_owned();

        let mut attrs = Vec::new();
        loop {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i)? {
                b'>' => {
                    return Some(Self { name, attrs, end: i + 1, self_closing: false });
                }
                b'/' if bytes.get(i + 1) == Some(&b'>') => {
                    return Some(Self { name, attrs, end: i + 2, self_closing: true });
                }
                b'/' => {
                    i += 1;
                    continue;
                }
                _ => {}
            }

            let attr_start = i;
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && !matches!(bytes[i], b'=' | b'>' | b'/')
            {
                i += 1;
            }
            let attr_name = source[attr_start..i].cow_to_ascii_lowercase().into_owned();
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if bytes.get(i) != Some(&b'=') {
                attrs.push((attr_name, String::new()));
                continue;
            }
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let value = match bytes.get(i)? {
                quote @ (b'"' | b'\'') => {
                    let value_start = i + 1;
                    let len = source[value_start..].find(char::from(*quote))?;
                    i = value_start + len + 1;
                    &source[value_start..value_start + len]
                }
                _ => {
                    let value_start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                    &source[value_start..i]
                }
            };
            attrs.push((attr_name, value.to_string()));
        }
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Find `</name` at or after `from`, ASCII case-insensitively.
///
/// Returns the end of the element's content and the end of the element. An
/// unclosed element runs to the end of the source.
fn find_closing_tag(source: &str, from: usize, name: &str) -> (usize, usize) {
    let bytes = source.as_bytes();
    let mut i = from;
    while let Some(offset) = source.get(i..).and_then(|rest| rest.find("</")) {
        let at = i + offset;
        let name_start = at + 2;
        let name_end = name_start + name.len();
        let matches_name = source
            .get(name_start..name_end)
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name));
        let terminated = bytes
            .get(name_end)
            .is_none_or(|b| b.is_ascii_whitespace() || matches!(b, b'>' | b'/'));
        if matches_name && terminated {
            let close = source[name_end..].find('>').map_or(source.len(), |gt| name_end + gt + 1);
            return (at, close);
        }
        i = at + 2;
    }
    (source.len(), source.len())
}

/// MIME type of a `<script>` from its `lang` and `type` attributes.
pub fn script_mime_type(lang: Option<&str>, type_attr: Option<&str>) -> String {
    if let Some(lang) = lang {
        return match lang.cow_to_ascii_lowercase().as_ref() {
            "ts" | "typescript" => "text/typescript",
            "tsx" => "text/tsx",
            "jsx" => "text/jsx",
            _ => "text/javascript",
        }
        .to_string();
    }
    match type_attr.map(str::trim) {
        None | Some("" | "module" | "text/javascript" | "application/javascript") => {
            "text/javascript".to_string()
        }
        Some(other) => other.cow_to_ascii_lowercase().into_owned(),
    }
}

/// MIME type of a `<style>` from its `lang` and `type` attributes.
pub fn style_mime_type(lang: Option<&str>, type_attr: Option<&str>) -> String {
    match (lang.map(str::trim), type_attr.map(str::trim)) {
        (Some(lang), _) if !lang.is_empty() => {
            format!("text/{}", lang.cow_to_ascii_lowercase())
        }
        (_, Some(type_attr)) if !type_attr.is_empty() => type_attr.cow_to_ascii_lowercase().into_owned(),
        _ => "text/css".to_string(),
    }
}

/// MIME type of a linked stylesheet, from its file extension.
pub fn stylesheet_mime_type(href: &str) -> String {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.cow_to_ascii_lowercase().into_owned())
        .unwrap_or_default();
    match extension.as_str() {
        "scss" | "sass" | "less" => format!("text/{extension}"),
        "styl" | "stylus" => "text/stylus".to_string(),
        _ => "text/css".to_string(),
    }
}
