//! End-to-end build session tests: transform documents, then assemble and
//! emit their CSS bundles against a module graph.

use std::fs;
use std::path::PathBuf;

use oxc_sourcemap::SourceMap;
use sfc_assets::{
    BuildSession, EmittedAsset, GraphCapability, HtmlTemplateParser, ModuleGraph,
    ModuleGraphEntry, SessionOptions, SourcemapOption, scope_token,
};

fn session(sourcemap: SourcemapOption) -> BuildSession {
    BuildSession::new(
        SessionOptions::new()
            .with_sourcemap(sourcemap)
            .with_scope_hash(|_| "s0".to_string()),
    )
}

fn transform(session: &BuildSession, id: &str, source: &str) {
    session.transform(id, source, &HtmlTemplateParser).unwrap();
}

/// `(id, is_entry, space-separated imports)`
fn graph(modules: &[(&str, bool, &str)]) -> ModuleGraph {
    modules
        .iter()
        .map(|(id, is_entry, imports)| {
            let entry = ModuleGraphEntry::new(*id).with_imports(imports.split_whitespace());
            if *is_entry { entry.entry() } else { entry }
        })
        .collect()
}

fn lookup(map: &SourceMap, line: u32, col: u32) -> (String, u32) {
    let table = map.generate_lookup_table();
    let token = map.lookup_token(&table, line, col).unwrap();
    let source = map.get_source(token.get_source_id().unwrap()).unwrap();
    (source.to_string(), token.get_src_line())
}

/// A fresh directory under the system temp dir.
fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sfc_assets_{name}_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn external_stylesheet_is_scoped_and_mapped_to_its_file() {
    let dir = fixture_dir("external");
    fs::write(dir.join("comp.css"), ".btn { color: red; }").unwrap();
    let id = dir.join("comp.html").to_string_lossy().into_owned();

    let session = BuildSession::new(
        SessionOptions::new()
            .with_sourcemap(SourcemapOption::External)
            .with_scope_hash(|_| "e1a2b3".to_string()),
    );
    transform(&session, &id, r#"<link rel="stylesheet" href="./comp.css"><button class="btn">Go</button>"#);

    let output = session.render(&graph(&[(id.as_str(), true, "")]));
    assert!(output.warnings.is_empty());
    assert_eq!(output.bundles.len(), 1);
    let bundle = &output.bundles[0];
    assert_eq!(bundle.file_name, "comp.css");
    assert_eq!(bundle.code, ".btn.e1a2b3 { color: red; }");

    let map = bundle.map.as_ref().unwrap();
    let (source, line) = lookup(map, 0, 0);
    assert!(source.ends_with("comp.css"), "{source}");
    assert_eq!(line, 0);
    // The selector's tail, past the inserted token, still maps to the file.
    let (source, _) = lookup(map, 0, 12);
    assert!(source.ends_with("comp.css"));

    let mut assets: Vec<EmittedAsset> = Vec::new();
    session.emit(&graph(&[(id.as_str(), true, "")]), &mut assets);
    assert_eq!(assets.len(), 2);
    assert_eq!(
        assets[0].source,
        ".btn.e1a2b3 { color: red; }\n/*# sourceMappingURL=comp.css.map */"
    );
    assert_eq!(assets[1].file_name, "comp.css.map");
    let json: serde_json::Value = serde_json::from_str(&assets[1].source).unwrap();
    assert_eq!(json["version"], 3);
    assert_eq!(json["file"], "comp.css");
    assert_eq!(json["sourcesContent"][0], ".btn { color: red; }");

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn dependency_css_precedes_dependent() {
    let session = session(SourcemapOption::None);
    transform(&session, "/src/a.html", "<style>.a { color: red; }</style>");
    transform(&session, "/src/b.html", "<style>.b { color: blue; }</style>");

    let output = session.render(&graph(&[
        ("/src/a.html", true, "/src/b.html"),
        ("/src/b.html", false, ""),
    ]));
    assert_eq!(output.bundles.len(), 1);
    assert_eq!(output.bundles[0].file_name, "a.css");
    assert_eq!(output.bundles[0].code, ".b.s0 { color: blue; }\n.a.s0 { color: red; }");
}

#[test]
fn cyclic_imports_include_each_module_once() {
    let session = session(SourcemapOption::None);
    transform(&session, "/a.html", "<style>.a{}</style>");
    transform(&session, "/b.html", "<style>.b{}</style>");

    let output = session.render(&graph(&[("/a.html", true, "/b.html"), ("/b.html", false, "/a.html")]));
    assert_eq!(output.bundles[0].code, ".b.s0{}\n.a.s0{}");
}

#[test]
fn documents_without_styles_contribute_nothing() {
    let session = session(SourcemapOption::None);
    transform(&session, "/a.html", "<style>.a{}</style>");
    transform(&session, "/plain.html", "<p>no styles</p>");

    assert!(session.styles().contains("/plain.html"));
    assert!(session.styles().fragments("/plain.html").is_empty());

    let output = session.render(&graph(&[("/a.html", true, "/plain.html"), ("/plain.html", true, "")]));
    // `/plain.html` is an entry too, but has nothing to emit.
    assert_eq!(output.bundles.len(), 1);
    assert_eq!(output.bundles[0].code, ".a.s0{}");
}

#[test]
fn inline_scripts_load_their_original_content() {
    let session = session(SourcemapOption::None);
    let source = "<script>\nexport const a = 1;\n</script><script type=\"module\">console.log(a)</script>";
    let result = session.transform("/src/page.html", source, &HtmlTemplateParser).unwrap();

    assert_eq!(result.scripts, ["/src/page_0.js", "/src/page_1.js"]);
    assert_eq!(session.load("/src/page_0.js").as_deref(), Some("\nexport const a = 1;\n"));
    assert_eq!(session.load("/src/page_1.js").as_deref(), Some("console.log(a)"));
    for path in &result.scripts {
        assert!(result.code.contains(&format!("export * from \"{path}\";")));
        assert_eq!(session.resolve_id(path).as_deref(), Some(path.as_str()));
    }
    assert_eq!(session.load("/src/page.html"), None);
}

#[test]
fn scoped_tokens_map_back_to_their_original_line() {
    let session = session(SourcemapOption::External);
    let style = "\n.a { color: red; }\n\n.b,\n.c { color: blue; }\n";
    transform(&session, "/src/lines.html", &format!("<style>{style}</style>"));

    let output = session.render(&graph(&[("/src/lines.html", true, "")]));
    let bundle = &output.bundles[0];
    assert_eq!(bundle.code, "\n.a.s0 { color: red; }\n\n.b.s0,\n.c.s0 { color: blue; }\n");

    let map = bundle.map.as_ref().unwrap();
    for line in [1, 3, 4] {
        let (source, src_line) = lookup(map, line, 0);
        assert_eq!(source, "/src/lines.html?style&index=0");
        assert_eq!(src_line, line);
    }
}

#[test]
fn reassembly_is_idempotent() {
    let session = session(SourcemapOption::Both);
    transform(&session, "/a.html", "<style>.a{}</style><style>.a2{}</style>");
    transform(&session, "/b.html", "<style>.b{}</style>");
    let graph = graph(&[("/a.html", true, "/b.html"), ("/b.html", false, "")]);

    let mut first: Vec<EmittedAsset> = Vec::new();
    let mut second: Vec<EmittedAsset> = Vec::new();
    session.emit(&graph, &mut first);
    session.emit(&graph, &mut second);
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert!(first[0].source.contains("/*# sourceMappingURL=data:application/json;"));
}

#[test]
fn unknown_imports_warn_and_are_skipped() {
    let session = session(SourcemapOption::None);
    transform(&session, "/a.html", "<style>.a{}</style>");

    let output = session.render(&graph(&[("/a.html", true, "/gone.html")]));
    assert_eq!(output.bundles[0].code, ".a.s0{}");
    assert_eq!(output.warnings.len(), 1);
    assert_eq!(output.warnings[0].module, "/gone.html");
    assert_eq!(output.warnings[0].importer.as_deref(), Some("/a.html"));
}

#[test]
fn name_sort_fallback_emits_one_bundle() {
    let session = BuildSession::new(
        SessionOptions::new()
            .with_scoped(false)
            .with_graph_capability(GraphCapability::NameSort),
    );
    transform(&session, "/z.html", "<style>.z{}</style>");
    transform(&session, "/m.html", "<style>.m{}</style>");

    let output = session.render(&graph(&[("/z.html", true, ""), ("/m.html", true, "")]));
    assert_eq!(output.bundles.len(), 1);
    assert_eq!(output.bundles[0].code, ".m{}\n.z{}");
}

#[test]
fn single_bundle_merges_entries() {
    let session = BuildSession::new(
        SessionOptions::new()
            .with_scoped(false)
            .with_entries(["/a.html", "/b.html"])
            .with_single_bundle("app.css"),
    );
    transform(&session, "/shared.html", "<style>.s{}</style>");
    transform(&session, "/a.html", "<style>.a{}</style>");
    transform(&session, "/b.html", "<style>.b{}</style>");

    let output = session.render(&graph(&[
        ("/a.html", false, "/shared.html"),
        ("/b.html", false, "/shared.html"),
        ("/shared.html", false, ""),
    ]));
    assert_eq!(output.bundles.len(), 1);
    assert_eq!(output.bundles[0].file_name, "app.css");
    assert_eq!(output.bundles[0].code, ".s{}\n.a{}\n.b{}");
}

#[test]
fn scope_tokens_are_stable_and_distinct() {
    assert_eq!(scope_token("/src/a.html"), scope_token("/src/a.html"));
    assert_ne!(scope_token("/src/a.html"), scope_token("/src/b.html"));

    let session = BuildSession::default();
    let result = session
        .transform("/src/a.html", "<style>.x{}</style>", &HtmlTemplateParser)
        .unwrap();
    assert_eq!(result.scope, scope_token("/src/a.html"));
}
