//! Template transform snapshot tests.
//!
//! Uses `insta::glob!` to discover `.html` fixture files and compare the
//! generated module, virtual modules and CSS bundle against co-located
//! `.snap` snapshot files.

use std::fmt::Write as _;
use std::fs;

use sfc_assets::{
    BuildSession, EmittedAsset, HtmlTemplateParser, ModuleGraph, ModuleGraphEntry, SessionOptions,
};

fn section(out: &mut String, title: &str, body: &str) {
    writeln!(out, "--- {title} ---").unwrap();
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
}

fn compile_template(id: &str, source: &str) -> String {
    let session = BuildSession::new(SessionOptions::new().with_scope_hash(|_| "s0".to_string()));
    let result = match session.transform(id, source, &HtmlTemplateParser) {
        Ok(result) => result,
        Err(error) => return format!("Transform error:\n{error}"),
    };

    let mut out = String::new();
    section(&mut out, "module", &result.code);
    for path in &result.scripts {
        let content = session.load(path).unwrap();
        section(&mut out, path, &content);
    }

    let graph: ModuleGraph = [ModuleGraphEntry::new(id).entry()].into_iter().collect();
    let mut assets: Vec<EmittedAsset> = Vec::new();
    let warnings = session.emit(&graph, &mut assets);
    assert!(warnings.is_empty());
    for asset in &assets {
        section(&mut out, &asset.file_name, &asset.source);
    }
    out
}

#[test]
fn snapshots() {
    insta::glob!("fixtures/*.html", |path| {
        let source_text = fs::read_to_string(path).unwrap();
        let name = path.file_stem().unwrap().to_str().unwrap();
        let output = compile_template(&format!("/src/{name}.html"), &source_text);

        insta::with_settings!({
            snapshot_path => path.parent().unwrap(),
            prepend_module_to_snapshot => false,
            snapshot_suffix => "",
            omit_expression => true,
        }, {
            insta::assert_snapshot!(name, output);
        });
    });
}
