// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use std::path::PathBuf;

use storyweave_cst::{
    parse_component, parse_module, print_expr, walk_fragment, CallSiteCollector,
    ExportDefaultKind, MarkupVisitor, Node, ParseError, Stmt, VisitResult,
};

fn fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    std::fs::read_to_string(&path).expect("reading fixture")
}

fn describe(err: ParseError, src: &str) -> String {
    err.into_error("fixture", src).to_string()
}

#[derive(Default)]
struct StoryNames<'a> {
    src: &'a str,
    names: Vec<String>,
    comments: usize,
}

impl<'a> MarkupVisitor<'a> for StoryNames<'a> {
    fn visit_node(&mut self, node: &'a Node) -> VisitResult {
        match node {
            Node::Element(element) if element.name == "Story" => {
                let name = element
                    .attribute("name")
                    .and_then(|a| a.value())
                    .map(|v| match v {
                        storyweave_cst::AttrValue::Text { span } => span.slice(self.src).to_string(),
                        _ => String::new(),
                    })
                    .unwrap_or_default();
                self.names.push(name);
            }
            Node::Comment(_) => self.comments += 1,
            _ => {}
        }
        VisitResult::Continue
    }
}

#[test]
fn component_fixture() {
    let src = fixture("button.stories.svelte");
    let root = parse_component(&src).unwrap_or_else(|e| panic!("{}", describe(e, &src)));

    let program = root.module_script.as_ref().unwrap().program.as_ref().unwrap();
    assert_eq!(program.body.len(), 3);
    let decl_start = program.body[2].span().start;
    let comments = program.leading_comments(&src, decl_start);
    assert_eq!(comments.len(), 1);
    assert!(comments[0].span.slice(&src).contains("primary actions"));

    let mut visitor = StoryNames {
        src: &src,
        ..Default::default()
    };
    walk_fragment(&mut visitor, &root.fragment);
    assert_eq!(visitor.names, vec!["Primary", "Secondary"]);
    assert_eq!(visitor.comments, 1);
}

#[test]
fn lowered_fixture() {
    let src = fixture("button.lowered.js");
    let program = parse_module(&src).unwrap_or_else(|e| panic!("{}", describe(e, &src)));

    let entry = program
        .body
        .iter()
        .find_map(|stmt| match stmt {
            Stmt::ExportDefault(export) => match &export.kind {
                ExportDefaultKind::Function(function) => Some(function),
                _ => None,
            },
            _ => None,
        })
        .expect("default export");
    assert_eq!(entry.name.as_ref().unwrap().name, "Button_stories");

    let calls = CallSiteCollector::collect_in_function_except(entry, "Story", &[]);
    assert_eq!(calls.len(), 2);
    for call in calls {
        let props = call.args[1].expr().unwrap();
        let span = props.span().unwrap();
        assert_eq!(print_expr(props, &src), span.slice(&src));
    }
}

#[test]
fn syntax_errors_carry_positions() {
    let src = "<div>\n  <span>\n</div>";
    let err = parse_component(src).unwrap_err();
    let message = err.into_error("broken.svelte", src).to_string();
    assert!(message.contains("broken.svelte at 3:"), "{}", message);
}
