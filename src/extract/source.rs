//! Source tree extraction.
//!
//! One pass over a parsed component file produces the [`DeclarationSet`]:
//! the `defineMeta(...)` call in the module script, the top-level snippets,
//! and every story element in document order. Identifiers are resolved and
//! checked for collisions as each story is met.

use std::collections::BTreeMap;

use storyweave_core::error::{StoryweaveError, StoryweaveResult};
use storyweave_core::ident::{resolve_identifier, IdentifierRegistry};
use storyweave_core::patch::Span;
use storyweave_core::text::{
    byte_offset_to_position, clean_block_comment, clean_html_comment, clean_line_comments, dedent,
};
use tracing::debug;

use storyweave_cst::tokenizer::CommentKind;
use storyweave_cst::{
    callee_name, parse_expression_at, walk_fragment, AttrValue, AttributeKind, Element, Expr,
    MarkupVisitor, Node, ObjectLit, Pattern, Program, Root, Stmt, VarDeclarator, VisitResult,
};

use super::{BodyKind, DeclarationSet, MetaDeclaration, StoryDeclaration, TemplateDeclaration};
use crate::{ADDON_PACKAGE, DEFINE_META, STORY_EXPORT};

const MODULE_SCRIPT_HINT: &str = "<script module>\n  import { defineMeta } from \"@storyweave/csf\";\n\n  const { Story } = defineMeta({});\n</script>";

const IMPORT_HINT: &str = "import { defineMeta } from \"@storyweave/csf\";";

const DEFINE_META_HINT: &str = "const { Story } = defineMeta({\n  title: \"Components/Button\",\n});";

/// Snippet names that hold a story's body when written inside it.
const BODY_SNIPPETS: &[&str] = &["template", "children"];

/// Build the declaration set of a parsed component file.
///
/// `legacy` records whether the text was produced by the migration pass.
pub fn extract_declarations(
    src: &str,
    root: &Root,
    file: &str,
    legacy: bool,
) -> StoryweaveResult<DeclarationSet> {
    let program = module_program(root, file)?;
    let meta = extract_meta(src, program, file)?;
    let templates = extract_templates(src, &root.fragment);

    let mut collector = StoryCollector::new(src, &meta.story_binding);
    walk_fragment(&mut collector, &root.fragment);

    let mut registry = IdentifierRegistry::new();
    let mut stories = Vec::with_capacity(collector.found.len());
    for (element, comment) in collector.found {
        let story = extract_story(src, file, element, comment, &meta, &templates, &mut registry)?;
        stories.push(story);
    }

    debug!(
        file,
        stories = stories.len(),
        templates = templates.len(),
        "extracted declarations"
    );
    Ok(DeclarationSet {
        meta,
        stories,
        templates,
        is_legacy_dialect: legacy,
    })
}

fn module_program<'r>(root: &'r Root, file: &str) -> StoryweaveResult<&'r Program> {
    let script = root.module_script.as_ref().ok_or_else(|| {
        StoryweaveError::structural_with_hint(
            file,
            "story files need a <script module> block declaring the meta",
            MODULE_SCRIPT_HINT,
        )
    })?;
    script
        .program
        .as_ref()
        .ok_or_else(|| StoryweaveError::internal("module script was not parsed"))
}

// ============================================================================
// Meta
// ============================================================================

/// Local name of `defineMeta` imported from the addon package.
pub(crate) fn define_meta_local(program: &Program) -> Option<&str> {
    program.body.iter().find_map(|stmt| match stmt {
        Stmt::Import(import) if import.source.value == ADDON_PACKAGE => {
            import.local_for(DEFINE_META)
        }
        _ => None,
    })
}

/// The statement and declarator initialized with a call to `local`.
pub(crate) fn find_define_meta<'p>(
    program: &'p Program,
    local: &str,
) -> Option<(&'p Stmt, &'p VarDeclarator)> {
    program.body.iter().find_map(|stmt| {
        let decl = stmt.as_var_decl()?;
        decl.declarators
            .iter()
            .find(|d| {
                d.init
                    .as_ref()
                    .and_then(|init| init.unwrap_parens().as_call())
                    .is_some_and(|call| callee_name(call) == Some(local))
            })
            .map(|d| (stmt, d))
    })
}

/// The object literal passed to a `defineMeta(...)` declarator.
pub(crate) fn define_meta_args(declarator: &VarDeclarator) -> Option<&ObjectLit> {
    declarator
        .init
        .as_ref()?
        .unwrap_parens()
        .as_call()?
        .args
        .first()?
        .expr()?
        .unwrap_parens()
        .as_object()
}

fn extract_meta(src: &str, program: &Program, file: &str) -> StoryweaveResult<MetaDeclaration> {
    let local = define_meta_local(program).ok_or_else(|| {
        StoryweaveError::structural_with_hint(
            file,
            format!("the module script does not import defineMeta from \"{}\"", ADDON_PACKAGE),
            IMPORT_HINT,
        )
    })?;
    let (stmt, declarator) = find_define_meta(program, local).ok_or_else(|| {
        StoryweaveError::structural_with_hint(
            file,
            format!("the module script never calls {}(...)", local),
            DEFINE_META_HINT,
        )
    })?;

    let Pattern::Object(pattern) = &declarator.name else {
        return Err(StoryweaveError::structural_with_hint(
            file,
            format!("the result of {}(...) must be destructured", local),
            DEFINE_META_HINT,
        ));
    };
    let story_binding = pattern.binding_for(STORY_EXPORT).ok_or_else(|| {
        StoryweaveError::structural_with_hint(
            file,
            format!("{}(...) must be destructured to bind the Story component", local),
            DEFINE_META_HINT,
        )
    })?;
    let meta_binding = pattern.binding_for("meta").map(|ident| ident.name.clone());

    let args = define_meta_args(declarator).ok_or_else(|| {
        StoryweaveError::structural_with_hint(
            file,
            format!("{}(...) must be called with an object literal", local),
            DEFINE_META_HINT,
        )
    })?;

    let static_ident = |key: &str| {
        args.get(key)
            .and_then(|value| value.unwrap_parens().as_ident())
            .map(|ident| ident.name.clone())
    };

    Ok(MetaDeclaration {
        span: stmt.span(),
        define_meta_local: local.to_string(),
        story_binding: story_binding.name.clone(),
        meta_binding,
        title: args
            .get("title")
            .and_then(|value| value.unwrap_parens().as_str())
            .map(str::to_string),
        tags: args.get("tags").and_then(static_strings).unwrap_or_default(),
        component_name: static_ident("component"),
        default_template: static_ident("render"),
        attached_comment: doc_comment(src, program, stmt.span().start),
    })
}

/// The comment directly above `offset`, markers stripped.
fn doc_comment(src: &str, program: &Program, offset: usize) -> Option<String> {
    let comments = program.leading_comments(src, offset);
    let first = comments.first()?;
    let text = match first.kind {
        CommentKind::Block => clean_block_comment(first.span.slice(src)),
        CommentKind::Line => clean_line_comments(comments.iter().map(|c| c.span.slice(src))),
    };
    (!text.is_empty()).then_some(text)
}

fn static_strings(expr: &Expr) -> Option<Vec<String>> {
    expr.unwrap_parens().as_array()?.static_strings()
}

// ============================================================================
// Templates
// ============================================================================

fn extract_templates(src: &str, fragment: &[Node]) -> BTreeMap<String, TemplateDeclaration> {
    fragment
        .iter()
        .filter_map(|node| match node {
            Node::Snippet(snippet) => Some(TemplateDeclaration {
                name: snippet.name.clone(),
                span: snippet.span,
                params: snippet.params.map(|p| p.slice(src).trim().to_string()),
                body_source: dedent(snippet.body_span.slice(src)),
            }),
            _ => None,
        })
        .map(|template| (template.name.clone(), template))
        .collect()
}

// ============================================================================
// Stories
// ============================================================================

/// Collects story elements in document order with the HTML comment
/// directly above each. Top-level snippet bodies are not searched.
struct StoryCollector<'a> {
    src: &'a str,
    story_binding: &'a str,
    depth: usize,
    pending_comment: Option<Span>,
    found: Vec<(&'a Element, Option<Span>)>,
}

impl<'a> StoryCollector<'a> {
    fn new(src: &'a str, story_binding: &'a str) -> Self {
        StoryCollector {
            src,
            story_binding,
            depth: 0,
            pending_comment: None,
            found: Vec::new(),
        }
    }
}

impl<'a> MarkupVisitor<'a> for StoryCollector<'a> {
    fn visit_node(&mut self, node: &'a Node) -> VisitResult {
        self.depth += 1;
        match node {
            Node::Comment(span) => self.pending_comment = Some(*span),
            _ if node.is_whitespace(self.src) => {}
            Node::Element(element) if element.name == self.story_binding => {
                let comment = self.pending_comment.take();
                self.found.push((element, comment));
            }
            Node::Snippet(_) if self.depth == 1 => {
                self.pending_comment = None;
                return VisitResult::SkipChildren;
            }
            _ => self.pending_comment = None,
        }
        VisitResult::Continue
    }

    fn leave_node(&mut self, node: &'a Node) {
        self.depth -= 1;
        if !matches!(node, Node::Comment(_)) && !node.is_whitespace(self.src) {
            self.pending_comment = None;
        }
    }
}

/// Static attributes read off one story element.
#[derive(Default)]
struct StoryAttributes {
    name: Option<String>,
    export_name: Option<String>,
    tags: Vec<String>,
    template: Option<String>,
    as_child: bool,
}

fn read_story_attributes(
    src: &str,
    file: &str,
    element: &Element,
) -> StoryweaveResult<StoryAttributes> {
    let mut attrs = StoryAttributes::default();
    for attribute in &element.attributes {
        let (name, value) = match &attribute.kind {
            AttributeKind::Spread { .. } => {
                return Err(StoryweaveError::structural_with_hint(
                    file,
                    format!(
                        "story at {} spreads its attributes; story arguments must be static",
                        position(src, attribute.span.start)
                    ),
                    "<Story name=\"Primary\" args={{ primary: true }} />",
                ));
            }
            AttributeKind::Plain { name, value } => (name.as_str(), value),
            _ => continue,
        };
        match name {
            "name" => attrs.name = Some(static_string(src, file, name, value)?),
            "exportName" => attrs.export_name = Some(static_string(src, file, name, value)?),
            "tags" => {
                let expr = attribute_expression(src, file, name, value)?;
                attrs.tags = static_strings(&expr).ok_or_else(|| {
                    non_static(src, file, name, value, "tags={[\"autodocs\"]}")
                })?;
            }
            "template" => {
                let expr = attribute_expression(src, file, name, value)?;
                let ident = expr
                    .unwrap_parens()
                    .as_ident()
                    .ok_or_else(|| non_static(src, file, name, value, "template={snippetName}"))?;
                attrs.template = Some(ident.name.clone());
            }
            "asChild" => {
                attrs.as_child = match value {
                    AttrValue::True => true,
                    _ => match attribute_expression(src, file, name, value)?.unwrap_parens() {
                        Expr::Bool(b) => b.value,
                        _ => return Err(non_static(src, file, name, value, "asChild")),
                    },
                };
            }
            _ => {}
        }
    }
    Ok(attrs)
}

fn position(src: &str, offset: usize) -> String {
    let (line, col) = byte_offset_to_position(src, offset);
    format!("{}:{}", line, col)
}

fn non_static(src: &str, file: &str, name: &str, value: &AttrValue, hint: &str) -> StoryweaveError {
    let offset = match value {
        AttrValue::Text { span } | AttrValue::Expr { span, .. } | AttrValue::Mixed { span } => {
            span.start
        }
        AttrValue::True => 0,
    };
    StoryweaveError::structural_with_hint(
        file,
        format!(
            "the {} attribute at {} must be a static value",
            name,
            position(src, offset)
        ),
        hint,
    )
}

fn attribute_expression(
    src: &str,
    file: &str,
    name: &str,
    value: &AttrValue,
) -> StoryweaveResult<Expr> {
    match value {
        AttrValue::Expr { expression, .. } => parse_expression_at(src, expression.start)
            .map(|(expr, _)| expr)
            .map_err(|err| err.into_error(file, src)),
        _ => Err(non_static(src, file, name, value, &format!("{}={{...}}", name))),
    }
}

fn static_string(src: &str, file: &str, name: &str, value: &AttrValue) -> StoryweaveResult<String> {
    let hint = format!("{}=\"Primary\"", name);
    match value {
        AttrValue::Text { span } => Ok(span.slice(src).to_string()),
        AttrValue::Expr { .. } => match attribute_expression(src, file, name, value)?.unwrap_parens()
        {
            Expr::Str(s) => Ok(s.value.clone()),
            Expr::Template(span) => {
                let raw = span.slice(src);
                let inner = raw.get(1..raw.len().saturating_sub(1)).unwrap_or_default();
                if inner.contains("${") {
                    Err(non_static(src, file, name, value, &hint))
                } else {
                    Ok(inner.to_string())
                }
            }
            _ => Err(non_static(src, file, name, value, &hint)),
        },
        _ => Err(non_static(src, file, name, value, &hint)),
    }
}

fn extract_story(
    src: &str,
    file: &str,
    element: &Element,
    comment: Option<Span>,
    meta: &MetaDeclaration,
    templates: &BTreeMap<String, TemplateDeclaration>,
    registry: &mut IdentifierRegistry,
) -> StoryweaveResult<StoryDeclaration> {
    let attrs = read_story_attributes(src, file, element)?;
    let at = position(src, element.span.start);
    let label = match attrs.name.as_deref().or(attrs.export_name.as_deref()) {
        Some(name) => format!("Story \"{}\" at {}", name, at),
        None => format!("Story at {}", at),
    };

    let identifier = resolve_identifier(attrs.export_name.as_deref(), attrs.name.as_deref(), &label)
        .map_err(|err| StoryweaveError::identifier(file, err))?;
    registry
        .register(&identifier, &label)
        .map_err(|err| StoryweaveError::identifier(file, err))?;

    let template_body = |name: &str| templates.get(name).map(|t| t.body_source.clone());
    let has_children = element
        .children
        .iter()
        .any(|child| !child.is_whitespace(src) && !matches!(child, Node::Comment(_)));

    let (body_kind, raw_body_source) = if let Some(template) = attrs.template {
        let body = template_body(&template);
        (BodyKind::ExplicitTemplateRef(template), body)
    } else if has_children {
        (BodyKind::InlineChildren, Some(inline_body(src, element)))
    } else if let Some(default) = &meta.default_template {
        (
            BodyKind::ImplicitDefaultTemplate(default.clone()),
            template_body(default),
        )
    } else {
        let forwarded = meta
            .component_name
            .as_ref()
            .map(|component| format!("<{} {{...args}} />", component));
        (BodyKind::None, forwarded)
    };

    Ok(StoryDeclaration {
        span: element.span,
        display_name: attrs.name,
        export_identifier: identifier,
        tags: attrs.tags,
        body_kind,
        attached_comment: comment
            .map(|span| clean_html_comment(span.slice(src)))
            .filter(|text| !text.is_empty()),
        raw_body_source,
        as_child: attrs.as_child,
        label,
    })
}

/// Body of a story written inline: the `template`/`children` snippet's
/// body when there is one, else everything between the tags.
fn inline_body(src: &str, element: &Element) -> String {
    let snippet_body = element.children.iter().find_map(|child| match child {
        Node::Snippet(snippet) if BODY_SNIPPETS.contains(&snippet.name.as_str()) => {
            Some(snippet.body_span)
        }
        _ => None,
    });
    dedent(snippet_body.unwrap_or_else(|| element.inner_span()).slice(src))
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyweave_core::ident::IdentifierError;
    use storyweave_cst::parse_component;

    fn extract(src: &str) -> StoryweaveResult<DeclarationSet> {
        let root = parse_component(src).unwrap();
        extract_declarations(src, &root, "Button.stories.svelte", false)
    }

    const HEADER: &str = r#"<script module>
  import { defineMeta } from "@storyweave/csf";
  import Button from "./Button.svelte";

  const { Story } = defineMeta({ title: "Button", component: Button, tags: ["autodocs"] });
</script>
"#;

    mod meta {
        use super::*;

        #[test]
        fn reads_static_fields() {
            let set = extract(HEADER).unwrap();
            assert_eq!(set.meta.title.as_deref(), Some("Button"));
            assert_eq!(set.meta.tags, vec!["autodocs"]);
            assert_eq!(set.meta.component_name.as_deref(), Some("Button"));
            assert_eq!(set.meta.story_binding, "Story");
            assert_eq!(set.meta.meta_binding, None);
            assert_eq!(set.meta.define_meta_local, "defineMeta");
            assert!(set.stories.is_empty());
        }

        #[test]
        fn doc_comment_is_attached() {
            let src = r#"<script module>
  import { defineMeta as dm } from "@storyweave/csf";

  /**
   * Buttons trigger actions.
   * Use them sparingly.
   */
  const { Story: S, meta } = dm({});
</script>"#;
            let set = extract(src).unwrap();
            assert_eq!(
                set.meta.attached_comment.as_deref(),
                Some("Buttons trigger actions.\nUse them sparingly.")
            );
            assert_eq!(set.meta.story_binding, "S");
            assert_eq!(set.meta.meta_binding.as_deref(), Some("meta"));
            assert_eq!(set.meta.define_meta_local, "dm");
        }

        #[test]
        fn line_comments_are_joined() {
            let src = "<script module>\n  import { defineMeta } from \"@storyweave/csf\";\n  // First.\n  // Second.\n  const { Story } = defineMeta({});\n</script>";
            let set = extract(src).unwrap();
            assert_eq!(set.meta.attached_comment.as_deref(), Some("First.\nSecond."));
        }

        #[test]
        fn missing_module_script() {
            let err = extract("<script>let a = 1;</script>").unwrap_err();
            assert!(matches!(err, StoryweaveError::Structural { hint: Some(_), .. }));
        }

        #[test]
        fn missing_import() {
            let err = extract("<script module>const { Story } = defineMeta({});</script>")
                .unwrap_err();
            assert!(err.to_string().contains("does not import defineMeta"));
        }

        #[test]
        fn missing_story_binding() {
            let src = "<script module>import { defineMeta } from \"@storyweave/csf\"; const { meta } = defineMeta({});</script>";
            let err = extract(src).unwrap_err();
            assert!(err.to_string().contains("bind the Story component"));
        }

        #[test]
        fn dynamic_meta_argument() {
            let src = "<script module>import { defineMeta } from \"@storyweave/csf\"; const { Story } = defineMeta(config);</script>";
            let err = extract(src).unwrap_err();
            assert!(err.to_string().contains("object literal"));
        }
    }

    mod stories {
        use super::*;

        #[test]
        fn body_kinds_follow_precedence() {
            let src = format!(
                "{}{}",
                HEADER,
                r#"
{#snippet sample(args)}
  <Button {...args} label="Sample" />
{/snippet}

<Story name="Ref" template={sample} />
<Story name="Inline">
  <Button label="Inline" />
</Story>
<Story name="Bare" />
"#
            );
            let set = extract(&src).unwrap();
            assert_eq!(set.stories.len(), 3);
            assert_eq!(
                set.stories[0].body_kind,
                BodyKind::ExplicitTemplateRef("sample".to_string())
            );
            assert_eq!(
                set.stories[0].raw_body_source.as_deref(),
                Some("<Button {...args} label=\"Sample\" />")
            );
            assert_eq!(set.stories[1].body_kind, BodyKind::InlineChildren);
            assert_eq!(
                set.stories[1].raw_body_source.as_deref(),
                Some("<Button label=\"Inline\" />")
            );
            assert_eq!(set.stories[2].body_kind, BodyKind::None);
            assert_eq!(
                set.stories[2].raw_body_source.as_deref(),
                Some("<Button {...args} />")
            );
            assert_eq!(set.templates["sample"].params.as_deref(), Some("args"));
        }

        #[test]
        fn ambient_default_template() {
            let src = r#"<script module>
  import { defineMeta } from "@storyweave/csf";
  const { Story } = defineMeta({ render: base });
</script>
{#snippet base(args)}<b>{args.x}</b>{/snippet}
<Story name="A" />
"#;
            let set = extract(src).unwrap();
            assert_eq!(
                set.stories[0].body_kind,
                BodyKind::ImplicitDefaultTemplate("base".to_string())
            );
            assert_eq!(set.stories[0].raw_body_source.as_deref(), Some("<b>{args.x}</b>"));
        }

        #[test]
        fn template_snippet_inside_children() {
            let src = format!(
                "{}{}",
                HEADER,
                "<Story name=\"A\">\n  {#snippet template(args)}\n    <Button {...args} />\n  {/snippet}\n</Story>"
            );
            let set = extract(&src).unwrap();
            assert_eq!(set.stories[0].raw_body_source.as_deref(), Some("<Button {...args} />"));
        }

        #[test]
        fn html_comment_is_attached() {
            let src = format!(
                "{}{}",
                HEADER,
                "<!-- First story. -->\n<Story name=\"A\" />\n<div></div>\n<!-- orphan -->\n<p></p>\n<Story name=\"B\" />"
            );
            let set = extract(&src).unwrap();
            assert_eq!(set.stories[0].attached_comment.as_deref(), Some("First story."));
            assert_eq!(set.stories[1].attached_comment, None);
        }

        #[test]
        fn identifiers_and_display_names() {
            let src = format!(
                "{}{}",
                HEADER,
                r#"<Story name="Primary Button" tags={["a", "b"]} />
<Story exportName="WithIcon" />
<Story name="Shown" exportName="Hidden" asChild />"#
            );
            let set = extract(&src).unwrap();
            assert_eq!(set.export_order(), vec!["PrimaryButton", "WithIcon", "Hidden"]);
            assert_eq!(set.stories[0].tags, vec!["a", "b"]);
            assert_eq!(set.stories[1].index_name(), "With Icon");
            assert_eq!(set.stories[2].index_name(), "Shown");
            assert!(set.stories[2].as_child);
        }

        #[test]
        fn stories_inside_top_level_snippets_are_ignored() {
            let src = format!(
                "{}{}",
                HEADER,
                "{#snippet t()}<Story name=\"Hidden\" />{/snippet}\n<div><Story name=\"Nested\" /></div>"
            );
            let set = extract(&src).unwrap();
            assert_eq!(set.export_order(), vec!["Nested"]);
        }

        #[test]
        fn expression_name_must_be_static() {
            let src = format!("{}<Story name={{label}} />", HEADER);
            let err = extract(&src).unwrap_err();
            assert!(matches!(err, StoryweaveError::Structural { .. }));

            let src = format!("{}<Story name={{\"Quoted\"}} />", HEADER);
            assert_eq!(extract(&src).unwrap().export_order(), vec!["Quoted"]);
        }

        #[test]
        fn spread_attributes_are_rejected() {
            let src = format!("{}<Story {{...props}} />", HEADER);
            let err = extract(&src).unwrap_err();
            assert!(err.to_string().contains("must be static"));
        }

        #[test]
        fn missing_name_and_identifier() {
            let src = format!("{}<Story />", HEADER);
            let err = extract(&src).unwrap_err();
            assert!(matches!(
                err,
                StoryweaveError::Identifier {
                    error: IdentifierError::Missing { .. },
                    ..
                }
            ));
        }

        #[test]
        fn reserved_identifier_is_invalid() {
            let src = format!("{}<Story exportName=\"default\" />", HEADER);
            let err = extract(&src).unwrap_err();
            assert!(matches!(
                err,
                StoryweaveError::Identifier {
                    error: IdentifierError::Invalid { .. },
                    ..
                }
            ));
        }

        #[test]
        fn duplicates_name_both_declarations() {
            let src = format!("{}<Story name=\"Default\" />\n<Story name=\"default\" />", HEADER);
            let err = extract(&src).unwrap_err();
            match err {
                StoryweaveError::Identifier {
                    error: IdentifierError::Duplicate { identifier, first, second },
                    ..
                } => {
                    assert_eq!(identifier, "Default");
                    assert!(first.starts_with("Story \"Default\" at 7:"));
                    assert!(second.starts_with("Story \"default\" at 8:"));
                }
                other => panic!("unexpected error {other}"),
            }
        }
    }
}
