//! Migration of the tag-based legacy dialect.
//!
//! Older story files declare the meta with a `<Meta>` element (or a
//! module-level `export const meta = {...}`), reusable bodies with
//! `<Template>` elements, and use shorthand attributes on stories. This
//! pass rewrites all of that into the unified dialect as text patches
//! against the source, so the rest of the pipeline only ever sees
//! `defineMeta(...)` and snippets. The caller re-parses the result.
//!
//! Every story of a migrated file is tagged [`LEGACY_TAG`].

use storyweave_core::diagnostics::{Diagnostics, Warning, W_LEGACY_ATTRIBUTE_DROPPED};
use storyweave_core::error::{StoryweaveError, StoryweaveResult};
use storyweave_core::ident::is_valid_identifier;
use storyweave_core::patch::{ContentHash, Patch, PatchSet, Span};
use storyweave_core::text::{byte_offset_to_position, clean_html_comment};
use tracing::debug;

use storyweave_cst::{
    parse_expression_at, parse_program, print_expr, quote_string, walk_fragment, AttrValue,
    Attribute, AttributeKind, Element, Expr, ImportDecl, ImportKind, ImportSpecifier,
    MarkupVisitor, Node, ObjectLit, Pattern, Program, Root, Stmt, VisitResult,
};

use crate::extract::source::{define_meta_args, define_meta_local, find_define_meta};
use crate::upsert::{insert_if_absent, upsert_leaf};
use crate::{ADDON_PACKAGE, DEFINE_META, STORY_EXPORT};

/// Tag added to every story of a migrated file.
pub const LEGACY_TAG: &str = "csf-v4";

/// Snippet name given to a `<Template>` without an id.
pub const DEFAULT_TEMPLATE: &str = "sb_default_template";

const LEGACY_EXPORTS: &[&str] = &["Meta", "Story", "Template"];

/// Result of the migration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// The rewritten source, or the input when nothing was legacy.
    pub source: String,
    pub migrated: bool,
}

/// Snippet name for a template id: the id itself when it is a valid
/// identifier, else a name derived from its hash.
pub fn template_name(id: &str) -> String {
    if is_valid_identifier(id) {
        id.to_string()
    } else {
        format!("template_{}", ContentHash::compute(id.as_bytes()).short(10))
    }
}

/// Returns true if the file uses any legacy construct.
pub fn has_legacy_markers(src: &str, root: &Root) -> bool {
    let names = LegacyNames::default();
    let mut collector = LegacyCollector::new(src, &names);
    walk_fragment(&mut collector, &root.fragment);
    if collector
        .found
        .iter()
        .any(|(element, _)| !matches!(element, LegacyElement::Story(_)))
    {
        return true;
    }
    if module_program(root).is_some_and(|program| legacy_meta_export(program).is_some()) {
        return true;
    }
    collector.found.iter().any(|(element, _)| match element {
        LegacyElement::Story(story) => story.attributes.iter().any(is_legacy_story_attribute),
        _ => false,
    })
}

fn is_legacy_story_attribute(attribute: &Attribute) -> bool {
    match &attribute.kind {
        AttributeKind::Plain { name, value } => {
            name == "autodocs"
                || name == "source"
                || (name == "template" && matches!(value, AttrValue::Text { .. }))
        }
        AttributeKind::Directive { prefix, .. } => prefix == "let",
        _ => false,
    }
}

fn module_program(root: &Root) -> Option<&Program> {
    root.module_script.as_ref()?.program.as_ref()
}

/// `export const meta = {...}` in the module script.
fn legacy_meta_export(program: &Program) -> Option<(&Stmt, &Expr)> {
    program.body.iter().find_map(|stmt| {
        let Stmt::ExportDecl(_) = stmt else {
            return None;
        };
        stmt.as_var_decl()?.declarators.iter().find_map(|d| match (&d.name, &d.init) {
            (Pattern::Ident(ident), Some(init))
                if ident.name == "meta" && init.unwrap_parens().as_object().is_some() =>
            {
                Some((stmt, init))
            }
            _ => None,
        })
    })
}

/// Rewrite legacy constructs of `src` into the unified dialect.
///
/// Returns the input unchanged when the file has no legacy markers.
pub fn migrate(
    src: &str,
    root: &Root,
    file: &str,
    diagnostics: &mut dyn Diagnostics,
) -> StoryweaveResult<Migration> {
    if !has_legacy_markers(src, root) {
        return Ok(Migration {
            source: src.to_string(),
            migrated: false,
        });
    }

    let instance_program = match &root.instance_script {
        Some(script) => Some(
            parse_program(src, script.content_span).map_err(|err| err.into_error(file, src))?,
        ),
        None => None,
    };
    let mut programs: Vec<&Program> = Vec::new();
    programs.extend(module_program(root));
    programs.extend(instance_program.as_ref());
    let names = LegacyNames::from_programs(&programs);

    let mut collector = LegacyCollector::new(src, &names);
    walk_fragment(&mut collector, &root.fragment);

    let mut migrator = Migrator {
        src,
        file,
        patches: PatchSet::new(src),
        diagnostics,
        has_default_template: false,
    };

    let mut metas = Vec::new();
    for (element, comment) in &collector.found {
        match element {
            LegacyElement::Template(template) => migrator.template(template),
            LegacyElement::Story(story) => migrator.story(story)?,
            LegacyElement::Meta(meta) => metas.push((*meta, *comment)),
        }
    }
    migrator.meta(root, instance_program.as_ref(), &metas, &names)?;

    let output = migrator.patches.apply()?;
    debug!(file, "migrated legacy story file");
    Ok(Migration {
        source: output.text,
        migrated: true,
    })
}

// ============================================================================
// Collection
// ============================================================================

/// Local names the legacy components are imported under.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LegacyNames {
    meta: String,
    story: String,
    template: String,
}

impl Default for LegacyNames {
    fn default() -> Self {
        LegacyNames {
            meta: "Meta".to_string(),
            story: STORY_EXPORT.to_string(),
            template: "Template".to_string(),
        }
    }
}

impl LegacyNames {
    fn from_programs(programs: &[&Program]) -> Self {
        let mut names = LegacyNames::default();
        for import in programs.iter().flat_map(|p| addon_imports(p)) {
            if let Some(local) = import.local_for("Meta") {
                names.meta = local.to_string();
            }
            if let Some(local) = import.local_for(STORY_EXPORT) {
                names.story = local.to_string();
            }
            if let Some(local) = import.local_for("Template") {
                names.template = local.to_string();
            }
        }
        names
    }
}

fn addon_imports(program: &Program) -> impl Iterator<Item = &ImportDecl> {
    program.body.iter().filter_map(|stmt| match stmt {
        Stmt::Import(import) if import.source.value == ADDON_PACKAGE => Some(import),
        _ => None,
    })
}

/// A legacy element, tagged by what it declares.
#[derive(Debug, Clone, Copy)]
enum LegacyElement<'a> {
    Meta(&'a Element),
    Template(&'a Element),
    Story(&'a Element),
}

/// Collects legacy elements in document order, each with the HTML
/// comment directly above it.
struct LegacyCollector<'a, 'n> {
    src: &'a str,
    names: &'n LegacyNames,
    pending_comment: Option<Span>,
    found: Vec<(LegacyElement<'a>, Option<Span>)>,
}

impl<'a, 'n> LegacyCollector<'a, 'n> {
    fn new(src: &'a str, names: &'n LegacyNames) -> Self {
        LegacyCollector {
            src,
            names,
            pending_comment: None,
            found: Vec::new(),
        }
    }

    fn classify(&self, element: &'a Element) -> Option<LegacyElement<'a>> {
        if element.name == self.names.meta {
            Some(LegacyElement::Meta(element))
        } else if element.name == self.names.template {
            Some(LegacyElement::Template(element))
        } else if element.name == self.names.story {
            Some(LegacyElement::Story(element))
        } else {
            None
        }
    }
}

impl<'a> MarkupVisitor<'a> for LegacyCollector<'a, '_> {
    fn visit_node(&mut self, node: &'a Node) -> VisitResult {
        match node {
            Node::Comment(span) => self.pending_comment = Some(*span),
            _ if node.is_whitespace(self.src) => {}
            Node::Element(element) => {
                let comment = self.pending_comment.take();
                if let Some(legacy) = self.classify(element) {
                    self.found.push((legacy, comment));
                }
            }
            _ => self.pending_comment = None,
        }
        VisitResult::Continue
    }

    fn leave_node(&mut self, node: &'a Node) {
        if !matches!(node, Node::Comment(_)) && !node.is_whitespace(self.src) {
            self.pending_comment = None;
        }
    }
}

// ============================================================================
// Rewriting
// ============================================================================

struct Migrator<'a, 'd> {
    src: &'a str,
    file: &'a str,
    patches: PatchSet<'a>,
    diagnostics: &'d mut dyn Diagnostics,
    has_default_template: bool,
}

/// `let:args` / `let:context` bindings of an element.
#[derive(Debug, Default)]
struct LetBindings {
    args: Option<String>,
    context: Option<String>,
}

impl LetBindings {
    fn is_empty(&self) -> bool {
        self.args.is_none() && self.context.is_none()
    }

    /// Snippet parameter list.
    fn params(&self) -> String {
        match (&self.args, &self.context) {
            (args, Some(context)) => {
                format!("{}, {}", args.as_deref().unwrap_or("_args"), context)
            }
            (Some(args), None) => args.clone(),
            (None, None) => String::new(),
        }
    }
}

impl<'a> Migrator<'a, '_> {
    fn position(&self, offset: usize) -> String {
        let (line, col) = byte_offset_to_position(self.src, offset);
        format!("{}:{}", line, col)
    }

    fn dropped(&mut self, attribute: &Attribute, element: &Element, subject: &str) {
        let name = attribute.span.slice(self.src).to_string();
        let message = format!(
            "dropped legacy attribute `{}` on <{}> at {}",
            name,
            element.name,
            self.position(attribute.span.start)
        );
        self.diagnostics
            .warn(Warning::new(W_LEGACY_ATTRIBUTE_DROPPED, message).about(subject));
    }

    /// The attribute plus the whitespace before it.
    fn removal_span(&self, attribute: &Attribute) -> Span {
        let start = self.src[..attribute.span.start].trim_end().len();
        Span::new(start, attribute.span.end)
    }

    /// Where new attributes go: after the last one, or after the name.
    fn attribute_anchor(&self, element: &Element) -> usize {
        element
            .attributes
            .last()
            .map(|a| a.span.end)
            .unwrap_or(element.open_span.start + 1 + element.name.len())
    }

    fn let_bindings(&self, element: &Element) -> LetBindings {
        let mut bindings = LetBindings::default();
        for attribute in &element.attributes {
            let AttributeKind::Directive {
                prefix,
                local,
                value,
                ..
            } = &attribute.kind
            else {
                continue;
            };
            if prefix != "let" {
                continue;
            }
            let binding = match value {
                AttrValue::Expr { expression, .. } => expression.slice(self.src).trim().to_string(),
                _ => local.clone(),
            };
            match local.as_str() {
                "args" => bindings.args = Some(binding),
                "context" => bindings.context = Some(binding),
                _ => {}
            }
        }
        bindings
    }

    /// Static string value of an attribute, if it has one.
    fn literal_text(&self, value: &AttrValue) -> Option<String> {
        match value {
            AttrValue::Text { span } => Some(span.slice(self.src).to_string()),
            AttrValue::Expr { expression, .. } => {
                match parse_expression_at(self.src, expression.start).ok()?.0.unwrap_parens() {
                    Expr::Str(s) => Some(s.value.clone()),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // <Template>
    // ------------------------------------------------------------------

    fn template(&mut self, element: &Element) {
        let id = element
            .attribute("id")
            .and_then(|a| a.value())
            .and_then(|v| self.literal_text(v));
        let name = match &id {
            Some(id) => template_name(id),
            None => {
                self.has_default_template = true;
                DEFAULT_TEMPLATE.to_string()
            }
        };
        let open = format!("{{#snippet {}({})}}", name, self.let_bindings(element).params());

        for attribute in &element.attributes {
            let keep = matches!(attribute.name(), Some("id"))
                || matches!(&attribute.kind, AttributeKind::Directive { prefix, .. } if prefix == "let");
            if !keep {
                self.dropped(attribute, element, &format!("Template \"{}\"", name));
            }
        }

        match element.close_span {
            Some(close) => {
                self.patches.add(Patch::replace(element.open_span, open));
                self.patches.add(Patch::replace(close, "{/snippet}"));
            }
            None => {
                self.patches
                    .add(Patch::replace(element.span, format!("{}{{/snippet}}", open)));
            }
        }
    }

    // ------------------------------------------------------------------
    // <Story>
    // ------------------------------------------------------------------

    fn story(&mut self, element: &Element) -> StoryweaveResult<()> {
        let label = match element
            .attribute("name")
            .and_then(|a| a.value())
            .and_then(|v| self.literal_text(v))
        {
            Some(name) => format!("Story \"{}\" at {}", name, self.position(element.span.start)),
            None => format!("Story at {}", self.position(element.span.start)),
        };

        let mut tags: Vec<String> = Vec::new();
        let mut tags_attr: Option<&Attribute> = None;
        let mut parameters_attr: Option<(&Attribute, Span)> = None;
        let mut source_code: Option<String> = None;
        let mut autodocs = false;

        for attribute in &element.attributes {
            match &attribute.kind {
                AttributeKind::Plain { name, value } => match (name.as_str(), value) {
                    ("autodocs", _) => {
                        autodocs = true;
                        self.patches.add(Patch::delete(self.removal_span(attribute)));
                    }
                    ("source", AttrValue::True) => {
                        self.patches.add(Patch::delete(self.removal_span(attribute)));
                    }
                    ("source", value) => {
                        match self.literal_text(value) {
                            Some(code) => source_code = Some(code),
                            None => self.dropped(attribute, element, &label),
                        }
                        self.patches.add(Patch::delete(self.removal_span(attribute)));
                    }
                    ("template", AttrValue::Text { span }) => {
                        let name = template_name(span.slice(self.src));
                        self.patches.add(Patch::replace(
                            attribute.span,
                            format!("template={{{}}}", name),
                        ));
                    }
                    ("tags", value) => {
                        tags = self.static_tags(value).ok_or_else(|| {
                            StoryweaveError::structural_with_hint(
                                self.file,
                                format!(
                                    "the tags attribute at {} must be an array of string literals",
                                    self.position(attribute.span.start)
                                ),
                                "tags={[\"autodocs\"]}",
                            )
                        })?;
                        tags_attr = Some(attribute);
                    }
                    ("parameters", AttrValue::Expr { expression, .. }) => {
                        parameters_attr = Some((attribute, *expression));
                    }
                    _ => {}
                },
                AttributeKind::Directive { prefix, .. } if prefix == "let" => {
                    self.patches.add(Patch::delete(self.removal_span(attribute)));
                }
                _ => {}
            }
        }

        if autodocs && !tags.iter().any(|t| t == "autodocs") {
            tags.push("autodocs".to_string());
        }
        if !tags.iter().any(|t| t == LEGACY_TAG) {
            tags.push(LEGACY_TAG.to_string());
        }
        let tags_text = format!(
            "tags={{[{}]}}",
            tags.iter().map(|t| quote_string(t)).collect::<Vec<_>>().join(", ")
        );

        let mut inserted = String::new();
        match tags_attr {
            Some(attribute) => self.patches.add(Patch::replace(attribute.span, tags_text)),
            None => inserted.push_str(&format!(" {}", tags_text)),
        }

        if let Some(code) = source_code {
            let path = ["docs", "source", "code"];
            match parameters_attr {
                Some((attribute, expression)) => {
                    let (expr, _) = parse_expression_at(self.src, expression.start)
                        .map_err(|err| err.into_error(self.file, self.src))?;
                    let Expr::Object(mut parameters) = expr else {
                        return Err(StoryweaveError::structural(
                            self.file,
                            format!(
                                "the parameters attribute at {} must be an object literal to receive the legacy source",
                                self.position(attribute.span.start)
                            ),
                        ));
                    };
                    let written = upsert_leaf(
                        &mut parameters,
                        &path,
                        || Expr::string(code),
                        &label,
                        "source code",
                        &mut *self.diagnostics,
                    )?;
                    if written {
                        let span = parameters.span.unwrap_or(expression);
                        let text = print_expr(&Expr::Object(parameters), self.src);
                        self.patches.add(Patch::replace(span, text));
                    }
                }
                None => {
                    let mut parameters = ObjectLit::new();
                    upsert_leaf(
                        &mut parameters,
                        &path,
                        || Expr::string(code),
                        &label,
                        "source code",
                        &mut *self.diagnostics,
                    )?;
                    let text = print_expr(&Expr::Object(parameters), self.src);
                    inserted.push_str(&format!(" parameters={{{}}}", text));
                }
            }
        }

        if !inserted.is_empty() {
            self.patches
                .add(Patch::insert(self.attribute_anchor(element), inserted));
        }

        let bindings = self.let_bindings(element);
        if !bindings.is_empty() && element.close_span.is_some() {
            let inner = element.inner_span();
            self.patches.add(Patch::insert(
                inner.start,
                format!("{{#snippet template({})}}", bindings.params()),
            ));
            self.patches.add(Patch::insert(inner.end, "{/snippet}"));
        }
        Ok(())
    }

    fn static_tags(&self, value: &AttrValue) -> Option<Vec<String>> {
        let AttrValue::Expr { expression, .. } = value else {
            return None;
        };
        let (expr, _) = parse_expression_at(self.src, expression.start).ok()?;
        expr.unwrap_parens().as_array()?.static_strings()
    }

    // ------------------------------------------------------------------
    // Meta
    // ------------------------------------------------------------------

    fn meta(
        &mut self,
        root: &Root,
        instance_program: Option<&Program>,
        metas: &[(&Element, Option<Span>)],
        names: &LegacyNames,
    ) -> StoryweaveResult<()> {
        let module = module_program(root);
        let exported = module.and_then(legacy_meta_export);

        if metas.len() > 1 || (!metas.is_empty() && exported.is_some()) {
            let offset = metas.get(1).or(metas.first()).map_or(0, |(m, _)| m.span.start);
            return Err(StoryweaveError::structural(
                self.file,
                format!("a second meta declaration at {}", self.position(offset)),
            ));
        }

        // The script that will hold defineMeta: the module script, or the
        // instance script promoted to one.
        let (target, target_program) = match (&root.module_script, module) {
            (Some(script), Some(program)) => (Some(script), Some(program)),
            _ => match &root.instance_script {
                Some(script) if !metas.is_empty() || exported.is_some() => {
                    self.patches
                        .add(Patch::insert(script.open_span.start + "<script".len(), " module"));
                    (Some(script), instance_program)
                }
                _ => (None, None),
            },
        };

        let pattern = if names.story == STORY_EXPORT {
            STORY_EXPORT.to_string()
        } else {
            format!("{}: {}", STORY_EXPORT, names.story)
        };

        let has_define_meta = self.rewrite_imports(target_program, instance_program, module);
        let needs_import = (!metas.is_empty() || exported.is_some()) && !has_define_meta;
        let import_text = format!(
            "import {{ {} }} from {};",
            DEFINE_META,
            quote_string(ADDON_PACKAGE)
        );

        // Queued before the declaration: both land on the same offset when
        // the script is empty.
        if needs_import {
            if let Some(script) = target {
                self.patches.add(Patch::insert(
                    script.content_span.start,
                    format!("\n  {}", import_text),
                ));
            }
        }

        if let Some((stmt, init)) = exported {
            let init_span = init
                .span()
                .ok_or_else(|| StoryweaveError::internal("parsed meta export has no span"))?;
            self.patches.add(Patch::replace(
                Span::new(stmt.span().start, init_span.start),
                format!("const {{ {} }} = {}(", pattern, DEFINE_META),
            ));
            if self.has_default_template {
                if let Some(object) = init.unwrap_parens().as_object() {
                    self.add_render(object);
                }
            }
            self.patches.add(Patch::replace(
                Span::new(init_span.end, stmt.span().end),
                ");",
            ));
        } else if let Some((element, comment)) = metas.first() {
            let declaration = self.meta_declaration(element, *comment, &pattern);
            let end = element.span.end;
            let removal = Span::new(
                comment.map_or(element.span.start, |c| c.start),
                end + (self.src[end..].len() - self.src[end..].trim_start().len()),
            );
            self.patches.add(Patch::delete(removal));
            match target {
                Some(script) => {
                    let content = script.content_span.slice(self.src);
                    let at = script.content_span.start + content.trim_end().len();
                    self.patches.add(Patch::insert(at, format!("\n\n{}", declaration)));
                }
                None => {
                    self.patches.add(Patch::insert(
                        0,
                        format!("<script module>\n  {}\n\n{}\n</script>\n\n", import_text, declaration),
                    ));
                }
            }
        } else if self.has_default_template {
            if let Some(object) = module
                .and_then(|program| {
                    let local = define_meta_local(program)?;
                    find_define_meta(program, local)
                })
                .and_then(|(_, declarator)| define_meta_args(declarator))
            {
                self.add_render(object);
            }
        }

        Ok(())
    }

    /// `render: sb_default_template` on a parsed meta object.
    fn add_render(&mut self, object: &ObjectLit) {
        let mut object = object.clone();
        if insert_if_absent(&mut object, "render", || Expr::ident(DEFAULT_TEMPLATE)) {
            if let Some(span) = object.span {
                let text = print_expr(&Expr::Object(object), self.src);
                self.patches.add(Patch::replace(span, text));
            }
        }
    }

    /// `const { Story } = defineMeta({...});` built from `<Meta>` attributes.
    fn meta_declaration(&mut self, element: &Element, comment: Option<Span>, pattern: &str) -> String {
        let mut props: Vec<String> = Vec::new();
        let mut has_render = false;
        for attribute in &element.attributes {
            let prop = match &attribute.kind {
                AttributeKind::Plain { name, value } => {
                    has_render |= name == "render";
                    let key = if is_valid_identifier(name) {
                        name.clone()
                    } else {
                        quote_string(name)
                    };
                    match value {
                        AttrValue::True => Some(format!("{}: true", key)),
                        AttrValue::Text { span } => {
                            Some(format!("{}: {}", key, quote_string(span.slice(self.src))))
                        }
                        AttrValue::Expr { expression, .. } => {
                            Some(format!("{}: {}", key, expression.slice(self.src).trim()))
                        }
                        AttrValue::Mixed { .. } => None,
                    }
                }
                AttributeKind::Shorthand { name, .. } => Some(name.clone()),
                AttributeKind::Spread { expression } => {
                    Some(format!("...{}", expression.slice(self.src).trim().trim_start_matches("...")))
                }
                AttributeKind::Directive { .. } => None,
            };
            match prop {
                Some(prop) => props.push(prop),
                None => self.dropped(attribute, element, "meta"),
            }
        }
        if self.has_default_template && !has_render {
            props.push(format!("render: {}", DEFAULT_TEMPLATE));
        }

        let object = if props.is_empty() {
            "{}".to_string()
        } else {
            format!("{{ {} }}", props.join(", "))
        };
        let doc = comment
            .map(|span| clean_html_comment(span.slice(self.src)))
            .filter(|text| !text.is_empty())
            .map(|text| {
                let body: Vec<String> = text
                    .lines()
                    .map(|line| if line.is_empty() { "   *".to_string() } else { format!("   * {}", line) })
                    .collect();
                format!("  /**\n{}\n   */\n", body.join("\n"))
            })
            .unwrap_or_default();
        format!("{}  const {{ {} }} = {}({});", doc, pattern, DEFINE_META, object)
    }

    /// Remove `Meta`/`Story`/`Template` imports from the addon package.
    ///
    /// In the script that will hold the meta declaration, a rewritten
    /// import also takes `defineMeta`. Returns true when that script
    /// imports `defineMeta` afterwards.
    fn rewrite_imports(
        &mut self,
        target: Option<&Program>,
        instance: Option<&Program>,
        module: Option<&Program>,
    ) -> bool {
        let mut has_define_meta = target.is_some_and(|p| define_meta_local(p).is_some());
        let mut programs: Vec<&Program> = Vec::new();
        programs.extend(module);
        programs.extend(instance);

        for program in programs {
            let is_target = target.is_some_and(|t| std::ptr::eq(t, program));
            for import in addon_imports(program) {
                let kept: Vec<&ImportSpecifier> = import
                    .specifiers
                    .iter()
                    .filter(|s| {
                        !(s.kind == ImportKind::Named
                            && s.imported
                                .as_deref()
                                .is_some_and(|name| LEGACY_EXPORTS.contains(&name)))
                    })
                    .collect();
                if kept.len() == import.specifiers.len() {
                    continue;
                }
                let add_define_meta = is_target && !has_define_meta;
                if kept.is_empty() && !add_define_meta {
                    let start = self.src[..import.span.start].trim_end_matches([' ', '\t']).len();
                    self.patches
                        .add(Patch::delete(Span::new(start, line_end(self.src, import.span.end))));
                } else {
                    self.patches.add(Patch::replace(
                        import.span,
                        render_import(&kept, add_define_meta, &import.source.value),
                    ));
                    has_define_meta |= add_define_meta;
                }
            }
        }
        has_define_meta
    }
}

/// `offset`, moved past a directly following line break.
fn line_end(src: &str, offset: usize) -> usize {
    let rest = &src[offset..];
    if rest.starts_with("\r\n") {
        offset + 2
    } else if rest.starts_with('\n') {
        offset + 1
    } else {
        offset
    }
}

fn render_import(specifiers: &[&ImportSpecifier], define_meta: bool, source: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut named: Vec<String> = Vec::new();
    for specifier in specifiers {
        let local = &specifier.local.name;
        match specifier.kind {
            ImportKind::Default => parts.insert(0, local.clone()),
            ImportKind::Namespace => parts.push(format!("* as {}", local)),
            ImportKind::Named => match specifier.imported.as_deref() {
                Some(imported) if imported != local => {
                    named.push(format!("{} as {}", imported, local))
                }
                _ => named.push(local.clone()),
            },
        }
    }
    if define_meta {
        named.push(DEFINE_META.to_string());
    }
    if !named.is_empty() {
        parts.push(format!("{{ {} }}", named.join(", ")));
    }
    format!("import {} from {};", parts.join(", "), quote_string(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyweave_core::diagnostics::CollectedDiagnostics;
    use storyweave_cst::parse_component;

    fn run(src: &str) -> (Migration, CollectedDiagnostics) {
        let root = parse_component(src).unwrap();
        let mut sink = CollectedDiagnostics::new();
        let migration = migrate(src, &root, "Legacy.stories.svelte", &mut sink).unwrap();
        (migration, sink)
    }

    mod detection {
        use super::*;

        #[test]
        fn unified_files_are_untouched() {
            let src = "<script module>\n  import { defineMeta } from \"@storyweave/csf\";\n  const { Story } = defineMeta({});\n</script>\n<Story name=\"A\" />\n";
            let (migration, _) = run(src);
            assert!(!migration.migrated);
            assert_eq!(migration.source, src);
        }

        #[test]
        fn markers() {
            for src in [
                "<Meta title=\"A\" />",
                "<Template>x</Template>",
                "<Story name=\"A\" autodocs />",
                "<Story name=\"A\" source />",
                "<Story name=\"A\" let:args>{args.x}</Story>",
                "<Story name=\"A\" template=\"t\" />",
                "<script module>export const meta = { title: \"A\" };</script>",
            ] {
                let root = parse_component(src).unwrap();
                assert!(has_legacy_markers(src, &root), "{}", src);
            }
            let src = "<Story name=\"A\" template={t} />";
            let root = parse_component(src).unwrap();
            assert!(!has_legacy_markers(src, &root));
        }

        #[test]
        fn template_names() {
            assert_eq!(template_name("sample"), "sample");
            let hashed = template_name("my template");
            assert!(hashed.starts_with("template_"));
            assert_eq!(hashed.len(), "template_".len() + 10);
            assert_eq!(hashed, template_name("my template"));
        }
    }

    mod rewriting {
        use super::*;

        #[test]
        fn meta_element_becomes_define_meta() {
            let src = r#"<script>
  import { Meta, Story, Template } from "@storyweave/csf";
  import Button from "./Button.svelte";
</script>

<!-- Buttons for actions. -->
<Meta title="Button" component={Button} />

<Template let:args>
  <Button {...args} />
</Template>

<Story name="Primary" autodocs />
"#;
            let (migration, sink) = run(src);
            assert!(sink.is_empty());
            let expected = r#"<script module>
  import { defineMeta } from "@storyweave/csf";
  import Button from "./Button.svelte";

  /**
   * Buttons for actions.
   */
  const { Story } = defineMeta({ title: "Button", component: Button, render: sb_default_template });
</script>

{#snippet sb_default_template(args)}
  <Button {...args} />
{/snippet}

<Story name="Primary" tags={["autodocs", "csf-v4"]} />
"#;
            assert_eq!(migration.source, expected);
        }

        #[test]
        fn exported_meta_object() {
            let src = r#"<script module>
  import { Story } from "@storyweave/csf";

  export const meta = { title: "A" };
</script>

<Story name="One" />
"#;
            let (migration, _) = run(src);
            let expected = r#"<script module>
  import { defineMeta } from "@storyweave/csf";

  const { Story } = defineMeta({ title: "A" });
</script>

<Story name="One" tags={["csf-v4"]} />
"#;
            assert_eq!(migration.source, expected);
        }

        #[test]
        fn story_shorthands() {
            let src = r#"<script module>
  import { defineMeta } from "@storyweave/csf";
  const { Story } = defineMeta({});
</script>
<Template id="sample">x</Template>
<Story name="A" template="sample" source="<A />" tags={["x"]} />
<Story name="B" parameters={{ layout: "full" }} source="<B />" let:args let:context>
  {args.label}
</Story>
"#;
            let (migration, _) = run(src);
            let expected = r#"<script module>
  import { defineMeta } from "@storyweave/csf";
  const { Story } = defineMeta({});
</script>
{#snippet sample()}x{/snippet}
<Story name="A" template={sample} tags={["x", "csf-v4"]} parameters={{ docs: { source: { code: "<A />" } } }} />
<Story name="B" parameters={{ layout: "full", docs: { source: { code: "<B />" } } }} tags={["csf-v4"]}>{#snippet template(args, context)}
  {args.label}
{/snippet}</Story>
"#;
            assert_eq!(migration.source, expected);
        }

        #[test]
        fn hashed_template_reference() {
            let src = "<script module>\n  import { defineMeta } from \"@storyweave/csf\";\n  const { Story } = defineMeta({});\n</script>\n<Template id=\"with space\">x</Template>\n<Story name=\"A\" template=\"with space\" />\n";
            let (migration, _) = run(src);
            let name = template_name("with space");
            assert!(migration.source.contains(&format!("{{#snippet {}()}}x{{/snippet}}", name)));
            assert!(migration.source.contains(&format!("template={{{}}}", name)));
        }

        #[test]
        fn default_template_sets_render_on_existing_meta() {
            let src = "<script module>\n  import { defineMeta } from \"@storyweave/csf\";\n  const { Story } = defineMeta({ title: \"A\" });\n</script>\n<Template>x</Template>\n";
            let (migration, _) = run(src);
            assert!(migration
                .source
                .contains("defineMeta({ title: \"A\", render: sb_default_template })"));
        }

        #[test]
        fn script_created_when_absent() {
            let src = "<Meta title=\"A\" />\n<Story name=\"B\" />\n";
            let (migration, _) = run(src);
            assert!(migration.source.starts_with(
                "<script module>\n  import { defineMeta } from \"@storyweave/csf\";\n\n  const { Story } = defineMeta({ title: \"A\" });\n</script>\n\n"
            ));
            assert!(migration.source.ends_with("<Story name=\"B\" tags={[\"csf-v4\"]} />\n"));
            let root = parse_component(&migration.source).unwrap();
            let script = root.module_script.as_ref().unwrap();
            assert!(script.content_span.slice(&migration.source).contains("defineMeta"));
        }

        #[test]
        fn empty_module_script_gets_import_first() {
            let src = "<script module></script>\n<Meta title=\"A\" />\n";
            let (migration, _) = run(src);
            assert!(migration.source.starts_with(
                "<script module>\n  import { defineMeta } from \"@storyweave/csf\";\n\n  const { Story } = defineMeta({ title: \"A\" });"
            ));
            assert_eq!(migration.source.matches("<script").count(), 1);
            let root = parse_component(&migration.source).unwrap();
            assert!(root.module_script.is_some());
        }

        #[test]
        fn dynamic_source_is_dropped_with_warning() {
            let src = "<Story name=\"A\" source={code} />";
            let (migration, sink) = run(src);
            assert!(sink.has_code(W_LEGACY_ATTRIBUTE_DROPPED));
            assert_eq!(migration.source, "<Story name=\"A\" tags={[\"csf-v4\"]} />");
        }

        #[test]
        fn two_metas_are_rejected() {
            let src = "<Meta title=\"A\" />\n<Meta title=\"B\" />";
            let root = parse_component(src).unwrap();
            let mut sink = CollectedDiagnostics::new();
            let err = migrate(src, &root, "a.svelte", &mut sink).unwrap_err();
            assert!(err.to_string().contains("second meta declaration at 2:1"));
        }
    }
}
