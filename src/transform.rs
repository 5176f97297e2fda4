//! Correlation and orchestration.
//!
//! [`prepare_source`] migrates and parses the authored file, the oracle
//! lowers it, and [`weave`] does the rest synchronously: extract both
//! trees, zip stories with call sites by position, queue patches in
//! reverse declaration order, append the synthesized exports and flush
//! everything against the lowered text in one pass.

use tracing::debug;

use storyweave_core::diagnostics::{Diagnostics, Warning, W_RAW_CODE_UNAVAILABLE};
use storyweave_core::error::{StoryweaveError, StoryweaveResult};
use storyweave_core::patch::{Patch, PatchSet, PositionMap, SourceMap, Span};

use storyweave_cst::{
    parse_component, parse_module, print_expr, Expr, ObjectPattern, ObjectPatternProp, Program,
    Root,
};

use crate::extract::{
    extract_call_sites, extract_declarations, BodyKind, CallSiteSet, DeclarationSet,
    DefaultExport, MetaCallSite, MetaDeclaration, StoryCallSite, StoryDeclaration,
};
use crate::migrate::{has_legacy_markers, migrate};
use crate::oracle::LoweringOracle;
use crate::synth::{render_appendix, META_BINDING};
use crate::upsert::{insert_if_absent, upsert_leaf};

const STORY_DESCRIPTION: &[&str] = &["parameters", "docs", "description", "story"];
const COMPONENT_DESCRIPTION: &[&str] = &["parameters", "docs", "description", "component"];
const RAW_CODE: &[&str] = &["parameters", "__csf", "rawCode"];

const LEGACY_HINT: &str =
    "enable the migration with \"legacyTemplate\": true in storyweave.json or pass --legacy";

/// The authored file after migration, parsed.
#[derive(Debug, Clone)]
pub struct PreparedSource {
    /// Text handed to the lowering step.
    pub source: String,
    /// The file was written in the legacy dialect and rewritten.
    pub migrated: bool,
    root: Root,
}

impl PreparedSource {
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Extract the declaration set.
    pub fn declarations(&self, file: &str) -> StoryweaveResult<DeclarationSet> {
        extract_declarations(&self.source, &self.root, file, self.migrated)
    }
}

/// Parse `source`, migrating it first when it uses the legacy dialect.
///
/// Legacy files are rejected unless `legacy` is set.
pub fn prepare_source(
    file: &str,
    source: &str,
    legacy: bool,
    diagnostics: &mut dyn Diagnostics,
) -> StoryweaveResult<PreparedSource> {
    let root = parse_component(source).map_err(|e| e.into_error(file, source))?;
    if !has_legacy_markers(source, &root) {
        return Ok(PreparedSource {
            source: source.to_string(),
            migrated: false,
            root,
        });
    }
    if !legacy {
        return Err(StoryweaveError::structural_with_hint(
            file,
            "this file uses the legacy <Meta>/<Template> dialect and legacy migration is disabled",
            LEGACY_HINT,
        ));
    }

    let migration = migrate(source, &root, file, diagnostics)?;
    let root = parse_component(&migration.source)
        .map_err(|e| e.into_error(file, &migration.source))?;
    Ok(PreparedSource {
        source: migration.source,
        migrated: migration.migrated,
        root,
    })
}

/// The transformed module.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub code: String,
    /// Maps the output back to the lowered module.
    pub map: SourceMap,
    /// The same mapping as byte ranges.
    pub positions: PositionMap,
    /// Export identifiers in catalog order.
    pub stories: Vec<String>,
}

/// Migrate, lower and weave one file.
pub async fn transform_file<O: LoweringOracle>(
    file: &str,
    source: &str,
    legacy: bool,
    oracle: &O,
    diagnostics: &mut dyn Diagnostics,
) -> StoryweaveResult<TransformOutput> {
    let prepared = prepare_source(file, source, legacy, diagnostics)?;
    let lowered = oracle.lower(file, &prepared.source).await?;
    weave(file, &prepared, &lowered, diagnostics)
}

/// Pair every story declaration with its call site.
///
/// Correlation is positional. A count mismatch means the lowering step and
/// the extractor disagree about the file, which is never the author's fault.
pub fn correlate<'d, 's, 'a>(
    file: &str,
    declarations: &'d DeclarationSet,
    call_sites: &'s CallSiteSet<'a>,
) -> StoryweaveResult<Vec<(&'d StoryDeclaration, &'s StoryCallSite<'a>)>> {
    if declarations.stories.len() != call_sites.stories.len() {
        return Err(StoryweaveError::internal(format!(
            "{}: found {} story declarations but {} story calls in the lowered module",
            file,
            declarations.stories.len(),
            call_sites.stories.len()
        )));
    }
    Ok(declarations
        .stories
        .iter()
        .zip(call_sites.stories.iter())
        .collect())
}

fn lowered_call_sites<'a>(
    program: &'a Program,
    declarations: &DeclarationSet,
    file: &str,
) -> StoryweaveResult<CallSiteSet<'a>> {
    let templates: Vec<&str> = declarations.templates.keys().map(String::as_str).collect();
    extract_call_sites(
        program,
        &declarations.meta.define_meta_local,
        &declarations.meta.story_binding,
        &templates,
        file,
    )
}

/// Rewrite the lowered module of a prepared source.
pub fn weave(
    file: &str,
    prepared: &PreparedSource,
    lowered: &str,
    diagnostics: &mut dyn Diagnostics,
) -> StoryweaveResult<TransformOutput> {
    let declarations = prepared.declarations(file)?;
    let program = parse_module(lowered).map_err(|e| e.into_error(file, lowered))?;
    let call_sites = lowered_call_sites(&program, &declarations, file)?;
    let pairs = correlate(file, &declarations, &call_sites)?;

    let mut patches = PatchSet::new(lowered);
    for (story, site) in pairs.iter().rev() {
        if let Some(patch) = story_patch(story, site, lowered, diagnostics)? {
            patches.add(patch);
        }
    }
    if let Some(patch) = meta_patch(&declarations.meta, &call_sites.meta, lowered, diagnostics)? {
        patches.add(patch);
    }

    let meta_local = match call_sites.meta.pattern.binding_for("meta") {
        Some(ident) => ident.name.clone(),
        None => {
            patches.add(meta_binding_patch(call_sites.meta.pattern));
            META_BINDING.to_string()
        }
    };
    patches.add(default_export_patch(call_sites.default_export));

    let mut appendix = render_appendix(&declarations, &call_sites.entry, &meta_local);
    if !lowered.is_empty() && !lowered.ends_with('\n') {
        appendix.insert(0, '\n');
    }
    patches.append(appendix);

    let output = patches.apply()?;
    let map = output.map.to_source_map(&output.text, lowered, file);
    debug!(
        file,
        stories = declarations.stories.len(),
        bytes = output.text.len(),
        "woven"
    );
    Ok(TransformOutput {
        code: output.text,
        map,
        positions: output.map,
        stories: declarations.export_order(),
    })
}

fn story_patch(
    story: &StoryDeclaration,
    site: &StoryCallSite<'_>,
    lowered: &str,
    diagnostics: &mut dyn Diagnostics,
) -> StoryweaveResult<Option<Patch>> {
    let mut args = site.args.clone();
    let label = story.label.as_str();

    insert_if_absent(&mut args, "exportName", || {
        Expr::string(story.export_identifier.as_str())
    });
    if let Some(comment) = &story.attached_comment {
        upsert_leaf(
            &mut args,
            STORY_DESCRIPTION,
            || Expr::string(comment.as_str()),
            label,
            "description",
            diagnostics,
        )?;
    }
    match (&story.raw_body_source, &story.body_kind) {
        (Some(raw), _) => {
            upsert_leaf(
                &mut args,
                RAW_CODE,
                || Expr::string(raw.as_str()),
                label,
                "raw code",
                diagnostics,
            )?;
        }
        (None, BodyKind::ExplicitTemplateRef(template)) => {
            diagnostics.warn(
                Warning::new(
                    W_RAW_CODE_UNAVAILABLE,
                    format!(
                        "template '{}' is not declared in this file; its source cannot be shown",
                        template
                    ),
                )
                .about(label),
            );
        }
        (None, _) => {}
    }

    if !args.is_dirty() {
        return Ok(None);
    }
    let span = site.args_span()?;
    Ok(Some(Patch::replace(span, print_expr(&Expr::Object(args), lowered))))
}

fn meta_patch(
    meta: &MetaDeclaration,
    site: &MetaCallSite<'_>,
    lowered: &str,
    diagnostics: &mut dyn Diagnostics,
) -> StoryweaveResult<Option<Patch>> {
    let Some(comment) = &meta.attached_comment else {
        return Ok(None);
    };
    let mut args = site.args.clone();
    let written = upsert_leaf(
        &mut args,
        COMPONENT_DESCRIPTION,
        || Expr::string(comment.as_str()),
        "meta",
        "description",
        diagnostics,
    )?;
    if !written {
        return Ok(None);
    }
    let span = site
        .args
        .span
        .ok_or_else(|| StoryweaveError::internal("parsed meta arguments have no span"))?;
    Ok(Some(Patch::replace(span, print_expr(&Expr::Object(args), lowered))))
}

/// Bind `meta` in the `defineMeta(...)` destructuring.
fn meta_binding_patch(pattern: &ObjectPattern) -> Patch {
    let binding = format!("meta: {}", META_BINDING);
    match pattern.props.last() {
        Some(ObjectPatternProp::Rest { span, .. }) => {
            Patch::insert(span.start, format!("{}, ", binding))
        }
        Some(prop) => Patch::insert(prop.span().end, format!(", {}", binding)),
        None => Patch::insert(pattern.span.start + 1, format!(" {} ", binding)),
    }
}

fn default_export_patch(export: DefaultExport) -> Patch {
    let entry = format!("const {} = ", crate::extract::lowered::ENTRY_BINDING);
    match export {
        DefaultExport::Function {
            prefix,
            named: true,
        } => Patch::delete(prefix),
        DefaultExport::Function {
            prefix,
            named: false,
        }
        | DefaultExport::Wrapper { prefix } => Patch::replace(prefix, entry),
        DefaultExport::Identifier { stmt } => Patch::delete(stmt),
    }
}

/// Ranges of the lowered text a weave is allowed to touch.
///
/// Everything outside them is copied byte for byte.
pub fn touched_ranges(prepared: &PreparedSource, file: &str, lowered: &str) -> StoryweaveResult<Vec<Span>> {
    let declarations = prepared.declarations(file)?;
    let program = parse_module(lowered).map_err(|e| e.into_error(file, lowered))?;
    let call_sites = lowered_call_sites(&program, &declarations, file)?;
    let mut ranges = Vec::new();
    for site in &call_sites.stories {
        ranges.push(site.args_span()?);
    }
    ranges.extend(call_sites.meta.args.span);
    ranges.push(call_sites.meta.pattern.span);
    ranges.push(match call_sites.default_export {
        DefaultExport::Function { prefix, .. } | DefaultExport::Wrapper { prefix } => prefix,
        DefaultExport::Identifier { stmt } => stmt,
    });
    ranges.sort_by_key(|span| span.start);
    Ok(ranges)
}
