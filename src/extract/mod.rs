//! Extraction of the normalized story model from both trees.
//!
//! [`source`] reads the authored component file into a [`DeclarationSet`];
//! [`lowered`] finds the matching call sites in the lowered module. The two
//! are correlated by position only, in [`crate::transform`].

pub mod lowered;
pub mod source;

use std::collections::BTreeMap;

use storyweave_core::ident::identifier_to_display_name;
use storyweave_core::patch::Span;

pub use lowered::{extract_call_sites, CallSiteSet, DefaultExport, MetaCallSite, StoryCallSite};
pub use source::extract_declarations;

/// Everything declared in one story file. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclarationSet {
    pub meta: MetaDeclaration,
    /// Stories in document order.
    pub stories: Vec<StoryDeclaration>,
    /// Top-level snippets by name.
    pub templates: BTreeMap<String, TemplateDeclaration>,
    /// The file was written in the tag-based dialect and migrated.
    pub is_legacy_dialect: bool,
}

impl DeclarationSet {
    /// Export identifiers in catalog order.
    pub fn export_order(&self) -> Vec<String> {
        self.stories
            .iter()
            .map(|story| story.export_identifier.clone())
            .collect()
    }
}

/// The `defineMeta(...)` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaDeclaration {
    /// The whole declaration statement.
    pub span: Span,
    /// Local name `defineMeta` is imported as.
    pub define_meta_local: String,
    /// Local name of the destructured `Story` component.
    pub story_binding: String,
    /// Local name of the destructured `meta`, when destructured.
    pub meta_binding: Option<String>,
    pub title: Option<String>,
    pub tags: Vec<String>,
    /// Identifier passed as `component`.
    pub component_name: Option<String>,
    /// Snippet named by `render`, used by stories without a body.
    pub default_template: Option<String>,
    pub attached_comment: Option<String>,
}

/// How a story renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyKind {
    /// No body; arguments are forwarded to the meta's component.
    None,
    /// Children written inside the story element.
    InlineChildren,
    /// `template={name}`.
    ExplicitTemplateRef(String),
    /// The meta's `render` snippet.
    ImplicitDefaultTemplate(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoryDeclaration {
    /// The story element.
    pub span: Span,
    pub display_name: Option<String>,
    /// Unique within the file, valid and not reserved.
    pub export_identifier: String,
    pub tags: Vec<String>,
    pub body_kind: BodyKind,
    pub attached_comment: Option<String>,
    /// Reformatted body source, for "view source".
    pub raw_body_source: Option<String>,
    pub as_child: bool,
    /// `Story "<name>" at line:col`, used in messages.
    pub label: String,
}

impl StoryDeclaration {
    /// Name shown in the catalog.
    pub fn index_name(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => identifier_to_display_name(&self.export_identifier),
        }
    }
}

/// A top-level `{#snippet}` that stories may render with.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDeclaration {
    pub name: String,
    pub span: Span,
    /// Parameter list text, without parentheses.
    pub params: Option<String>,
    /// Reformatted body source.
    pub body_source: String,
}
