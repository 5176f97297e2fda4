//! Synthesis of the statements appended to the lowered module.
//!
//! Everything here is rendered from the [`DeclarationSet`] alone; nothing
//! is copied out of either tree.

use storyweave_cst::quote_string;

use crate::extract::DeclarationSet;

/// Module exporting the runtime registration factory.
pub const RUNTIME_MODULE: &str = "@storyweave/csf/internal/create-runtime-stories";

/// The registration factory.
pub const RUNTIME_FACTORY: &str = "createRuntimeStories";

/// Tag marking stories produced by this dialect.
pub const DIALECT_TAG: &str = "csf-v5";

/// Binding of the factory's result.
pub const STORIES_BINDING: &str = "__stories";

/// Binding introduced for `meta` when the source does not destructure it.
pub const META_BINDING: &str = "__meta";

/// Render the appended statements.
///
/// `entry` is the binding of the entry function and `meta` the binding of
/// the meta object, both as they exist after patching.
pub fn render_appendix(declarations: &DeclarationSet, entry: &str, meta: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "import {{ {} }} from {};\n",
        RUNTIME_FACTORY,
        quote_string(RUNTIME_MODULE)
    ));
    out.push_str(&format!(
        "const {} = {}({}, {});\n",
        STORIES_BINDING, RUNTIME_FACTORY, entry, meta
    ));
    out.push_str(&format!("export default {};\n", meta));
    out.push_str(&format!(
        "export const __namedExportsOrder = {};\n",
        string_array(declarations.stories.iter().map(|s| s.export_identifier.as_str()))
    ));
    for story in &declarations.stories {
        let identifier = &story.export_identifier;
        out.push_str(&format!(
            "export const {} = {{ ...{}[{}], tags: {} }};\n",
            identifier,
            STORIES_BINDING,
            quote_string(identifier),
            string_array(story_tags(&story.tags).iter().map(String::as_str))
        ));
    }
    out
}

/// A story's tags with the dialect tag appended once.
pub fn story_tags(tags: &[String]) -> Vec<String> {
    let mut tags = tags.to_vec();
    if !tags.iter().any(|tag| tag == DIALECT_TAG) {
        tags.push(DIALECT_TAG.to_string());
    }
    tags
}

fn string_array<'s>(values: impl Iterator<Item = &'s str>) -> String {
    let items: Vec<String> = values.map(quote_string).collect();
    format!("[{}]", items.join(", "))
}
