//! Static indexing: the catalog listing of a story file without lowering.

use storyweave_core::diagnostics::Diagnostics;
use storyweave_core::error::StoryweaveResult;
use storyweave_core::output::{IndexResponse, IndexedMeta, IndexedStory};

use crate::transform::prepare_source;

/// Index `source`: meta title and tags, then every story in catalog order.
///
/// Legacy files are migrated first when `legacy` is set, so the listing
/// carries the same tags the transformed module would.
pub fn index_source(
    file: &str,
    source: &str,
    legacy: bool,
    diagnostics: &mut dyn Diagnostics,
) -> StoryweaveResult<IndexResponse> {
    let prepared = prepare_source(file, source, legacy, diagnostics)?;
    let declarations = prepared.declarations(file)?;

    let meta = IndexedMeta {
        title: declarations.meta.title.clone(),
        tags: declarations.meta.tags.clone(),
    };
    let stories = declarations
        .stories
        .iter()
        .map(|story| IndexedStory {
            export_name: story.export_identifier.clone(),
            name: story.index_name(),
            tags: story.tags.clone(),
        })
        .collect();
    Ok(IndexResponse::new(file, meta, stories))
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyweave_core::diagnostics::CollectedDiagnostics;
    use storyweave_core::error::StoryweaveError;

    const SOURCE: &str = r#"<script module>
  import { defineMeta } from "@storyweave/csf";
  const { Story } = defineMeta({ title: "Forms/Input", tags: ["autodocs"] });
</script>

<Story name="Empty value" />
<Story exportName="WithPlaceholder" tags={["!dev"]} />
"#;

    #[test]
    fn lists_meta_and_stories() {
        let mut sink = CollectedDiagnostics::new();
        let index = index_source("Input.stories.svelte", SOURCE, false, &mut sink).unwrap();
        assert_eq!(index.meta.title.as_deref(), Some("Forms/Input"));
        assert_eq!(index.meta.tags, vec!["autodocs"]);
        let stories: Vec<(&str, &str)> = index
            .stories
            .iter()
            .map(|s| (s.export_name.as_str(), s.name.as_str()))
            .collect();
        assert_eq!(
            stories,
            vec![("EmptyValue", "Empty value"), ("WithPlaceholder", "With Placeholder")]
        );
        assert_eq!(index.stories[1].tags, vec!["!dev"]);
    }

    #[test]
    fn legacy_files_need_the_flag() {
        let src = "<script>\n  import { Meta, Story } from \"@storyweave/csf\";\n</script>\n<Meta title=\"Old\" />\n<Story name=\"One\" />\n";
        let mut sink = CollectedDiagnostics::new();
        let err = index_source("Old.stories.svelte", src, false, &mut sink).unwrap_err();
        assert!(matches!(err, StoryweaveError::Structural { .. }));

        let index = index_source("Old.stories.svelte", src, true, &mut sink).unwrap();
        assert_eq!(index.meta.title.as_deref(), Some("Old"));
        assert_eq!(index.stories[0].tags, vec!["csf-v4"]);
    }
}
