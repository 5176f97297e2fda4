//! storyweave: story file transformation for component catalogs
//!
//! Turns declarative story files (a `defineMeta(...)` declaration plus
//! `<Story>` elements in component markup) into registration code for the
//! catalog runtime. The input file exists twice: as authored, and as
//! lowered by an external compiler step. The pipeline extracts a story
//! model from the authored file, finds the matching call sites in the
//! lowered module by position, and patches the lowered text in place
//! before appending the generated exports.

// Core infrastructure - re-exported from storyweave-core
pub use storyweave_core::diagnostics;
pub use storyweave_core::error;
pub use storyweave_core::ident;
pub use storyweave_core::output;
pub use storyweave_core::patch;
pub use storyweave_core::text;

// Pipeline
pub mod extract;
pub mod migrate;
pub mod synth;
pub mod transform;
pub mod upsert;

// Collaborators
pub mod config;
pub mod indexer;
pub mod oracle;

// Front door
pub mod cli;

/// Package the authoring helpers are imported from.
pub const ADDON_PACKAGE: &str = "@storyweave/csf";

/// The declarative entry point.
pub const DEFINE_META: &str = "defineMeta";

/// Name of the story component destructured from `defineMeta(...)`.
pub const STORY_EXPORT: &str = "Story";

pub use transform::{prepare_source, transform_file, weave, PreparedSource, TransformOutput};
