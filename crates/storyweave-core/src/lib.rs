//! Core infrastructure for storyweave.
//!
//! This crate provides the language-agnostic pieces of the story transform:
//! - Patch accumulator for range replacements plus an append buffer
//! - Position maps and Source Map v3 rendering
//! - Identifier synthesis, validation and collision detection
//! - Diagnostics sink for non-fatal warnings
//! - Error types and error codes
//! - JSON output types for CLI responses
//! - Text utilities (line/column conversion, dedent, comment cleanup)

pub mod diagnostics;
pub mod error;
pub mod ident;
pub mod output;
pub mod patch;
pub mod text;
