//! CLI front door.
//!
//! Each command is a function returning the text to print on stdout:
//! - `transform` - Weave one file (generated code, or a JSON envelope)
//! - `migrate` - Print the migrated source of one file
//! - `index` - Print the static index of one file
//! - `batch` - Transform every story file of a directory
//!
//! ## Error Handling
//!
//! All functions return `StoryweaveResult<String>`. The caller (`main.rs`)
//! turns errors into a JSON `ErrorResponse` and an exit code.
//!
//! ## Warnings
//!
//! Warnings are collected per file. They are logged through `tracing` and,
//! for JSON output, included in the response.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tracing::{info, warn};

use storyweave_core::diagnostics::{CollectedDiagnostics, Diagnostics, TracingDiagnostics};
use storyweave_core::error::{StoryweaveError, StoryweaveResult};
use storyweave_core::output::{BatchFileResult, BatchResponse, TransformResponse};

use crate::config::{collect_story_files, preprocess_config, Config};
use crate::indexer::index_source;
use crate::oracle::{CommandOracle, LoweringOracle, StaticOracle};
use crate::transform::{prepare_source, transform_file, TransformOutput};

/// Default output directory of `batch`, relative to the workspace.
pub const DEFAULT_OUT_DIR: &str = ".storyweave/out";

/// Output format of `transform`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The generated module only.
    #[default]
    Code,
    /// A JSON envelope with code, source map, stories and warnings.
    Json,
}

fn read_source(path: &Path) -> StoryweaveResult<String> {
    fs::read_to_string(path).map_err(|e| StoryweaveError::io(path.display().to_string(), e))
}

fn write_file(path: &Path, contents: &str) -> StoryweaveResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StoryweaveError::io(parent.display().to_string(), e))?;
    }
    fs::write(path, contents).map_err(|e| StoryweaveError::io(path.display().to_string(), e))
}

fn log_warnings(sink: &CollectedDiagnostics) {
    let mut tracing_sink = TracingDiagnostics;
    for warning in sink.warnings() {
        tracing_sink.warn(warning.clone());
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> StoryweaveResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| StoryweaveError::internal(format!("JSON serialization error: {}", e)))
}

/// Transform one file.
///
/// With `lowered`, that file is used as the lowered module; otherwise the
/// configured lowering command is run.
pub async fn run_transform(
    file: &Path,
    lowered: Option<&Path>,
    legacy: bool,
    format: OutputFormat,
    config: &Config,
) -> StoryweaveResult<String> {
    let name = file.display().to_string();
    let source = read_source(file)?;
    let mut sink = CollectedDiagnostics::new();

    let output = match lowered {
        Some(path) => {
            let oracle = StaticOracle::new(read_source(path)?);
            transform_file(&name, &source, legacy, &oracle, &mut sink).await?
        }
        None => {
            let oracle = CommandOracle::from_config(&config.lowering, preprocess_config(config))?;
            transform_file(&name, &source, legacy, &oracle, &mut sink).await?
        }
    };
    log_warnings(&sink);

    match format {
        OutputFormat::Code => Ok(output.code),
        OutputFormat::Json => {
            let TransformOutput {
                code, map, stories, ..
            } = output;
            to_json(&TransformResponse::new(
                name,
                code,
                map,
                stories,
                sink.into_warnings(),
            ))
        }
    }
}

/// Print the migrated source of a file, or the source itself when it has
/// no legacy markers.
pub fn run_migrate(file: &Path) -> StoryweaveResult<String> {
    let name = file.display().to_string();
    let source = read_source(file)?;
    let mut sink = CollectedDiagnostics::new();
    let prepared = prepare_source(&name, &source, true, &mut sink)?;
    log_warnings(&sink);
    Ok(prepared.source)
}

/// Print the static index of a file.
pub fn run_index(file: &Path, legacy: bool) -> StoryweaveResult<String> {
    let name = file.display().to_string();
    let source = read_source(file)?;
    let mut sink = CollectedDiagnostics::new();
    let index = index_source(&name, &source, legacy, &mut sink)?;
    log_warnings(&sink);
    to_json(&index)
}

/// Transform every story file under `root` and write the results below
/// `out_dir`, mirroring the directory layout (`A.stories.svelte` becomes
/// `A.stories.svelte.js` plus `A.stories.svelte.js.map`).
///
/// A failing file is reported and the run continues.
pub async fn run_batch(
    root: &Path,
    out_dir: &Path,
    legacy: bool,
    config: &Config,
) -> StoryweaveResult<String> {
    let oracle = CommandOracle::from_config(&config.lowering, preprocess_config(config))?;
    let response = batch(root, out_dir, legacy, config, &oracle).await?;
    to_json(&response)
}

/// [`run_batch`] with any oracle.
pub async fn batch<O: LoweringOracle>(
    root: &Path,
    out_dir: &Path,
    legacy: bool,
    config: &Config,
    oracle: &O,
) -> StoryweaveResult<BatchResponse> {
    let filter = config.filter()?;
    let files = collect_story_files(root, &filter);
    info!(root = %root.display(), files = files.len(), "batch transform");

    let mut results = Vec::with_capacity(files.len());
    for relative in files {
        let name = relative.display().to_string();
        let mut sink = CollectedDiagnostics::new();
        match batch_file(root, out_dir, &relative, legacy, oracle, &mut sink).await {
            Ok(written) => {
                log_warnings(&sink);
                results.push(BatchFileResult::ok(
                    name,
                    written.display().to_string(),
                    sink.into_warnings(),
                ));
            }
            Err(err) => {
                warn!(file = %name, error = %err, "transform failed");
                results.push(BatchFileResult::failed(name, &err));
            }
        }
    }
    Ok(BatchResponse::new(results))
}

async fn batch_file<O: LoweringOracle>(
    root: &Path,
    out_dir: &Path,
    relative: &Path,
    legacy: bool,
    oracle: &O,
    sink: &mut CollectedDiagnostics,
) -> StoryweaveResult<PathBuf> {
    let name = relative.display().to_string();
    let source = read_source(&root.join(relative))?;
    let output = transform_file(&name, &source, legacy, oracle, sink).await?;

    let mut target = out_dir.join(relative).into_os_string();
    target.push(".js");
    let target = PathBuf::from(target);
    let mut map_path = target.clone().into_os_string();
    map_path.push(".map");

    write_file(&target, &output.code)?;
    write_file(Path::new(&map_path), &to_json(&output.map)?)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SOURCE: &str = "<script module>\n  import { defineMeta } from \"@storyweave/csf\";\n  const { Story } = defineMeta({});\n</script>\n<Story name=\"One\" />\n";
    const LOWERED: &str = "import { defineMeta } from \"@storyweave/csf\";\nconst { Story } = defineMeta({});\nexport default function E($$anchor) { Story(a, { name: \"One\" }); }\n";

    #[tokio::test]
    async fn transform_with_lowered_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("One.stories.svelte");
        let lowered = dir.path().join("One.lowered.js");
        fs::write(&file, SOURCE).unwrap();
        fs::write(&lowered, LOWERED).unwrap();

        let code = run_transform(&file, Some(&lowered), false, OutputFormat::Code, &Config::default())
            .await
            .unwrap();
        assert!(code.contains("export const One = { ...__stories[\"One\"], tags: [\"csf-v5\"] };"));

        let json = run_transform(&file, Some(&lowered), false, OutputFormat::Json, &Config::default())
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["stories"], serde_json::json!(["One"]));
        assert_eq!(value["map"]["version"], 3);
    }

    #[test]
    fn missing_file_is_io() {
        let err = run_index(Path::new("/nonexistent/A.stories.svelte"), false).unwrap_err();
        assert!(matches!(err, StoryweaveError::Io { .. }));
    }

    #[test]
    fn migrate_prints_unchanged_source() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("One.stories.svelte");
        fs::write(&file, SOURCE).unwrap();
        assert_eq!(run_migrate(&file).unwrap(), SOURCE);
    }

    #[tokio::test]
    async fn batch_continues_after_failure() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/One.stories.svelte"), SOURCE).unwrap();
        fs::write(dir.path().join("src/Bad.stories.svelte"), "<Story name=\"x\" />").unwrap();
        let out = dir.path().join("out");

        let oracle = StaticOracle::new(LOWERED);
        let response = batch(dir.path(), &out, false, &Config::default(), &oracle)
            .await
            .unwrap();
        assert_eq!(response.status, "partial");
        assert_eq!(response.transformed, 1);
        assert_eq!(response.failed, 1);
        assert_eq!(response.files[0].file, "src/Bad.stories.svelte");
        assert_eq!(
            response.files[0].error.as_ref().map(|e| e.kind.as_str()),
            Some("structural")
        );
        assert!(out.join("src/One.stories.svelte.js").is_file());
        assert!(out.join("src/One.stories.svelte.js.map").is_file());
    }
}
