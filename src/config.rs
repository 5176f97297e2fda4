//! Configuration: `storyweave.json`, file filtering and discovery.
//!
//! All fields are optional. Discovery order is an explicit `--config`
//! path, then `storyweave.json` in the workspace root, then defaults.
//!
//! ```json
//! {
//!   "include": ["**/*.stories.svelte"],
//!   "exclude": ["legacy/**"],
//!   "legacyTemplate": true,
//!   "lowering": { "command": ["node", "lower.mjs"], "timeoutSecs": 30 },
//!   "preprocess": { "typescript": true }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use storyweave_core::error::{StoryweaveError, StoryweaveResult};

/// Name of the configuration file looked up in the workspace root.
pub const CONFIG_FILE: &str = "storyweave.json";

/// Directory exclusions that always apply.
pub const DEFAULT_EXCLUSIONS: &[&str] = &["**/.git/**", "**/node_modules/**", "**/target/**"];

/// Story files matched when `include` is not configured.
pub const DEFAULT_INCLUDE: &str = "**/*.stories.svelte";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Config {
    /// Glob patterns of story files, relative to the workspace root.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Run the legacy migration pass on files that need it.
    pub legacy_template: bool,
    pub lowering: LoweringConfig,
    /// Host preprocessing configuration, passed through to the lowering
    /// command untouched.
    pub preprocess: Option<serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            include: vec![DEFAULT_INCLUDE.to_string()],
            exclude: Vec::new(),
            legacy_template: false,
            lowering: LoweringConfig::default(),
            preprocess: None,
        }
    }
}

/// The external lowering command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct LoweringConfig {
    /// Program and arguments. The story source is written to stdin and the
    /// lowered module read from stdout.
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        LoweringConfig {
            command: vec!["node".to_string(), "lower.mjs".to_string()],
            timeout_secs: 30,
        }
    }
}

impl LoweringConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Parse a configuration document.
    pub fn from_json(text: &str) -> StoryweaveResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| StoryweaveError::config(format!("{}: {}", CONFIG_FILE, e)))
    }

    /// Load the configuration for `workspace`.
    ///
    /// An explicit path must exist; the workspace file is optional.
    pub fn discover(explicit: Option<&Path>, workspace: &Path) -> StoryweaveResult<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = workspace.join(CONFIG_FILE);
                if !candidate.is_file() {
                    debug!(workspace = %workspace.display(), "no configuration file, using defaults");
                    return Ok(Config::default());
                }
                candidate
            }
        };
        let text = fs::read_to_string(&path)
            .map_err(|e| StoryweaveError::io(path.display().to_string(), e))?;
        let config = Config::from_json(&text)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Build the include/exclude filter.
    pub fn filter(&self) -> StoryweaveResult<FileFilter> {
        FileFilter::new(&self.include, &self.exclude)
    }
}

static PREPROCESS: OnceLock<Option<String>> = OnceLock::new();

/// The host preprocessing configuration, serialized.
///
/// Set from the first configuration that asks for it and read-only
/// afterwards.
pub fn preprocess_config(config: &Config) -> Option<&'static str> {
    PREPROCESS
        .get_or_init(|| {
            config
                .preprocess
                .as_ref()
                .and_then(|value| serde_json::to_string(value).ok())
        })
        .as_deref()
}

/// Include/exclude filtering of workspace-relative paths.
#[derive(Debug)]
pub struct FileFilter {
    inclusions: GlobSet,
    exclusions: GlobSet,
    default_exclusions: GlobSet,
}

impl FileFilter {
    pub fn new(include: &[String], exclude: &[String]) -> StoryweaveResult<Self> {
        let include: Vec<String> = if include.is_empty() {
            vec![DEFAULT_INCLUDE.to_string()]
        } else {
            include.to_vec()
        };
        let defaults: Vec<String> = DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect();
        Ok(FileFilter {
            inclusions: build_glob_set(&include)?,
            exclusions: build_glob_set(exclude)?,
            default_exclusions: build_glob_set(&defaults)?,
        })
    }

    /// Whether a workspace-relative path is a story file to process.
    pub fn matches(&self, path: &Path) -> bool {
        !self.default_exclusions.is_match(path)
            && !self.exclusions.is_match(path)
            && self.inclusions.is_match(path)
    }
}

fn build_glob_set(patterns: &[String]) -> StoryweaveResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            StoryweaveError::config(format!("invalid glob pattern '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| StoryweaveError::config(format!("failed to build glob set: {}", e)))
}

/// Story files under `root` accepted by `filter`, as sorted
/// root-relative paths.
pub fn collect_story_files(root: &Path, filter: &FileFilter) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .filter(|rel| filter.matches(rel))
        .collect();
    files.sort();
    files
}
