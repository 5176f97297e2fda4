//! Binary entry point for the storyweave CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Transform one file with the configured lowering command
//! storyweave transform src/Button.stories.svelte
//!
//! # Transform against an already lowered module, JSON envelope out
//! storyweave transform src/Button.stories.svelte --lowered Button.js --format json
//!
//! # Show what the legacy migration does to a file
//! storyweave migrate src/Old.stories.svelte
//!
//! # Static index for catalog listings
//! storyweave index src/Button.stories.svelte
//!
//! # Transform the whole workspace
//! storyweave batch src --out-dir build/stories
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use storyweave::cli::{run_batch, run_index, run_migrate, run_transform, OutputFormat, DEFAULT_OUT_DIR};
use storyweave::config::Config;
use storyweave::error::{StoryweaveError, StoryweaveResult};
use storyweave::output::{emit_response, ErrorResponse};

// ============================================================================
// CLI Structure
// ============================================================================

/// Story file transformer for component catalogs.
#[derive(Parser, Debug)]
#[command(name = "storyweave", version, about = "Story file transformer for component catalogs")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Workspace root directory (default: current directory).
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Configuration file (default: storyweave.json in the workspace).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transform one story file into catalog registration code.
    Transform {
        /// The story file.
        file: PathBuf,
        /// Use this lowered module instead of running the lowering command.
        #[arg(long)]
        lowered: Option<PathBuf>,
        /// Output format.
        #[arg(long, value_enum, default_value = "code")]
        format: OutputFormat,
        /// Migrate legacy-dialect files.
        #[arg(long)]
        legacy: bool,
    },
    /// Print the migrated source of a legacy story file.
    Migrate {
        /// The story file.
        file: PathBuf,
    },
    /// Print the static index of a story file.
    Index {
        /// The story file.
        file: PathBuf,
        /// Migrate legacy-dialect files.
        #[arg(long)]
        legacy: bool,
    },
    /// Transform every story file under a directory.
    Batch {
        /// Directory to walk (default: the workspace).
        dir: Option<PathBuf>,
        /// Output directory (default: .storyweave/out in the workspace).
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Migrate legacy-dialect files.
        #[arg(long)]
        legacy: bool,
    },
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level);

    match execute(cli).await {
        Ok(text) => {
            let mut stdout = io::stdout();
            let _ = write!(stdout, "{}", text);
            if !text.ends_with('\n') {
                let _ = writeln!(stdout);
            }
            let _ = stdout.flush();
            ExitCode::SUCCESS
        }
        Err(err) => {
            let response = ErrorResponse::from_error(&err);
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();
            ExitCode::from(err.error_code().code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn workspace_root(global: &GlobalArgs) -> StoryweaveResult<PathBuf> {
    match &global.workspace {
        Some(path) => Ok(path.clone()),
        None => std::env::current_dir()
            .map_err(|e| StoryweaveError::io("current directory", e)),
    }
}

fn load_config(global: &GlobalArgs, workspace: &Path) -> StoryweaveResult<Config> {
    Config::discover(global.config.as_deref(), workspace)
}

async fn execute(cli: Cli) -> StoryweaveResult<String> {
    let workspace = workspace_root(&cli.global)?;
    match cli.command {
        Command::Transform {
            file,
            lowered,
            format,
            legacy,
        } => {
            let config = load_config(&cli.global, &workspace)?;
            let legacy = legacy || config.legacy_template;
            run_transform(&file, lowered.as_deref(), legacy, format, &config).await
        }
        Command::Migrate { file } => run_migrate(&file),
        Command::Index { file, legacy } => {
            let config = load_config(&cli.global, &workspace)?;
            run_index(&file, legacy || config.legacy_template)
        }
        Command::Batch {
            dir,
            out_dir,
            legacy,
        } => {
            let config = load_config(&cli.global, &workspace)?;
            let root = dir.map_or_else(|| workspace.clone(), |dir| workspace.join(dir));
            let out_dir = out_dir.unwrap_or_else(|| workspace.join(DEFAULT_OUT_DIR));
            run_batch(&root, &out_dir, legacy || config.legacy_template, &config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod cli_parsing {
        use super::*;

        #[test]
        fn transform_defaults() {
            let cli = Cli::try_parse_from(["storyweave", "transform", "A.stories.svelte"]).unwrap();
            match cli.command {
                Command::Transform {
                    file,
                    lowered,
                    format,
                    legacy,
                } => {
                    assert_eq!(file, PathBuf::from("A.stories.svelte"));
                    assert!(lowered.is_none());
                    assert_eq!(format, OutputFormat::Code);
                    assert!(!legacy);
                }
                other => panic!("unexpected command {:?}", other),
            }
            assert!(matches!(cli.global.log_level, LogLevel::Warn));
        }

        #[test]
        fn transform_with_options() {
            let cli = Cli::try_parse_from([
                "storyweave",
                "transform",
                "A.stories.svelte",
                "--lowered",
                "A.js",
                "--format",
                "json",
                "--legacy",
                "--log-level",
                "debug",
            ])
            .unwrap();
            let Command::Transform {
                lowered,
                format,
                legacy,
                ..
            } = cli.command
            else {
                panic!("expected transform");
            };
            assert_eq!(lowered, Some(PathBuf::from("A.js")));
            assert_eq!(format, OutputFormat::Json);
            assert!(legacy);
            assert!(matches!(cli.global.log_level, LogLevel::Debug));
        }

        #[test]
        fn global_args_after_subcommand() {
            let cli = Cli::try_parse_from([
                "storyweave",
                "batch",
                "src",
                "--workspace",
                "/tmp/ws",
                "--config",
                "sw.json",
            ])
            .unwrap();
            assert_eq!(cli.global.workspace, Some(PathBuf::from("/tmp/ws")));
            assert_eq!(cli.global.config, Some(PathBuf::from("sw.json")));
            let Command::Batch { dir, out_dir, .. } = cli.command else {
                panic!("expected batch");
            };
            assert_eq!(dir, Some(PathBuf::from("src")));
            assert!(out_dir.is_none());
        }

        #[test]
        fn unknown_format_is_rejected() {
            assert!(Cli::try_parse_from(["storyweave", "transform", "a", "--format", "xml"]).is_err());
        }
    }
}
