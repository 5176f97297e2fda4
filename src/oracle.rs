//! The lowering step, seen from the pipeline.
//!
//! Lowering compiles a story file into a JavaScript module. It is an
//! external collaborator: storyweave never lowers anything itself. The
//! pipeline only asks a [`LoweringOracle`] for the lowered text of a
//! (migrated) source and awaits the answer once per file.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use storyweave_core::error::{StoryweaveError, StoryweaveResult};

use crate::config::LoweringConfig;

/// Environment variable carrying the host preprocessing configuration.
pub const PREPROCESS_ENV: &str = "STORYWEAVE_PREPROCESS";

/// Environment variable carrying the name of the file being lowered.
pub const FILE_ENV: &str = "STORYWEAVE_FILE";

/// Produces the lowered module for a story source.
pub trait LoweringOracle {
    fn lower<'a>(
        &'a self,
        file: &'a str,
        source: &'a str,
    ) -> impl Future<Output = StoryweaveResult<String>> + Send + 'a;
}

/// An oracle that already knows the answer, e.g. a lowered file passed on
/// the command line.
#[derive(Debug, Clone)]
pub struct StaticOracle {
    lowered: String,
}

impl StaticOracle {
    pub fn new(lowered: impl Into<String>) -> Self {
        StaticOracle {
            lowered: lowered.into(),
        }
    }
}

impl LoweringOracle for StaticOracle {
    fn lower<'a>(
        &'a self,
        _file: &'a str,
        _source: &'a str,
    ) -> impl Future<Output = StoryweaveResult<String>> + Send + 'a {
        std::future::ready(Ok(self.lowered.clone()))
    }
}

/// Runs an external command: source on stdin, lowered module on stdout.
///
/// The file name is passed in [`FILE_ENV`] and the preprocessing
/// configuration, when there is one, in [`PREPROCESS_ENV`]. A command that
/// outlives its timeout is killed.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    preprocess: Option<String>,
}

impl CommandOracle {
    /// Resolve the configured command on `PATH`.
    pub fn from_config(config: &LoweringConfig, preprocess: Option<&str>) -> StoryweaveResult<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| StoryweaveError::config("lowering.command must not be empty"))?;
        let resolved = which::which(program).map_err(|e| {
            StoryweaveError::oracle(format!("lowering command '{}' not found: {}", program, e))
        })?;
        Ok(CommandOracle {
            program: resolved,
            args: args.to_vec(),
            timeout: config.timeout(),
            preprocess: preprocess.map(str::to_string),
        })
    }

    async fn run(&self, file: &str, source: &str) -> StoryweaveResult<String> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env(FILE_ENV, file)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(preprocess) = &self.preprocess {
            command.env(PREPROCESS_ENV, preprocess);
        }

        let mut child = command.spawn().map_err(|e| {
            StoryweaveError::oracle(format!("cannot start {}: {}", self.program.display(), e))
        })?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| StoryweaveError::internal("lowering command stdin was not captured"))?;

        // Feed stdin concurrently so a command that writes before it has
        // read everything cannot deadlock on a full pipe.
        let input = source.as_bytes().to_vec();
        let writer = tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        });

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                StoryweaveError::oracle(format!("waiting for the lowering command failed: {}", e))
            })?,
            Err(_) => {
                return Err(StoryweaveError::oracle(format!(
                    "lowering {} timed out after {}s",
                    file,
                    self.timeout.as_secs_f64()
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StoryweaveError::oracle(format!(
                "lowering {} failed ({}): {}",
                file,
                output.status,
                stderr.trim()
            )));
        }
        match writer.await {
            Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(StoryweaveError::oracle(format!(
                    "writing the source of {} to the lowering command failed: {}",
                    file, e
                )))
            }
            _ => {}
        }

        let lowered = String::from_utf8(output.stdout).map_err(|_| {
            StoryweaveError::oracle(format!("the lowered module for {} is not UTF-8", file))
        })?;
        debug!(file, bytes = lowered.len(), "lowered");
        Ok(lowered)
    }
}

impl LoweringOracle for CommandOracle {
    fn lower<'a>(
        &'a self,
        file: &'a str,
        source: &'a str,
    ) -> impl Future<Output = StoryweaveResult<String>> + Send + 'a {
        self.run(file, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle(command: &[&str], timeout_secs: u64, preprocess: Option<&str>) -> CommandOracle {
        let config = LoweringConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            timeout_secs,
        };
        CommandOracle::from_config(&config, preprocess).unwrap()
    }

    #[tokio::test]
    async fn static_oracle_returns_its_text() {
        let oracle = StaticOracle::new("export default 1;");
        assert_eq!(oracle.lower("a", "b").await.unwrap(), "export default 1;");
    }

    #[test]
    fn empty_command_is_a_config_error() {
        let err = CommandOracle::from_config(
            &LoweringConfig {
                command: Vec::new(),
                timeout_secs: 1,
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, StoryweaveError::Config { .. }));
    }

    #[test]
    fn unknown_program_is_an_oracle_error() {
        let err = CommandOracle::from_config(
            &LoweringConfig {
                command: vec!["storyweave-no-such-lowering-tool".to_string()],
                timeout_secs: 1,
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, StoryweaveError::Oracle { .. }));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        #[tokio::test]
        async fn identity_command() {
            let oracle = oracle(&["cat"], 10, None);
            let lowered = oracle.lower("a.stories.svelte", "const x = 1;\n").await.unwrap();
            assert_eq!(lowered, "const x = 1;\n");
        }

        #[tokio::test]
        async fn environment_is_passed_through() {
            let oracle = oracle(
                &["sh", "-c", "printf '%s|%s' \"$STORYWEAVE_FILE\" \"$STORYWEAVE_PREPROCESS\""],
                10,
                Some("{\"ts\":true}"),
            );
            let lowered = oracle.lower("B.stories.svelte", "").await.unwrap();
            assert_eq!(lowered, "B.stories.svelte|{\"ts\":true}");
        }

        #[tokio::test]
        async fn failing_command_reports_stderr() {
            let oracle = oracle(&["sh", "-c", "echo broken >&2; exit 3"], 10, None);
            let err = oracle.lower("a.svelte", "x").await.unwrap_err();
            assert!(matches!(err, StoryweaveError::Oracle { .. }));
            assert!(err.to_string().contains("broken"));
        }

        #[tokio::test]
        async fn slow_command_times_out() {
            let oracle = oracle(&["sleep", "5"], 0, None);
            let err = oracle.lower("a.svelte", "").await.unwrap_err();
            assert!(err.to_string().contains("timed out"));
        }
    }
}
