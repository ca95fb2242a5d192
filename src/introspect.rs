//! Runs `yo <generator> --help` inside a workspace and captures the text.

use crate::descriptor::GeneratorDescriptor;
use crate::error::HelpError;
use crate::non_interactive;
use crate::process::{ProcessRunner, ProcessSpec};
use crate::workspace::Workspace;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct HelpIntrospector {
    runner: Arc<dyn ProcessRunner>,
    timeout: Duration,
}

impl HelpIntrospector {
    pub fn new(runner: Arc<dyn ProcessRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    pub async fn get_help(
        &self,
        generator: &GeneratorDescriptor,
        workspace: &Workspace,
    ) -> Result<String, HelpError> {
        let spec = runner_spec(workspace, workspace.path(), self.timeout)
            .args([generator.runner_target(), "--help".to_string(), "--no-insight".to_string()]);

        info!("Fetching help for {}", generator);
        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| HelpError::Spawn(format!("{:#}", e)))?;

        if !output.stderr.trim().is_empty() {
            debug!("yo --help stderr for {}: {}", generator, output.stderr.trim());
        }
        if output.timed_out {
            warn!("Help for {} timed out", generator);
            return Err(HelpError::TimedOut(self.timeout.as_secs()));
        }
        if !output.success() {
            warn!("Help for {} exited with {:?}", generator, output.exit_code);
            return Err(HelpError::NonZeroExit {
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

/// `yo` installed in the workspace, with its `.bin` first on `PATH` and the
/// non-interactive environment applied.
pub fn runner_spec(workspace: &Workspace, cwd: &Path, timeout: Duration) -> ProcessSpec {
    let program = workspace.bin_dir().join(runner_binary());
    let mut spec = ProcessSpec::new(program, cwd, timeout);
    for (key, value) in non_interactive::env_pairs() {
        spec = spec.env(key, value);
    }
    spec.env("PATH", prepend_path(&workspace.bin_dir(), std::env::var_os("PATH")))
}

fn runner_binary() -> &'static str {
    if cfg!(windows) { "yo.cmd" } else { "yo" }
}

fn prepend_path(dir: &Path, current: Option<OsString>) -> String {
    let mut paths: Vec<PathBuf> = vec![dir.to_path_buf()];
    if let Some(current) = current {
        paths.extend(std::env::split_paths(&current));
    }
    std::env::join_paths(paths)
        .map(|joined| joined.to_string_lossy().into_owned())
        .unwrap_or_else(|_| dir.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::mock::MockProcessRunner;
    use crate::workspace::WorkspaceProvisioner;

    fn webapp() -> GeneratorDescriptor {
        GeneratorDescriptor::parse("webapp").unwrap()
    }

    #[tokio::test]
    async fn test_returns_stdout_on_success() {
        let mock = MockProcessRunner::new().then(
            0,
            "Usage:\n  yo webapp [options]\n",
            "deprecation warning",
        );
        let runner = Arc::new(mock);
        let workspace = WorkspaceProvisioner::new(None).acquire().unwrap();
        let introspector = HelpIntrospector::new(runner.clone(), Duration::from_secs(5));

        let help = introspector.get_help(&webapp(), &workspace).await.unwrap();

        assert!(help.starts_with("Usage:"));
        let call = &runner.calls()[0];
        assert_eq!(call.program, workspace.bin_dir().join("yo"));
        assert_eq!(call.args[..2], ["webapp".to_string(), "--help".to_string()]);
        assert!(call.env.contains(&("CI".to_string(), "true".to_string())));
        let path = &call.env.iter().find(|(k, _)| k == "PATH").unwrap().1;
        assert!(path.starts_with(&workspace.bin_dir().display().to_string()));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_help_error() {
        let runner = Arc::new(MockProcessRunner::new().then(1, "", "Error: generator crashed"));
        let workspace = WorkspaceProvisioner::new(None).acquire().unwrap();
        let introspector = HelpIntrospector::new(runner, Duration::from_secs(5));

        let err = introspector.get_help(&webapp(), &workspace).await.unwrap_err();
        assert_eq!(
            err,
            HelpError::NonZeroExit {
                code: Some(1),
                stderr: "Error: generator crashed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_timeout_is_help_error() {
        let runner = Arc::new(MockProcessRunner::new().then_timeout());
        let workspace = WorkspaceProvisioner::new(None).acquire().unwrap();
        let introspector = HelpIntrospector::new(runner, Duration::from_secs(7));

        let err = introspector.get_help(&webapp(), &workspace).await.unwrap_err();
        assert_eq!(err, HelpError::TimedOut(7));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_help_error() {
        let runner = Arc::new(MockProcessRunner::new().then_spawn_error("yo missing"));
        let workspace = WorkspaceProvisioner::new(None).acquire().unwrap();
        let introspector = HelpIntrospector::new(runner, Duration::from_secs(5));

        let err = introspector.get_help(&webapp(), &workspace).await.unwrap_err();
        assert!(matches!(err, HelpError::Spawn(msg) if msg.contains("yo missing")));
    }

    #[test]
    fn test_prepend_path_without_existing_path() {
        assert_eq!(prepend_path(Path::new("/ws/node_modules/.bin"), None), "/ws/node_modules/.bin");
    }
}
