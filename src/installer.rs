//! Makes sure `yo` and a generator package are installed in a workspace.

use crate::descriptor::GeneratorDescriptor;
use crate::error::InstallError;
use crate::process::{ProcessRunner, ProcessSpec};
use crate::workspace::Workspace;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Package that provides the `yo` runner.
pub const RUNNER_PACKAGE: &str = "yo";

const MANIFEST: &str = r#"{
  "name": "yeoman-mcp-workspace",
  "version": "1.0.0",
  "private": true,
  "description": "Generators installed by yeoman-mcp"
}
"#;

type LockKey = (PathBuf, String);

pub struct GeneratorInstaller {
    runner: Arc<dyn ProcessRunner>,
    npm_command: String,
    timeout: Duration,
    // Serialises check-then-install per (workspace, package) within this process.
    locks: Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl GeneratorInstaller {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        npm_command: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            npm_command: npm_command.into(),
            timeout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Installs the runner and the generator unless both are already present.
    pub async fn ensure_installed(
        &self,
        workspace: &Workspace,
        generator: &GeneratorDescriptor,
    ) -> Result<(), InstallError> {
        let package = generator.package_name();
        let fail = |reason: String| InstallError::new(generator.name(), &package, reason);

        // Disposable workspaces are never shared between calls.
        let _guard = if workspace.is_persistent() {
            Some(self.lock_for(workspace, &package).lock_owned().await)
        } else {
            None
        };

        write_manifest_if_missing(workspace)
            .map_err(|e| fail(format!("could not write package.json: {}", e)))?;

        if is_installed(workspace, &package) {
            info!(
                "{} and {} already installed in {}, skipping",
                RUNNER_PACKAGE,
                package,
                workspace.path().display()
            );
            return Ok(());
        }

        if !self.runner.program_exists(&self.npm_command) {
            return Err(fail(format!(
                "'{}' was not found on PATH; install Node.js and npm",
                self.npm_command
            )));
        }

        info!(
            "Installing {} and {} into {}",
            RUNNER_PACKAGE,
            package,
            workspace.path().display()
        );
        let spec = ProcessSpec::new(&self.npm_command, workspace.path(), self.timeout)
            .args([
                "install",
                RUNNER_PACKAGE,
                package.as_str(),
                "--no-audit",
                "--no-fund",
                "--loglevel=error",
            ])
            .env("NO_UPDATE_NOTIFIER", "1")
            .env("NPM_CONFIG_YES", "true");

        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| fail(format!("{:#}", e)))?;

        if output.timed_out {
            return Err(fail(format!(
                "npm install timed out after {}s",
                self.timeout.as_secs()
            )));
        }
        if !output.success() {
            let detail = output.stderr.trim();
            warn!(
                "npm install of {} failed with {:?}: {}",
                package, output.exit_code, detail
            );
            let code = output
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let detail = if detail.is_empty() {
                String::new()
            } else {
                format!(": {}", detail)
            };
            return Err(fail(format!("npm install exited with code {}{}", code, detail)));
        }

        debug!("npm install output: {}", output.stdout.trim());
        Ok(())
    }

    fn lock_for(&self, workspace: &Workspace, package: &str) -> Arc<tokio::sync::Mutex<()>> {
        let key = (workspace.path().to_path_buf(), package.to_string());
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(key).or_default().clone()
    }
}

fn write_manifest_if_missing(workspace: &Workspace) -> std::io::Result<()> {
    let manifest = workspace.path().join("package.json");
    if !manifest.exists() {
        fs::write(&manifest, MANIFEST)?;
        debug!("Wrote {}", manifest.display());
    }
    Ok(())
}

/// Both the runner and the generator package exist under `node_modules`.
pub fn is_installed(workspace: &Workspace, package: &str) -> bool {
    workspace.package_dir(RUNNER_PACKAGE).exists() && workspace.package_dir(package).exists()
}
