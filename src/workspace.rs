//! Directories in which `yo` and generator packages are installed.
//!
//! A [`WorkspaceProvisioner`] hands out either the configured persistent
//! directory or a fresh temporary one. Disposable workspaces are removed by
//! [`WorkspaceProvisioner::release`], and by `Drop` if a caller never gets
//! that far.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

const TEMP_PREFIX: &str = "yeoman-mcp-";

#[derive(Debug)]
enum Location {
    Persistent(PathBuf),
    Disposable(TempDir),
}

/// A directory holding an installed runner and generator packages.
#[derive(Debug)]
pub struct Workspace {
    location: Location,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        match &self.location {
            Location::Persistent(path) => path,
            Location::Disposable(dir) => dir.path(),
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.location, Location::Persistent(_))
    }

    pub fn node_modules(&self) -> PathBuf {
        self.path().join("node_modules")
    }

    /// Installed package directory, e.g. `node_modules/generator-webapp`.
    pub fn package_dir(&self, package: &str) -> PathBuf {
        package
            .split('/')
            .fold(self.node_modules(), |dir, segment| dir.join(segment))
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.node_modules().join(".bin")
    }
}

/// Creates and cleans up workspaces.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceProvisioner {
    persistent_dir: Option<PathBuf>,
}

impl WorkspaceProvisioner {
    pub fn new(persistent_dir: Option<PathBuf>) -> Self {
        Self { persistent_dir }
    }

    /// Returns the persistent workspace (creating it if absent) or a new
    /// uniquely named temporary directory.
    pub fn acquire(&self) -> Result<Workspace> {
        match &self.persistent_dir {
            Some(dir) => {
                if !dir.exists() {
                    fs::create_dir_all(dir)
                        .with_context(|| format!("Failed to create workspace {}", dir.display()))?;
                    info!("Created persistent workspace at {}", dir.display());
                }
                debug!("Using persistent workspace {}", dir.display());
                Ok(Workspace {
                    location: Location::Persistent(dir.clone()),
                })
            }
            None => {
                let dir = tempfile::Builder::new()
                    .prefix(TEMP_PREFIX)
                    .tempdir()
                    .context("Failed to create temporary workspace")?;
                debug!("Created disposable workspace {}", dir.path().display());
                Ok(Workspace {
                    location: Location::Disposable(dir),
                })
            }
        }
    }

    /// Removes a disposable workspace; no-op for the persistent one.
    ///
    /// Deletion failures are logged, never returned, so they cannot mask the
    /// result of the operation that used the workspace.
    pub fn release(&self, workspace: Workspace) {
        match workspace.location {
            Location::Persistent(path) => {
                debug!("Keeping persistent workspace {}", path.display());
            }
            Location::Disposable(dir) => {
                let path = dir.path().to_path_buf();
                match dir.close() {
                    Ok(()) => debug!("Removed disposable workspace {}", path.display()),
                    Err(e) => warn!("Failed to remove workspace {}: {}", path.display(), e),
                }
            }
        }
    }
}
