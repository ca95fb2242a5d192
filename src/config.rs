//! Server configuration.
//!
//! Values come from `~/.yeoman-mcp/config.toml`, then environment variables,
//! then command-line flags. The resolved [`Config`] is built once at startup
//! and handed to the components that need it; nothing reads it globally.

use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org/-/v1/search";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Persistent workspace reused across invocations. `None` means every
    /// invocation gets a disposable directory.
    pub workspace_dir: Option<PathBuf>,
    pub npm_command: String,
    pub registry_url: String,
    pub install_timeout_secs: u64,
    pub help_timeout_secs: u64,
    pub run_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: None,
            npm_command: "npm".to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            install_timeout_secs: 300,
            help_timeout_secs: 60,
            run_timeout_secs: 600,
        }
    }
}

impl Config {
    /// Load configuration from file and environment, or fall back to defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|_| {
            info!("No config file found, using defaults");
            Self::default()
        });

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            info!("Loaded config from: {}", config_path.display());
            Ok(config)
        } else {
            Err(anyhow!("Config file not found"))
        }
    }

    /// Environment variables override the config file.
    ///
    /// `lookup` is injected so tests never have to touch the process
    /// environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("YEOMAN_MCP_WORKSPACE").filter(|v| !v.trim().is_empty()) {
            self.workspace_dir = Some(PathBuf::from(dir));
        }
        if let Some(npm) = lookup("YEOMAN_MCP_NPM").filter(|v| !v.trim().is_empty()) {
            self.npm_command = npm;
        }
        if let Some(url) = lookup("YEOMAN_MCP_REGISTRY_URL").filter(|v| !v.trim().is_empty()) {
            self.registry_url = url;
        }

        let timeouts = [
            ("YEOMAN_MCP_INSTALL_TIMEOUT", &mut self.install_timeout_secs),
            ("YEOMAN_MCP_HELP_TIMEOUT", &mut self.help_timeout_secs),
            ("YEOMAN_MCP_RUN_TIMEOUT", &mut self.run_timeout_secs),
        ];
        for (key, slot) in timeouts {
            if let Some(raw) = lookup(key) {
                match raw.trim().parse::<u64>() {
                    Ok(secs) if secs > 0 => *slot = secs,
                    _ => warn!("Ignoring invalid {}={:?}", key, raw),
                }
            }
        }
    }

    /// Persistent workspace from `--generator-dir` wins over everything else.
    pub fn with_workspace_dir(mut self, dir: Option<PathBuf>) -> Self {
        if dir.is_some() {
            self.workspace_dir = dir;
        }
        self
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn help_timeout(&self) -> Duration {
        Duration::from_secs(self.help_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".yeoman-mcp"))
    }

    /// Prints the resolved configuration. Goes to stderr: stdout belongs to
    /// the protocol.
    pub fn show_config_info(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        eprintln!("Configuration file: {}", config_path.display());
        eprintln!(
            "Status: {}",
            if config_path.exists() { "Found" } else { "Not found (using defaults)" }
        );
        match &self.workspace_dir {
            Some(dir) => eprintln!("Workspace: {} (persistent)", dir.display()),
            None => eprintln!("Workspace: disposable (one temporary directory per call)"),
        }
        eprintln!("npm command: {}", self.npm_command);
        eprintln!("Registry: {}", self.registry_url);
        eprintln!(
            "Timeouts: install {}s, help {}s, run {}s",
            self.install_timeout_secs, self.help_timeout_secs, self.run_timeout_secs
        );
        eprintln!("\nTo use a persistent workspace:");
        eprintln!("  yeoman-mcp --generator-dir <path>");
        eprintln!("\nOr set environment variable:");
        eprintln!("  export YEOMAN_MCP_WORKSPACE=<path>");
        Ok(())
    }
}
