//! yeoman-mcp - drive yeoman generators from an automated agent.
//!
//! Generators are interactive by nature: they ask questions on a terminal
//! and block until someone answers. This library installs them into a
//! workspace, reads their `--help`, works out which answers must be supplied
//! up front, and runs them with no terminal attached. Every run ends in a
//! structured [`error::InvocationResult`] instead of a hang.
//!
//! # Architecture
//!
//! - [`config`] - Configuration (config file, environment, CLI)
//! - [`process`] - Subprocess seam with timeouts
//! - [`non_interactive`] - Environment and flags that suppress prompts
//! - [`workspace`] - Persistent or disposable install directories
//! - [`installer`] - npm install of the runner and generator
//! - [`introspect`] - Captures generator help text
//! - [`help_parser`] - Turns help text into arguments and options
//! - [`requirements`] - Pre-flight check of caller input against help
//! - [`runner`] - Runs a generator and classifies the outcome
//! - [`sanitize`] - Cleans terminal output
//! - [`registry`] - npm registry search
//! - [`tools`] - Tool definitions, validation and dispatch
//! - [`server`] - JSON-RPC stdio transport
//!
//! # Example
//!
//! ```ignore
//! use yeoman_mcp::config::Config;
//! use yeoman_mcp::tools::{ToolRouter, RUN_GENERATOR};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let router = ToolRouter::new(&Config::load()?);
//!     let output = router
//!         .call(
//!             RUN_GENERATOR,
//!             &serde_json::json!({
//!                 "generatorName": "webapp",
//!                 "cwd": "/tmp/site",
//!                 "appName": "site",
//!                 "version": "0.1.0",
//!                 "options": { "style": "sass" }
//!             }),
//!         )
//!         .await?;
//!     println!("{}", output.value);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod help_parser;
pub mod http_client;
pub mod installer;
pub mod introspect;
pub mod non_interactive;
pub mod process;
pub mod registry;
pub mod request;
pub mod requirements;
pub mod runner;
pub mod sanitize;
pub mod server;
pub mod tools;
pub mod workspace;
