//! Error types and the structured invocation outcome.
//!
//! Known failure kinds never escape as bare errors: installers, help
//! introspection and the runner convert them into [`InvocationResult`]
//! variants that carry enough detail for the caller to retry.

use serde::Serialize;
use thiserror::Error;

/// Package installation failed.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Failed to install {package}: {reason}")]
pub struct InstallError {
    pub generator: String,
    pub package: String,
    pub reason: String,
    pub suggestion: String,
}

impl InstallError {
    pub fn new(generator: &str, package: &str, reason: impl Into<String>) -> Self {
        Self {
            generator: generator.to_string(),
            package: package.to_string(),
            reason: reason.into(),
            suggestion: format!(
                "Verify that '{}' exists in the npm registry (npm view {}) \
                 and that the network is reachable.",
                package, package
            ),
        }
    }
}

/// Help text could not be obtained. Never fatal for a run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HelpError {
    #[error("help command exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("help command timed out after {0}s")]
    TimedOut(u64),
    #[error("help command could not be started: {0}")]
    Spawn(String),
}

/// Why generator options could not be described.
#[derive(Debug, Error)]
pub enum DescribeError {
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// Malformed caller input, reported before any subprocess is spawned.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Invalid parameter '{field}': {constraint}")]
pub struct ValidationError {
    pub field: String,
    pub constraint: String,
}

impl ValidationError {
    pub fn new(field: &str, constraint: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            constraint: constraint.into(),
        }
    }
}

/// Positional argument the caller did not supply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgument {
    pub name: String,
    pub position: usize,
    #[serde(rename = "type")]
    pub arg_type: String,
    pub description: String,
}

/// Required option the caller did not supply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingOption {
    pub name: String,
    pub flag: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

/// Outcome of a `run_generator` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InvocationResult {
    #[serde(rename_all = "camelCase")]
    Success {
        output: String,
        generator_config_exists: bool,
    },
    #[serde(rename_all = "camelCase")]
    InstallFailed {
        generator: String,
        package: String,
        message: String,
        suggestion: String,
    },
    #[serde(rename_all = "camelCase")]
    MissingRequirement {
        missing_required: Vec<MissingArgument>,
        missing_options: Vec<MissingOption>,
        suggestions: Vec<String>,
        example_command: String,
        usage: String,
    },
    #[serde(rename_all = "camelCase")]
    NotFound { generator: String, output: String },
    #[serde(rename_all = "camelCase")]
    StillInteractive {
        prompts_detected: Vec<String>,
        suggestion: String,
        output: String,
    },
    #[serde(rename_all = "camelCase")]
    InvalidVersionFormat { version: String, output: String },
    #[serde(rename_all = "camelCase")]
    GenericFailure { exit_code: Option<i32>, output: String },
    #[serde(rename_all = "camelCase")]
    TimedOut { timeout_secs: u64, output: String },
    #[serde(rename_all = "camelCase")]
    UnexpectedError { message: String },
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InvocationResult::Success { .. } => "success",
            InvocationResult::InstallFailed { .. } => "installFailed",
            InvocationResult::MissingRequirement { .. } => "missingRequirement",
            InvocationResult::NotFound { .. } => "notFound",
            InvocationResult::StillInteractive { .. } => "stillInteractive",
            InvocationResult::InvalidVersionFormat { .. } => "invalidVersionFormat",
            InvocationResult::GenericFailure { .. } => "genericFailure",
            InvocationResult::TimedOut { .. } => "timedOut",
            InvocationResult::UnexpectedError { .. } => "unexpectedError",
        }
    }

    /// JSON body sent to the caller, with `success` alongside the `kind` tag.
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "kind": "unexpectedError", "message": e.to_string() })
        });
        if let Some(map) = value.as_object_mut() {
            map.insert("success".to_string(), serde_json::Value::Bool(self.is_success()));
        }
        value
    }
}

impl From<InstallError> for InvocationResult {
    fn from(err: InstallError) -> Self {
        InvocationResult::InstallFailed {
            message: err.to_string(),
            generator: err.generator,
            package: err.package,
            suggestion: err.suggestion,
        }
    }
}
