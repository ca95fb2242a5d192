//! What a caller asks the runner to do.

use crate::descriptor::GeneratorDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Value of a generator option as received from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Null,
}

impl OptionValue {
    /// Command-line rendering: `true` is a bare flag, scalars become
    /// `--name=value`, `false` and null are left out.
    pub fn to_flag(&self, name: &str) -> Option<String> {
        match self {
            OptionValue::Bool(true) => Some(format!("--{}", name)),
            OptionValue::Bool(false) | OptionValue::Null => None,
            OptionValue::Number(n) => Some(format!("--{}={}", name, n)),
            OptionValue::String(s) => Some(format!("--{}={}", name, s)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, OptionValue::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub generator: GeneratorDescriptor,
    /// Directory the generator writes into.
    pub cwd: PathBuf,
    /// Positional arguments, identity values first.
    pub args: Vec<String>,
    pub options: BTreeMap<String, OptionValue>,
    /// Version string the caller asked for, kept for diagnostics.
    pub version: Option<String>,
}

impl InvocationRequest {
    /// Builds a request whose positional arguments are `app_name`, `version`
    /// (when given) and then `extra_args`.
    pub fn new(
        generator: GeneratorDescriptor,
        cwd: impl Into<PathBuf>,
        app_name: Option<&str>,
        version: Option<&str>,
        extra_args: Vec<String>,
        options: BTreeMap<String, OptionValue>,
    ) -> Self {
        let args = app_name
            .into_iter()
            .chain(version)
            .map(str::to_string)
            .chain(extra_args)
            .collect();
        Self {
            generator,
            cwd: cwd.into(),
            args,
            options,
            version: version.map(str::to_string),
        }
    }

    /// Caller options rendered as flags, in name order.
    pub fn option_flags(&self) -> Vec<String> {
        self.options
            .iter()
            .filter_map(|(name, value)| value.to_flag(name.trim_start_matches('-')))
            .collect()
    }
}
