//! Pre-flight check of parsed help against what the caller supplied.

use crate::descriptor::GeneratorDescriptor;
use crate::error::{InvocationResult, MissingArgument, MissingOption};
use crate::help_parser::HelpInfo;
use crate::request::OptionValue;
use serde::Serialize;
use std::collections::BTreeMap;

/// Optional option left unset, so the generator falls back to its default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaultedOption {
    pub name: String,
    pub flag: String,
    pub default: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementReport {
    pub missing_required: Vec<MissingArgument>,
    pub missing_options: Vec<MissingOption>,
    pub default_options: Vec<DefaultedOption>,
}

impl RequirementReport {
    pub fn is_satisfied(&self) -> bool {
        self.missing_required.is_empty() && self.missing_options.is_empty()
    }
}

/// `skip-install` -> `skipInstall`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.trim_start_matches('-').chars() {
        if c == '-' || c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn is_provided(options: &BTreeMap<String, OptionValue>, name: &str) -> bool {
    let camel = camel_case(name);
    [name.to_string(), camel, format!("--{}", name)]
        .iter()
        .any(|key| options.get(key).is_some_and(|v| !v.is_null()))
}

/// Pure function of its inputs.
pub fn check(
    help: &HelpInfo,
    provided_args: &[String],
    provided_options: &BTreeMap<String, OptionValue>,
) -> RequirementReport {
    let missing_required = help
        .args
        .iter()
        .enumerate()
        .filter(|(position, arg)| arg.required && *position >= provided_args.len())
        .map(|(position, arg)| MissingArgument {
            name: arg.name.clone(),
            position,
            arg_type: arg.arg_type.clone(),
            description: arg.description.clone(),
        })
        .collect();

    let mut missing_options = Vec::new();
    let mut default_options = Vec::new();
    for (name, option) in &help.options {
        if is_provided(provided_options, name) {
            continue;
        }
        if option.required {
            missing_options.push(MissingOption {
                name: name.clone(),
                flag: option.flag.clone(),
                description: option.description.clone(),
                enum_values: option.enum_values.clone(),
            });
        } else if let Some(default) = &option.default {
            default_options.push(DefaultedOption {
                name: name.clone(),
                flag: option.flag.clone(),
                default: default.clone(),
            });
        }
    }

    RequirementReport {
        missing_required,
        missing_options,
        default_options,
    }
}

/// Human-actionable hints, one per missing item.
pub fn suggestions(report: &RequirementReport) -> Vec<String> {
    let mut out = Vec::new();
    for arg in &report.missing_required {
        let mut line = format!(
            "Provide positional argument '{}' at position {} \
             (args[{}] counts appName and version first)",
            arg.name, arg.position, arg.position
        );
        if !arg.description.is_empty() {
            line.push_str(&format!(": {}", arg.description));
        }
        out.push(line);
    }
    for option in &report.missing_options {
        let mut line = format!("Set options.{} ({})", option.name, option.flag);
        match &option.enum_values {
            Some(values) => line.push_str(&format!(" to one of: {}", values.join(", "))),
            None if !option.description.is_empty() => {
                line.push_str(&format!(": {}", option.description))
            }
            None => {}
        }
        out.push(line);
    }
    out
}

/// A command line that would pass the pre-flight check.
pub fn example_command(
    generator: &GeneratorDescriptor,
    provided_args: &[String],
    provided_options: &BTreeMap<String, OptionValue>,
    report: &RequirementReport,
) -> String {
    let mut parts = vec!["yo".to_string(), generator.runner_target()];
    parts.extend(provided_args.iter().cloned());
    parts.extend(report.missing_required.iter().map(|a| format!("<{}>", a.name)));
    parts.extend(
        provided_options
            .iter()
            .filter_map(|(name, value)| value.to_flag(name.trim_start_matches('-'))),
    );
    for option in &report.missing_options {
        let value = option
            .enum_values
            .as_ref()
            .and_then(|values| values.first().cloned())
            .unwrap_or_else(|| format!("<{}>", option.name));
        parts.push(format!("{}={}", option.flag, value));
    }
    parts.join(" ")
}

/// Converts an unsatisfied report into the caller-facing failure.
pub fn missing_requirement(
    generator: &GeneratorDescriptor,
    help: &HelpInfo,
    provided_args: &[String],
    provided_options: &BTreeMap<String, OptionValue>,
    report: RequirementReport,
) -> InvocationResult {
    InvocationResult::MissingRequirement {
        suggestions: suggestions(&report),
        example_command: example_command(generator, provided_args, provided_options, &report),
        usage: help.usage.clone(),
        missing_required: report.missing_required,
        missing_options: report.missing_options,
    }
}
