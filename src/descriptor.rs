//! Generator identity.
//!
//! Callers name a generator the way they would type it after `yo`
//! (`webapp`, `webapp:app`, `@acme/api`) or by its package name
//! (`generator-webapp`, `@acme/generator-api`); both resolve to the same
//! descriptor.

use crate::error::ValidationError;
use serde::Serialize;
use std::fmt;

const PACKAGE_PREFIX: &str = "generator-";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GeneratorDescriptor {
    /// `@scope` for scoped packages.
    scope: Option<String>,
    /// Bare name without the `generator-` prefix.
    name: String,
    /// Sub-generator after `:`, if any.
    sub_generator: Option<String>,
}

impl GeneratorDescriptor {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ValidationError::new("generatorName", "must not be empty"));
        }
        if input.starts_with('-') || input.chars().any(|c| c.is_whitespace()) {
            return Err(ValidationError::new(
                "generatorName",
                "must be a package name, not a flag or a phrase",
            ));
        }

        let (base, sub_generator) = match input.split_once(':') {
            Some((base, sub)) if !sub.is_empty() => (base, Some(sub.to_string())),
            Some((base, _)) => (base, None),
            None => (input, None),
        };

        let (scope, unscoped) = if base.starts_with('@') {
            match base.split_once('/') {
                Some((scope, rest)) if scope.len() > 1 && !rest.is_empty() => {
                    (Some(scope.to_string()), rest)
                }
                _ => {
                    return Err(ValidationError::new(
                        "generatorName",
                        "scoped names must look like @scope/name",
                    ));
                }
            }
        } else {
            (None, base)
        };

        let name = unscoped.strip_prefix(PACKAGE_PREFIX).unwrap_or(unscoped);
        if name.is_empty() || name.contains('/') {
            return Err(ValidationError::new("generatorName", "must name a single generator"));
        }

        Ok(Self {
            scope,
            name: name.to_string(),
            sub_generator,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// npm package to install, e.g. `generator-webapp`.
    pub fn package_name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}/{}{}", scope, PACKAGE_PREFIX, self.name),
            None => format!("{}{}", PACKAGE_PREFIX, self.name),
        }
    }

    /// First argument handed to `yo`, e.g. `webapp:app`.
    pub fn runner_target(&self) -> String {
        let namespace = match &self.scope {
            Some(scope) => format!("{}/{}", scope, self.name),
            None => self.name.clone(),
        };
        match &self.sub_generator {
            Some(sub) => format!("{}:{}", namespace, sub),
            None => namespace,
        }
    }

    /// Key under which `.yo-rc.json` records this generator.
    pub fn config_key(&self) -> String {
        self.package_name()
    }
}

impl fmt::Display for GeneratorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.runner_target())
    }
}
