//! The three callable tools: parameter shapes, validation and dispatch.

use crate::config::Config;
use crate::descriptor::GeneratorDescriptor;
use crate::error::{DescribeError, InvocationResult, ValidationError};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::process::{ProcessRunner, SystemProcessRunner};
use crate::registry::{self, RegistrySearch};
use crate::request::{InvocationRequest, OptionValue};
use crate::runner::GeneratorRunner;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub const SEARCH_TEMPLATES: &str = "search_templates";
pub const GET_GENERATOR_OPTIONS: &str = "get_generator_options";
pub const RUN_GENERATOR: &str = "run_generator";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: SEARCH_TEMPLATES,
            description: "Search the npm registry for yeoman generators by keyword.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Comma-separated keywords, e.g. \"react,typescript\""
                    },
                    "size": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": registry::MAX_SIZE,
                        "default": registry::DEFAULT_SIZE
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: GET_GENERATOR_OPTIONS,
            description: "Install a generator and describe its arguments and options, \
                          including which ones must be supplied.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "generatorName": {
                        "type": "string",
                        "description": "e.g. \"webapp\", \"generator-webapp\", \"webapp:app\" \
                                        or \"@scope/generator-x\""
                    }
                },
                "required": ["generatorName"]
            }),
        },
        ToolDefinition {
            name: RUN_GENERATOR,
            description: "Run a generator non-interactively in an existing directory. \
                          appName and version are passed as the first positional arguments.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "generatorName": { "type": "string" },
                    "cwd": {
                        "type": "string",
                        "description": "Existing directory to generate into"
                    },
                    "appName": { "type": "string" },
                    "version": { "type": "string" },
                    "args": { "type": "array", "items": { "type": "string" } },
                    "options": {
                        "type": "object",
                        "additionalProperties": { "type": ["string", "boolean", "number", "null"] }
                    }
                },
                "required": ["generatorName", "cwd", "appName", "version"]
            }),
        },
    ]
}

/// Structured tool result; `is_error` marks a diagnosed failure, not a fault.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub value: Value,
    pub is_error: bool,
}

impl ToolOutput {
    /// `tools/call` result body.
    pub fn to_call_result(&self) -> Value {
        let text = serde_json::to_string_pretty(&self.value)
            .unwrap_or_else(|_| self.value.to_string());
        json!({
            "content": [{ "type": "text", "text": text }],
            "isError": self.is_error,
        })
    }
}

impl From<InvocationResult> for ToolOutput {
    fn from(result: InvocationResult) -> Self {
        Self {
            is_error: !result.is_success(),
            value: result.to_json(),
        }
    }
}

fn arguments_object(arguments: &Value) -> Result<Map<String, Value>, ValidationError> {
    match arguments {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        _ => Err(ValidationError::new("arguments", "must be an object")),
    }
}

fn required_string(args: &Map<String, Value>, field: &str) -> Result<String, ValidationError> {
    match args.get(field) {
        None | Some(Value::Null) => Err(ValidationError::new(field, "is required")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ValidationError::new(field, "must not be empty"))
        }
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::new(field, "must be a string")),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub query: String,
    pub size: u32,
}

impl SearchParams {
    pub fn parse(arguments: &Value) -> Result<Self, ValidationError> {
        let args = arguments_object(arguments)?;
        let query = required_string(&args, "query")?;
        if registry::split_keywords(&query).is_empty() {
            return Err(ValidationError::new("query", "must contain at least one keyword"));
        }

        let size = match args.get("size") {
            None | Some(Value::Null) => registry::DEFAULT_SIZE,
            Some(value) => value
                .as_u64()
                .filter(|n| (1..=registry::MAX_SIZE as u64).contains(n))
                .map(|n| n as u32)
                .ok_or_else(|| {
                    let constraint =
                        format!("must be an integer between 1 and {}", registry::MAX_SIZE);
                    ValidationError::new("size", constraint)
                })?,
        };

        Ok(Self { query, size })
    }
}

pub fn parse_generator(arguments: &Value) -> Result<GeneratorDescriptor, ValidationError> {
    let args = arguments_object(arguments)?;
    GeneratorDescriptor::parse(&required_string(&args, "generatorName")?)
}

pub fn parse_run_request(arguments: &Value) -> Result<InvocationRequest, ValidationError> {
    let args = arguments_object(arguments)?;
    let generator = GeneratorDescriptor::parse(&required_string(&args, "generatorName")?)?;

    let cwd = PathBuf::from(required_string(&args, "cwd")?);
    if !cwd.is_dir() {
        return Err(ValidationError::new(
            "cwd",
            format!("must be an existing directory ({} not found)", cwd.display()),
        ));
    }

    let app_name = required_string(&args, "appName")?;
    let version = required_string(&args, "version")?;

    let extra_args = match args.get("args") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ValidationError::new(&format!("args[{}]", i), "must be a string")
                    })
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(ValidationError::new("args", "must be an array of strings")),
    };

    let options = match args.get("options") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| {
                serde_json::from_value::<OptionValue>(value.clone())
                    .map(|v| (key.clone(), v))
                    .map_err(|_| {
                        ValidationError::new(
                            &format!("options.{}", key),
                            "must be a string, boolean, number or null",
                        )
                    })
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(ValidationError::new("options", "must be an object")),
    };

    Ok(InvocationRequest::new(
        generator,
        cwd,
        Some(&app_name),
        Some(&version),
        extra_args,
        options,
    ))
}

pub struct ToolRouter {
    runner: GeneratorRunner,
    registry: RegistrySearch,
}

impl ToolRouter {
    pub fn new(config: &Config) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(SystemProcessRunner),
            Arc::new(ReqwestHttpClient::new()),
        )
    }

    pub fn with_collaborators(
        config: &Config,
        process: Arc<dyn ProcessRunner>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            runner: GeneratorRunner::new(config, process),
            registry: RegistrySearch::new(http, config.registry_url.clone()),
        }
    }

    pub async fn call(&self, name: &str, arguments: &Value) -> Result<ToolOutput, ToolError> {
        info!("Tool call: {}", name);
        match name {
            SEARCH_TEMPLATES => {
                let params = SearchParams::parse(arguments)?;
                let results = self.registry.search(&params.query, params.size).await?;
                Ok(ToolOutput {
                    value: json!({
                        "query": params.query,
                        "count": results.len(),
                        "results": results,
                    }),
                    is_error: false,
                })
            }
            GET_GENERATOR_OPTIONS => {
                let generator = parse_generator(arguments)?;
                match self.runner.describe(&generator).await {
                    Ok(options) => Ok(ToolOutput {
                        value: serde_json::to_value(options).map_err(anyhow::Error::from)?,
                        is_error: false,
                    }),
                    Err(DescribeError::Install(e)) => Ok(InvocationResult::from(e).into()),
                    Err(DescribeError::Unexpected(e)) => Err(ToolError::Unexpected(e)),
                }
            }
            RUN_GENERATOR => {
                let request = parse_run_request(arguments)?;
                let result = self.runner.run(&request).await?;
                Ok(result.into())
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::mock::MockHttpClient;
    use crate::process::mock::MockProcessRunner;

    fn router(process: MockProcessRunner, http: MockHttpClient) -> ToolRouter {
        ToolRouter::with_collaborators(&Config::default(), Arc::new(process), Arc::new(http))
    }

    fn field_of(err: ValidationError) -> String {
        err.field
    }

    #[test]
    fn test_definitions_cover_three_tools() {
        let names: Vec<_> = definitions().iter().map(|d| d.name).collect();
        assert_eq!(names, [SEARCH_TEMPLATES, GET_GENERATOR_OPTIONS, RUN_GENERATOR]);
        let json = serde_json::to_value(&definitions()[2]).unwrap();
        assert_eq!(json["inputSchema"]["required"][1], "cwd");
    }

    #[test]
    fn test_search_params() {
        let params = SearchParams::parse(&json!({"query": "react"})).unwrap();
        assert_eq!(params.size, 20);

        assert_eq!(field_of(SearchParams::parse(&json!({})).unwrap_err()), "query");
        assert_eq!(field_of(SearchParams::parse(&json!({"query": " , "})).unwrap_err()), "query");
        let err = SearchParams::parse(&json!({"query": "x", "size": 251})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'size': must be an integer between 1 and 250"
        );
        assert!(SearchParams::parse(&json!({"query": "x", "size": 0})).is_err());
        assert!(SearchParams::parse(&json!({"query": "x", "size": "5"})).is_err());
    }

    #[test]
    fn test_run_request_requires_existing_cwd() {
        let err = parse_run_request(&json!({
            "generatorName": "webapp",
            "cwd": "/definitely/not/here",
            "appName": "a",
            "version": "1.0.0"
        }))
        .unwrap_err();
        assert_eq!(err.field, "cwd");
    }

    #[test]
    fn test_run_request_shape() {
        let dir = tempfile::tempdir().unwrap();
        let request = parse_run_request(&json!({
            "generatorName": "generator-webapp",
            "cwd": dir.path(),
            "appName": "my-app",
            "version": "0.1.0",
            "args": ["extra"],
            "options": {"style": "sass", "babel": true}
        }))
        .unwrap();

        assert_eq!(request.generator.package_name(), "generator-webapp");
        assert_eq!(request.args, ["my-app", "0.1.0", "extra"]);
        assert_eq!(request.options["babel"], OptionValue::Bool(true));
    }

    #[test]
    fn test_run_request_rejects_bad_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let base = |patch: Value| {
            let mut args = json!({
                "generatorName": "webapp",
                "cwd": dir.path(),
                "appName": "a",
                "version": "1"
            });
            for (k, v) in patch.as_object().unwrap() {
                args[k] = v.clone();
            }
            parse_run_request(&args).unwrap_err().field
        };

        assert_eq!(base(json!({"appName": ""})), "appName");
        assert_eq!(base(json!({"version": 1})), "version");
        assert_eq!(base(json!({"args": ["ok", 3]})), "args[1]");
        assert_eq!(base(json!({"options": {"nested": {"a": 1}}})), "options.nested");
        assert_eq!(base(json!({"generatorName": "-bad"})), "generatorName");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let router = router(MockProcessRunner::new(), MockHttpClient::new("{}"));
        let err = router.call("delete_everything", &json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_subprocess() {
        let process = Arc::new(MockProcessRunner::new());
        let router = ToolRouter::with_collaborators(
            &Config::default(),
            process.clone(),
            Arc::new(MockHttpClient::new("{}")),
        );

        let err = router
            .call(RUN_GENERATOR, &json!({"generatorName": "webapp"}))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Validation(_)));
        assert!(process.calls().is_empty());
    }

    #[tokio::test]
    async fn test_search_tool_output() {
        let body = concat!(
            r#"{"objects":[{"package":{"name":"generator-node","#,
            r#""keywords":["yeoman-generator"]}}]}"#,
        );
        let router = router(MockProcessRunner::new(), MockHttpClient::new(body));

        let output = router.call(SEARCH_TEMPLATES, &json!({"query": "node"})).await.unwrap();

        assert!(!output.is_error);
        assert_eq!(output.value["count"], 1);
        assert_eq!(output.value["results"][0]["author"], "Unknown");
    }

    #[tokio::test]
    async fn test_options_install_failure_is_error_result() {
        let mut process = MockProcessRunner::new();
        process.programs_present = false;
        let router = router(process, MockHttpClient::new("{}"));

        let output = router
            .call(GET_GENERATOR_OPTIONS, &json!({"generatorName": "webapp"}))
            .await
            .unwrap();

        assert!(output.is_error);
        assert_eq!(output.value["kind"], "installFailed");
        assert_eq!(output.value["package"], "generator-webapp");
    }

    #[test]
    fn test_call_result_shape() {
        let output = ToolOutput::from(InvocationResult::UnexpectedError {
            message: "boom".to_string(),
        });
        let result = output.to_call_result();

        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["type"], "text");
        let text = result["content"][0]["text"].as_str().unwrap();
        let text: Value = serde_json::from_str(text).unwrap();
        assert_eq!(text["message"], "boom");
    }
}
