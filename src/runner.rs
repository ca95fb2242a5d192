//! Drives a generator from install to classified result.
//!
//! `run` walks these phases, releasing the workspace whatever happens:
//!
//! ```text
//! Provisioning -> Installing -> Introspecting -> PreflightChecking
//!   -> Spawning -> Collecting -> Classifying -> CleaningUp -> Done
//! ```
//!
//! Introspection is best-effort: when help cannot be read the pre-flight
//! check is skipped and the generator runs anyway.

use crate::config::Config;
use crate::descriptor::GeneratorDescriptor;
use crate::error::{DescribeError, InvocationResult, MissingArgument, MissingOption};
use crate::help_parser::{self, HelpInfo};
use crate::installer::GeneratorInstaller;
use crate::introspect::{runner_spec, HelpIntrospector};
use crate::non_interactive;
use crate::process::{ProcessOutput, ProcessRunner};
use crate::request::InvocationRequest;
use crate::requirements;
use crate::sanitize::sanitize;
use crate::workspace::{Workspace, WorkspaceProvisioner};
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// File in which yeoman records the generators that ran in a directory.
pub const YO_RC_FILE: &str = ".yo-rc.json";

const NOT_FOUND_MARKERS: &[&str] = &[
    "Did not find a suitable generator",
    "You don't seem to have a generator with the name",
];

/// Question (`?`) and list-selection (`❯`, `›`, `◯`, `◉`) indicators.
const PROMPT_PREFIXES: &[&str] = &["? ", "❯", "›", "◯", "◉"];

static INVALID_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)invalid version|not a valid (?:semver|version)|invalid semver")
        .expect("valid version regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Provisioning,
    Installing,
    Introspecting,
    PreflightChecking,
    Spawning,
    Collecting,
    Classifying,
    CleaningUp,
    Done,
}

/// Everything `get_generator_options` reports.
///
/// `missing_required` and `missing_options` are the pre-flight report for a
/// call that supplies nothing, so callers see what a run will insist on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorOptions {
    pub generator: String,
    pub package: String,
    pub help_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_error: Option<String>,
    pub usage: String,
    pub args: Vec<help_parser::HelpArgument>,
    pub options: indexmap::IndexMap<String, help_parser::HelpOption>,
    pub required_args: Vec<String>,
    pub required_options: Vec<String>,
    pub missing_required: Vec<MissingArgument>,
    pub missing_options: Vec<MissingOption>,
    pub raw_help: String,
}

impl GeneratorOptions {
    fn new(
        generator: &GeneratorDescriptor,
        help: HelpInfo,
        raw_help: String,
        help_error: Option<String>,
    ) -> Self {
        let report = requirements::check(&help, &[], &BTreeMap::new());
        Self {
            generator: generator.runner_target(),
            package: generator.package_name(),
            help_available: help_error.is_none(),
            help_error,
            usage: help.usage.clone(),
            required_args: help.required_args().map(|a| a.name.clone()).collect(),
            required_options: help.required_options().map(|(name, _)| name.clone()).collect(),
            missing_required: report.missing_required,
            missing_options: report.missing_options,
            args: help.args,
            options: help.options,
            raw_help,
        }
    }
}

pub struct GeneratorRunner {
    provisioner: WorkspaceProvisioner,
    installer: GeneratorInstaller,
    introspector: HelpIntrospector,
    process: Arc<dyn ProcessRunner>,
    run_timeout: Duration,
}

impl GeneratorRunner {
    pub fn new(config: &Config, process: Arc<dyn ProcessRunner>) -> Self {
        Self {
            provisioner: WorkspaceProvisioner::new(config.workspace_dir.clone()),
            installer: GeneratorInstaller::new(
                Arc::clone(&process),
                config.npm_command.clone(),
                config.install_timeout(),
            ),
            introspector: HelpIntrospector::new(Arc::clone(&process), config.help_timeout()),
            process,
            run_timeout: config.run_timeout(),
        }
    }

    /// Installs the generator and parses its help.
    pub async fn describe(
        &self,
        generator: &GeneratorDescriptor,
    ) -> Result<GeneratorOptions, DescribeError> {
        let workspace = self.provisioner.acquire()?;
        let result = self.describe_in(&workspace, generator).await;
        self.provisioner.release(workspace);
        result
    }

    async fn describe_in(
        &self,
        workspace: &Workspace,
        generator: &GeneratorDescriptor,
    ) -> Result<GeneratorOptions, DescribeError> {
        self.installer.ensure_installed(workspace, generator).await?;

        let options = match self.introspector.get_help(generator, workspace).await {
            Ok(raw) => {
                GeneratorOptions::new(generator, help_parser::parse(&raw), sanitize(&raw), None)
            }
            Err(e) => {
                warn!("Help unavailable for {}: {}", generator, e);
                let error = Some(e.to_string());
                GeneratorOptions::new(generator, HelpInfo::default(), String::new(), error)
            }
        };
        Ok(options)
    }

    /// Runs a generator. Known failures come back as `Ok(InvocationResult)`;
    /// `Err` is reserved for faults such as a workspace that cannot be created.
    pub async fn run(&self, request: &InvocationRequest) -> Result<InvocationResult> {
        debug!("{}: {:?}", request.generator, Phase::Provisioning);
        let workspace = self.provisioner.acquire()?;

        let result = self.run_in(&workspace, request).await;

        debug!("{}: {:?}", request.generator, Phase::CleaningUp);
        self.provisioner.release(workspace);
        debug!("{}: {:?}", request.generator, Phase::Done);
        Ok(result)
    }

    async fn run_in(&self, workspace: &Workspace, request: &InvocationRequest) -> InvocationResult {
        let generator = &request.generator;

        debug!("{}: {:?}", generator, Phase::Installing);
        if let Err(e) = self.installer.ensure_installed(workspace, generator).await {
            warn!("{}", e);
            return e.into();
        }

        debug!("{}: {:?}", generator, Phase::Introspecting);
        let help = match self.introspector.get_help(generator, workspace).await {
            Ok(raw) => Some(help_parser::parse(&raw)),
            Err(e) => {
                warn!("Help unavailable for {}, skipping pre-flight check: {}", generator, e);
                None
            }
        };

        debug!("{}: {:?}", generator, Phase::PreflightChecking);
        if let Some(help) = &help {
            let report = requirements::check(help, &request.args, &request.options);
            if !report.is_satisfied() {
                info!(
                    "{}: {} missing argument(s), {} missing option(s), not spawning",
                    generator,
                    report.missing_required.len(),
                    report.missing_options.len()
                );
                return requirements::missing_requirement(
                    generator,
                    help,
                    &request.args,
                    &request.options,
                    report,
                );
            }
        }

        debug!("{}: {:?}", generator, Phase::Spawning);
        let spec =
            runner_spec(workspace, &request.cwd, self.run_timeout).args(generator_args(request));
        info!("Running {}", spec.display());

        debug!("{}: {:?}", generator, Phase::Collecting);
        let output = match self.process.run(&spec).await {
            Ok(output) => output,
            Err(e) => {
                return InvocationResult::UnexpectedError {
                    message: format!("{:#}", e),
                };
            }
        };

        debug!("{}: {:?}", generator, Phase::Classifying);
        let result = classify(request, &output, self.run_timeout);
        info!("{} finished: {}", generator, result.kind());
        result
    }
}

/// `yo` argv after the program: target, positionals, caller flags, then the
/// non-interactive flags the caller did not set.
pub fn generator_args(request: &InvocationRequest) -> Vec<String> {
    let mut args = vec![request.generator.runner_target()];
    args.extend(request.args.iter().cloned());
    args.extend(request.option_flags());
    non_interactive::append_flags(&mut args);
    args
}

/// Lines that look like an unanswered prompt, as they appear in `output`.
pub fn detect_prompts(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            trimmed == "?" || PROMPT_PREFIXES.iter().any(|p| trimmed.starts_with(p))
        })
        .map(str::to_string)
        .collect()
}

/// Classifies a finished run; first match wins:
/// not found, still interactive, invalid version, timed out, non-zero exit,
/// success.
pub fn classify(
    request: &InvocationRequest,
    output: &ProcessOutput,
    timeout: Duration,
) -> InvocationResult {
    let text = sanitize(&output.combined());

    if NOT_FOUND_MARKERS.iter().any(|m| text.contains(m)) {
        return InvocationResult::NotFound {
            generator: request.generator.runner_target(),
            output: text,
        };
    }

    let prompts = detect_prompts(&text);
    if !prompts.is_empty() {
        return InvocationResult::StillInteractive {
            prompts_detected: prompts,
            suggestion: "The generator asked questions that no flag answered. \
                         Pass the answers as options (see get_generator_options) \
                         or choose a generator that supports non-interactive use."
                .to_string(),
            output: text,
        };
    }

    if INVALID_VERSION.is_match(&text) {
        return InvocationResult::InvalidVersionFormat {
            version: request.version.clone().unwrap_or_default(),
            output: text,
        };
    }

    if output.timed_out {
        return InvocationResult::TimedOut {
            timeout_secs: timeout.as_secs(),
            output: text,
        };
    }

    if !output.success() {
        return InvocationResult::GenericFailure {
            exit_code: output.exit_code,
            output: text,
        };
    }

    InvocationResult::Success {
        generator_config_exists: generator_config_exists(&request.cwd, &request.generator),
        output: text,
    }
}

/// Whether `.yo-rc.json` in `cwd` has an entry for the generator. Any read or
/// parse problem counts as "no".
pub fn generator_config_exists(cwd: &Path, generator: &GeneratorDescriptor) -> bool {
    let path = cwd.join(YO_RC_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            debug!("No readable {}: {}", path.display(), e);
            return false;
        }
    };
    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(value) => value.get(generator.config_key()).is_some(),
        Err(e) => {
            debug!("Unparsable {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::mock::MockProcessRunner;
    use std::fs;

    const HELP: &str = "\
Usage:
  yo webapp [options] [<appName>]

Options:
  --help          # Print usage
  --skip-install  # Skip install  Default: false
  --style         # Stylesheet language [css|sass]

Arguments:
  appName  # Application name  Type: String  Required: true
";

    fn request(cwd: &Path, args: &[&str], options: &str) -> InvocationRequest {
        InvocationRequest {
            generator: GeneratorDescriptor::parse("webapp").unwrap(),
            cwd: cwd.to_path_buf(),
            args: args.iter().map(|s| s.to_string()).collect(),
            options: serde_json::from_str(options).unwrap(),
            version: Some("1.0.0".to_string()),
        }
    }

    fn output(exit_code: i32, stdout: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(exit_code),
            stdout: stdout.to_string(),
            ..ProcessOutput::default()
        }
    }

    /// Runner whose workspace already has both packages, so no npm call.
    fn runner_with(
        mock: MockProcessRunner,
        workspace_dir: &Path,
    ) -> (GeneratorRunner, Arc<MockProcessRunner>) {
        fs::create_dir_all(workspace_dir.join("node_modules/yo")).unwrap();
        fs::create_dir_all(workspace_dir.join("node_modules/generator-webapp")).unwrap();
        let config = Config {
            workspace_dir: Some(workspace_dir.to_path_buf()),
            ..Config::default()
        };
        let mock = Arc::new(mock);
        (GeneratorRunner::new(&config, mock.clone()), mock)
    }

    #[test]
    fn test_not_found_wins_regardless_of_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), &[], "{}");
        for code in [0, 1] {
            let out =
                output(code, "Error webapp\n\nDid not find a suitable generator\n? Install it");
            assert_eq!(classify(&req, &out, Duration::from_secs(1)).kind(), "notFound");
        }
    }

    #[test]
    fn test_prompt_lines_are_reported_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), &[], "{}");
        let out = output(0, "Welcome!\n? Your project name (my-app)\n  ❯ React\n    Vue\n");

        match classify(&req, &out, Duration::from_secs(1)) {
            InvocationResult::StillInteractive { prompts_detected, .. } => {
                assert_eq!(prompts_detected, ["? Your project name (my-app)", "  ❯ React"]);
            }
            other => panic!("expected StillInteractive, got {:?}", other),
        }
    }

    #[test]
    fn test_prompt_detection_ignores_question_marks_mid_line() {
        assert!(detect_prompts("Why? Because.\nwhat?").is_empty());
        assert_eq!(detect_prompts("  ? Overwrite package.json?"), ["  ? Overwrite package.json?"]);
    }

    #[test]
    fn test_invalid_version_before_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), &[], "{}");
        let out = output(1, "Error: Invalid Version: banana");

        match classify(&req, &out, Duration::from_secs(1)) {
            InvocationResult::InvalidVersionFormat { version, .. } => assert_eq!(version, "1.0.0"),
            other => panic!("expected InvalidVersionFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_nonzero_exit_is_generic_failure_with_sanitized_output() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), &[], "{}");
        let out = output(2, "\x1b[31mboom\x1b[0m\r\n");

        assert_eq!(
            classify(&req, &out, Duration::from_secs(1)),
            InvocationResult::GenericFailure {
                exit_code: Some(2),
                output: "boom\n".to_string()
            }
        );
    }

    #[test]
    fn test_timeout_without_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), &[], "{}");
        let out = ProcessOutput {
            timed_out: true,
            stdout: "installing...".to_string(),
            ..ProcessOutput::default()
        };
        assert_eq!(classify(&req, &out, Duration::from_secs(9)).kind(), "timedOut");
    }

    #[test]
    fn test_success_reads_yo_rc() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), &[], "{}");

        let result = classify(&req, &output(0, "create index.html"), Duration::from_secs(1));
        assert_eq!(
            result,
            InvocationResult::Success {
                output: "create index.html".to_string(),
                generator_config_exists: false
            }
        );

        let yo_rc = dir.path().join(YO_RC_FILE);
        fs::write(yo_rc, r#"{"generator-webapp": {"appName": "x"}}"#).unwrap();
        match classify(&req, &output(0, ""), Duration::from_secs(1)) {
            InvocationResult::Success {
                generator_config_exists,
                ..
            } => assert!(generator_config_exists),
            other => panic!("expected Success, got {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_yo_rc_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(YO_RC_FILE), "{ not json").unwrap();
        let generator = GeneratorDescriptor::parse("webapp").unwrap();
        assert!(!generator_config_exists(dir.path(), &generator));
    }

    #[test]
    fn test_generator_args_order() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), &["my-app", "1.0.0"], r#"{"style": "sass", "quiet": true}"#);
        let args = generator_args(&req);

        assert_eq!(&args[..5], ["webapp", "my-app", "1.0.0", "--quiet", "--style=sass"]);
        assert_eq!(args.iter().filter(|a| *a == "--quiet").count(), 1);
        assert!(args.contains(&"--no-interactive".to_string()));
    }

    #[tokio::test]
    async fn test_run_aborts_before_spawn_when_requirements_missing() {
        let ws = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        let (runner, mock) = runner_with(MockProcessRunner::new().then(0, HELP, ""), ws.path());

        let result = runner.run(&request(cwd.path(), &[], "{}")).await.unwrap();

        match result {
            InvocationResult::MissingRequirement {
                missing_required,
                missing_options,
                example_command,
                ..
            } => {
                assert_eq!(missing_required[0].name, "appName");
                assert_eq!(missing_options[0].name, "style");
                assert_eq!(example_command, "yo webapp <appName> --style=css");
            }
            other => panic!("expected MissingRequirement, got {:?}", other),
        }
        // only the help call
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_run_spawns_in_cwd_when_satisfied() {
        let ws = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        let mock = MockProcessRunner::new().then(0, HELP, "").then(0, "create README.md\n", "");
        let (runner, mock) = runner_with(mock, ws.path());

        let result = runner
            .run(&request(cwd.path(), &["my-app"], r#"{"style": "css"}"#))
            .await
            .unwrap();

        assert!(result.is_success());
        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].cwd, cwd.path());
        assert_eq!(calls[1].program, ws.path().join("node_modules/.bin/yo"));
        assert!(calls[1].args.contains(&"--style=css".to_string()));
        assert!(calls[1].env.contains(&("NO_COLOR".to_string(), "1".to_string())));
    }

    #[tokio::test]
    async fn test_run_proceeds_without_help() {
        let ws = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        let mock = MockProcessRunner::new().then(1, "", "help exploded").then(0, "done", "");
        let (runner, mock) = runner_with(mock, ws.path());

        let result = runner.run(&request(cwd.path(), &[], "{}")).await.unwrap();

        assert!(result.is_success());
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_run_reports_spawn_failure_as_unexpected() {
        let ws = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        let mock = MockProcessRunner::new().then(0, "", "").then_spawn_error("permission denied");
        let (runner, _) = runner_with(mock, ws.path());

        match runner.run(&request(cwd.path(), &[], "{}")).await.unwrap() {
            InvocationResult::UnexpectedError { message } => {
                assert!(message.contains("permission denied"))
            }
            other => panic!("expected UnexpectedError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_removes_disposable_workspace() {
        let cwd = tempfile::tempdir().unwrap();
        let mock = MockProcessRunner::new()
            .then(0, "", "")
            .then(0, "", "")
            .then_spawn_error("permission denied");
        let mock = Arc::new(mock);
        let runner = GeneratorRunner::new(&Config::default(), mock.clone());

        let result = runner.run(&request(cwd.path(), &[], "{}")).await.unwrap();

        assert_eq!(result.kind(), "unexpectedError");
        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        assert!(!calls[0].cwd.exists());
    }

    #[tokio::test]
    async fn test_missing_requirement_removes_disposable_workspace() {
        let cwd = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockProcessRunner::new().then(0, "", "").then(0, HELP, ""));
        let runner = GeneratorRunner::new(&Config::default(), mock.clone());

        let result = runner.run(&request(cwd.path(), &[], "{}")).await.unwrap();

        assert_eq!(result.kind(), "missingRequirement");
        let calls = mock.calls();
        assert_eq!(calls.len(), 2, "install and help only");
        assert!(!calls[0].cwd.exists());
    }

    #[tokio::test]
    async fn test_run_install_failure_is_structured() {
        let cwd = tempfile::tempdir().unwrap();
        let config = Config::default();
        let mock = Arc::new(MockProcessRunner::new().then(1, "", "E404"));
        let runner = GeneratorRunner::new(&config, mock.clone());

        let result = runner.run(&request(cwd.path(), &[], "{}")).await.unwrap();

        assert_eq!(result.kind(), "installFailed");
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].cwd.exists());
    }

    #[tokio::test]
    async fn test_describe_reports_help() {
        let ws = tempfile::tempdir().unwrap();
        let (runner, _) = runner_with(MockProcessRunner::new().then(0, HELP, ""), ws.path());
        let generator = GeneratorDescriptor::parse("webapp").unwrap();

        let options = runner.describe(&generator).await.unwrap();

        assert!(options.help_available);
        assert_eq!(options.package, "generator-webapp");
        assert_eq!(options.required_args, ["appName"]);
        assert_eq!(options.required_options, ["style"]);
        assert_eq!(options.options["style"].enum_values.as_ref().unwrap(), &["css", "sass"]);
        assert_eq!(options.missing_required[0].name, "appName");
        assert_eq!(options.missing_options[0].name, "style");
        assert!(options.missing_options[0].enum_values.is_some());
    }

    #[tokio::test]
    async fn test_describe_degrades_when_help_fails() {
        let ws = tempfile::tempdir().unwrap();
        let (runner, _) = runner_with(MockProcessRunner::new().then(1, "", "nope"), ws.path());
        let generator = GeneratorDescriptor::parse("webapp").unwrap();

        let options = runner.describe(&generator).await.unwrap();

        assert!(!options.help_available);
        assert!(options.help_error.unwrap().contains("nope"));
        assert!(options.options.is_empty());
    }
}
