//! Signals that push `yo` and generators into unattended mode.
//!
//! No single switch is honoured by every generator author, so all of these are
//! applied together on every generator and help invocation.

/// An environment variable and the behaviour it is meant to trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvSignal {
    pub name: &'static str,
    pub value: &'static str,
    pub effect: &'static str,
}

pub const NON_INTERACTIVE_ENV: &[EnvSignal] = &[
    EnvSignal {
        name: "CI",
        value: "true",
        effect: "generic unattended-run marker honoured by inquirer and most CLIs",
    },
    EnvSignal { name: "CONTINUOUS_INTEGRATION", value: "true", effect: "legacy CI marker" },
    EnvSignal {
        name: "YEOMAN_NON_INTERACTIVE",
        value: "true",
        effect: "ask generators to skip prompts",
    },
    EnvSignal {
        name: "YO_NON_INTERACTIVE",
        value: "true",
        effect: "ask the yo runner to skip prompts",
    },
    EnvSignal { name: "SKIP_INSTALL", value: "true", effect: "skip dependency installation" },
    EnvSignal {
        name: "YEOMAN_SKIP_INSTALL",
        value: "true",
        effect: "skip dependency installation (yeoman-environment)",
    },
    EnvSignal { name: "NPM_CONFIG_YES", value: "true", effect: "auto-confirm npm/npx prompts" },
    EnvSignal {
        name: "npm_config_yes",
        value: "true",
        effect: "auto-confirm npm/npx prompts (lowercase form)",
    },
    EnvSignal {
        name: "NO_UPDATE_NOTIFIER",
        value: "1",
        effect: "suppress update-notifier banners",
    },
    EnvSignal { name: "YO_INSIGHT", value: "false", effect: "disable the insight opt-in prompt" },
    EnvSignal { name: "NO_COLOR", value: "1", effect: "disable ANSI colour" },
    EnvSignal { name: "FORCE_COLOR", value: "0", effect: "disable chalk colour detection" },
    EnvSignal { name: "TERM", value: "dumb", effect: "disable cursor control and spinners" },
];

/// Flags appended to every generator run unless the caller already passed them.
pub const NON_INTERACTIVE_FLAGS: &[&str] = &[
    "--skip-install",
    "--skip-cache",
    "--force-yes",
    "--yes",
    "--no-color",
    "--no-insight",
    "--quiet",
    "--no-interactive",
];

/// The environment as `(name, value)` pairs.
pub fn env_pairs() -> impl Iterator<Item = (&'static str, &'static str)> {
    NON_INTERACTIVE_ENV.iter().map(|s| (s.name, s.value))
}

/// Appends every non-interactive flag that is not already present, matching
/// on the flag name so `--quiet=false` from the caller also counts.
pub fn append_flags(args: &mut Vec<String>) {
    for flag in NON_INTERACTIVE_FLAGS {
        let present = args
            .iter()
            .any(|a| a == flag || a.strip_prefix(flag).is_some_and(|rest| rest.starts_with('=')));
        if !present {
            args.push(flag.to_string());
        }
    }
}
