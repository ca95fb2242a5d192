//! Turns free-form `yo <generator> --help` output into [`HelpInfo`].
//!
//! The format belongs to yeoman-environment and to individual generator
//! authors, so everything here is pattern matching over text that may change
//! between versions. [`parse`] is total: sections it cannot find come back as
//! empty collections and unmatched lines are skipped.
//!
//! A typical input:
//!
//! ```text
//! Usage:
//!   yo webapp:app [options] [<appName>]
//!
//! Options:
//!   -h,   --help          # Print the generator's options and usage
//!         --skip-install  # Do not automatically install dependencies  Default: false
//!         --style         # Stylesheet language [css|sass]
//!
//! Arguments:
//!   appName  # Your application name  Type: String  Required: true
//! ```
//!
//! `required` on options is a heuristic, see [`classify_required`].

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HelpArgument {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: String,
    pub required: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpOption {
    /// The flag as it appears on the command line, e.g. `--skip-install`.
    pub flag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

/// Parsed requirements of a generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HelpInfo {
    /// The usage line, empty when none was found.
    pub usage: String,
    /// Positional arguments in order.
    pub args: Vec<HelpArgument>,
    /// Options keyed by name without leading dashes, in order of appearance.
    pub options: IndexMap<String, HelpOption>,
}

impl HelpInfo {
    pub fn required_args(&self) -> impl Iterator<Item = &HelpArgument> {
        self.args.iter().filter(|a| a.required)
    }

    pub fn required_options(&self) -> impl Iterator<Item = (&String, &HelpOption)> {
        self.options.iter().filter(|(_, o)| o.required)
    }
}

/// Control flags that never need a value from the caller.
pub const NEVER_REQUIRED: &[&str] = &[
    "help",
    "version",
    "skip-install",
    "skip-cache",
    "skip-git",
    "skip-welcome-message",
    "skip-message",
    "skip-checks",
    "force",
    "force-install",
    "force-yes",
    "yes",
    "quiet",
    "verbose",
    "debug",
    "dry-run",
    "bail",
    "color",
    "no-color",
    "insight",
    "no-insight",
    "no-interactive",
    "ask-answered",
    "local-config-only",
];

/// Name fragments that usually mean "this is answered by a prompt".
pub const IDENTITY_TOKENS: &[&str] = &[
    "name", "author", "email", "style", "client", "framework", "language", "license",
];

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z ]{0,30}):\s*(.*)$").expect("valid header regex")
});

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Za-z_][\w.-]*)>").expect("valid placeholder regex"));

static ARGUMENT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+([A-Za-z_][\w.-]*)(?:\s+(.*))?$").expect("valid argument regex"));

static OPTION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:-([A-Za-z0-9]),?\s+)?--([A-Za-z0-9][\w-]*)(?:\s+(.*))?$")
        .expect("valid option regex")
});

static TYPE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bType:\s*([\w\[\]]+)").expect("valid type regex"));

static REQUIRED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bRequired:\s*(true|false)\b").expect("valid required regex"));

static DEFAULT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bDefault:\s*(.*?)\s*$").expect("valid default regex"));

static ENUM_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\[\]|]+(?:\|[^\[\]|]+)+)\]").expect("valid enum regex"));

static OPTIONAL_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)required:\s*false|not required|\(optional\)|\boptional\b")
        .expect("valid optional regex")
});

static REQUIRED_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)required:\s*true|\(required\)|\brequired\b")
        .expect("valid required-word regex")
});

static DEFAULT_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)default:|\(default\b|defaults to").expect("valid default-word regex")
});

static PROMPT_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(enter|specify|provide)\b").expect("valid prompt regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Preamble,
    Usage,
    Options,
    Arguments,
    Questions,
    Other,
}

#[derive(Debug)]
struct Section<'a> {
    kind: SectionKind,
    /// Text after the header's colon, e.g. `yo webapp` in `Usage: yo webapp`.
    inline: &'a str,
    lines: Vec<&'a str>,
}

impl Section<'_> {
    fn text(&self) -> String {
        let mut parts = vec![self.inline];
        parts.extend(self.lines.iter().copied());
        parts.join("\n")
    }
}

fn classify_header(name: &str) -> SectionKind {
    let name = name.trim().to_ascii_lowercase();
    match name.as_str() {
        "usage" => SectionKind::Usage,
        "options" | "flags" | "global options" | "generator options" => SectionKind::Options,
        "arguments" | "args" | "positional arguments" => SectionKind::Arguments,
        _ if ["question", "prompt", "input"].iter().any(|w| name.contains(w)) => {
            SectionKind::Questions
        }
        _ => SectionKind::Other,
    }
}

fn split_sections(text: &str) -> Vec<Section<'_>> {
    let mut sections = vec![Section {
        kind: SectionKind::Preamble,
        inline: "",
        lines: Vec::new(),
    }];

    for line in text.lines() {
        let header = HEADER
            .captures(line)
            .filter(|_| !line.starts_with(char::is_whitespace));
        match header {
            Some(caps) => {
                let name = caps.get(1).map_or("", |m| m.as_str());
                let inline = caps.get(2).map_or("", |m| m.as_str());
                sections.push(Section {
                    kind: classify_header(name),
                    inline,
                    lines: Vec::new(),
                });
            }
            None => {
                if let Some(current) = sections.last_mut() {
                    current.lines.push(line);
                }
            }
        }
    }
    sections
}

/// Parses help text. Never fails; deterministic for a given input.
pub fn parse(raw: &str) -> HelpInfo {
    let text = crate::sanitize::sanitize(raw);
    let sections = split_sections(&text);
    let find = |kind: SectionKind| sections.iter().find(|s| s.kind == kind);

    let mut info = HelpInfo::default();

    let usage = find(SectionKind::Usage)
        .and_then(|s| {
            std::iter::once(s.inline)
                .chain(s.lines.iter().copied())
                .map(str::trim)
                .find(|l| !l.is_empty())
        })
        .or_else(|| text.lines().map(str::trim).find(|l| l.starts_with("yo ")))
        .unwrap_or("");
    info.usage = usage.to_string();
    seed_args_from_usage(&mut info.args, usage);

    if let Some(section) = find(SectionKind::Arguments) {
        for line in &section.lines {
            merge_argument_line(&mut info.args, line);
        }
    }

    if let Some(section) = find(SectionKind::Options) {
        for line in &section.lines {
            if let Some((name, option)) = parse_option_line(line) {
                info.options.entry(name).or_insert(option);
            }
        }
    }

    if let Some(section) = find(SectionKind::Questions) {
        apply_questions(&mut info.options, &section.text());
    }

    info
}

fn seed_args_from_usage(args: &mut Vec<HelpArgument>, usage: &str) {
    for caps in PLACEHOLDER.captures_iter(usage) {
        let name = &caps[1];
        if args.iter().any(|a| a.name == name) {
            continue;
        }
        args.push(HelpArgument {
            name: name.to_string(),
            arg_type: "String".to_string(),
            required: false,
            description: String::new(),
        });
    }
}

fn merge_argument_line(args: &mut Vec<HelpArgument>, line: &str) {
    let Some(caps) = ARGUMENT_LINE.captures(line) else {
        return;
    };
    let name = &caps[1];
    let rest = caps.get(2).map_or("", |m| m.as_str());

    let is_entry = rest.is_empty()
        || rest.trim_start().starts_with('#')
        || TYPE_MARKER.is_match(rest)
        || REQUIRED_MARKER.is_match(rest);
    if !is_entry {
        return;
    }

    let arg_type = TYPE_MARKER.captures(rest).map(|c| c[1].to_string());
    let required = REQUIRED_MARKER
        .captures(rest)
        .map(|c| c[1].eq_ignore_ascii_case("true"));
    let stripped = REQUIRED_MARKER.replace_all(&TYPE_MARKER.replace_all(rest, ""), "").into_owned();
    let description = clean_description(&stripped);

    match args.iter_mut().find(|a| a.name == name) {
        Some(existing) => {
            if let Some(arg_type) = arg_type {
                existing.arg_type = arg_type;
            }
            if let Some(required) = required {
                existing.required = required;
            }
            if !description.is_empty() {
                existing.description = description;
            }
        }
        None => args.push(HelpArgument {
            name: name.to_string(),
            arg_type: arg_type.unwrap_or_else(|| "String".to_string()),
            required: required.unwrap_or(false),
            description,
        }),
    }
}

fn parse_option_line(line: &str) -> Option<(String, HelpOption)> {
    let caps = OPTION_LINE.captures(line)?;
    let alias = caps.get(1).map(|m| format!("-{}", m.as_str()));
    let name = caps[2].to_string();
    let rest = caps.get(3).map_or("", |m| m.as_str());

    let (description_part, default) = match DEFAULT_MARKER.captures(rest) {
        Some(c) => {
            let start = c.get(0).map_or(rest.len(), |m| m.start());
            let value = c[1].trim().to_string();
            (&rest[..start], Some(value).filter(|v| !v.is_empty()))
        }
        None => (rest, None),
    };
    let description = clean_description(description_part);
    let enum_values = extract_enum_values(&description);
    let required = classify_required(&name, &description, default.is_some(), enum_values.is_some());

    Some((
        name.clone(),
        HelpOption {
            flag: format!("--{}", name),
            alias,
            description,
            default,
            required,
            enum_values,
        },
    ))
}

fn clean_description(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('#').trim();
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `[a|b|c]` list in a description.
pub fn extract_enum_values(description: &str) -> Option<Vec<String>> {
    let caps = ENUM_LIST.captures(description)?;
    let values: Vec<String> = caps[1]
        .split('|')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    (values.len() > 1).then_some(values)
}

pub fn is_never_required(name: &str) -> bool {
    NEVER_REQUIRED.contains(&name.to_ascii_lowercase().as_str())
}

/// Decides whether an option must be supplied, first rule that applies wins:
///
/// 1. control flags in [`NEVER_REQUIRED`] are optional
/// 2. a default value (parsed, or mentioned in the description) means optional
/// 3. explicit "required"/"optional" wording in the description
/// 4. a name containing one of [`IDENTITY_TOKENS`] is required
/// 5. a `?` or "enter/specify/provide" in the description is required
/// 6. an enumerated choice list is required
/// 7. otherwise optional
pub fn classify_required(name: &str, description: &str, has_default: bool, has_enum: bool) -> bool {
    if is_never_required(name) {
        return false;
    }
    if has_default || DEFAULT_WORDS.is_match(description) {
        return false;
    }
    if OPTIONAL_WORDS.is_match(description) {
        return false;
    }
    if REQUIRED_WORDS.is_match(description) {
        return true;
    }
    let lower = name.to_ascii_lowercase();
    if IDENTITY_TOKENS.iter().any(|token| lower.contains(token)) {
        return true;
    }
    if description.contains('?') || PROMPT_WORDS.is_match(description) {
        return true;
    }
    has_enum
}

/// Options named in a questions/prompts section are answered by prompts, so
/// they must be passed as flags. Control flags and defaulted options keep
/// their classification.
fn apply_questions(options: &mut IndexMap<String, HelpOption>, section_text: &str) {
    for (name, option) in options.iter_mut() {
        if is_never_required(name) || option.default.is_some() {
            continue;
        }
        let candidates = [name.clone(), crate::requirements::camel_case(name)];
        let mentioned = candidates.iter().any(|candidate| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(candidate)))
                .map(|re| re.is_match(section_text))
                .unwrap_or(false)
        });
        if mentioned {
            option.required = true;
        }
    }
}
