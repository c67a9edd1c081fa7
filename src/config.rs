//! Custom-rule configuration: loading, validation, and scope merging.
//!
//! Two scopes exist: user (`~/.cc-safety-net/config.json`) and project
//! (`<cwd>/.safety-net.json`). The hook degrades silently to built-in rules
//! when a file is missing or invalid; the `verify-config` binary surfaces
//! the errors.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// A single custom blocking rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomRule {
    pub name: String,
    pub command: String,
    pub subcommand: Option<String>,
    pub block_args: Vec<String>,
    pub reason: String,
}

/// Loaded configuration with custom rules.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub version: u32,
    pub rules: Vec<CustomRule>,
}

/// Validation failure with one message per problem found.
#[derive(Debug, Error)]
#[error("{}", .errors.join("; "))]
pub struct ConfigError {
    pub errors: Vec<String>,
}

/// Result of validating a config file for reporting purposes.
#[derive(Debug)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    /// Empty when errors exist.
    pub rule_names: Vec<String>,
}

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]{0,63}$").unwrap());
static COMMAND_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").unwrap());
const MAX_REASON_LENGTH: usize = 256;

pub fn user_config_path(home: &Path) -> PathBuf {
    home.join(".cc-safety-net").join("config.json")
}

pub fn project_config_path(cwd: &Path) -> PathBuf {
    cwd.join(".safety-net.json")
}

fn validate_rule(
    rule: &Value,
    index: usize,
    seen_names: &mut HashSet<String>,
) -> Result<CustomRule, ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    for field in ["name", "command", "block_args", "reason"] {
        if rule.get(field).is_none() {
            errors.push(format!("rules[{index}]: missing required field '{field}'"));
        }
    }
    if !errors.is_empty() {
        return Err(ConfigError { errors });
    }

    let name = &rule["name"];
    let command = &rule["command"];
    let subcommand = rule.get("subcommand");
    let block_args = &rule["block_args"];
    let reason = &rule["reason"];

    match name.as_str() {
        None => errors.push(format!("rules[{index}].name: must be a string")),
        Some(name) if !NAME_PATTERN.is_match(name) => errors.push(format!(
            "rules[{index}].name: must match pattern ^[a-zA-Z][a-zA-Z0-9_-]{{0,63}}$"
        )),
        Some(name) => {
            let lower = name.to_lowercase();
            if !seen_names.insert(lower) {
                errors.push(format!("rules[{index}].name: duplicate rule name '{name}'"));
            }
        }
    }

    match command.as_str() {
        None => errors.push(format!("rules[{index}].command: must be a string")),
        Some(command) if !COMMAND_PATTERN.is_match(command) => errors.push(format!(
            "rules[{index}].command: must match pattern ^[a-zA-Z][a-zA-Z0-9_-]*$"
        )),
        Some(_) => {}
    }

    if let Some(sub) = subcommand.filter(|v| !v.is_null()) {
        match sub.as_str() {
            None => errors.push(format!("rules[{index}].subcommand: must be a string")),
            Some(sub) if !COMMAND_PATTERN.is_match(sub) => errors.push(format!(
                "rules[{index}].subcommand: must match pattern ^[a-zA-Z][a-zA-Z0-9_-]*$"
            )),
            Some(_) => {}
        }
    }

    match block_args.as_array() {
        None => errors.push(format!("rules[{index}].block_args: must be an array")),
        Some(args) if args.is_empty() => {
            errors.push(format!("rules[{index}].block_args: must not be empty"));
        }
        Some(args) => {
            for (i, arg) in args.iter().enumerate() {
                match arg.as_str() {
                    None => errors.push(format!("rules[{index}].block_args[{i}]: must be a string")),
                    Some("") => {
                        errors.push(format!("rules[{index}].block_args[{i}]: must not be empty"));
                    }
                    Some(_) => {}
                }
            }
        }
    }

    match reason.as_str() {
        None => errors.push(format!("rules[{index}].reason: must be a string")),
        Some("") => errors.push(format!("rules[{index}].reason: must not be empty")),
        Some(reason) if reason.chars().count() > MAX_REASON_LENGTH => errors.push(format!(
            "rules[{index}].reason: exceeds max length of {MAX_REASON_LENGTH}"
        )),
        Some(_) => {}
    }

    if !errors.is_empty() {
        return Err(ConfigError { errors });
    }

    Ok(CustomRule {
        name: name.as_str().unwrap().to_string(),
        command: command.as_str().unwrap().to_string(),
        subcommand: subcommand
            .filter(|v| !v.is_null())
            .and_then(Value::as_str)
            .map(str::to_string),
        block_args: block_args
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        reason: reason.as_str().unwrap().to_string(),
    })
}

/// Validate a parsed config document against the schema.
pub fn validate_config(data: &Value) -> Result<Config, ConfigError> {
    let err = |msg: String| ConfigError { errors: vec![msg] };

    let version = data
        .get("version")
        .ok_or_else(|| err("missing required field 'version'".to_string()))?;
    if !version.is_i64() && !version.is_u64() {
        return Err(err("'version' must be an integer".to_string()));
    }
    let version = version.as_i64().unwrap_or_default();
    if version != 1 {
        return Err(err(format!("unsupported version {version}, expected 1")));
    }

    let empty = Value::Array(vec![]);
    let rules_data = data.get("rules").unwrap_or(&empty);
    let rules_data = rules_data
        .as_array()
        .ok_or_else(|| err("'rules' must be an array".to_string()))?;

    let mut seen_names: HashSet<String> = HashSet::new();
    let mut rules: Vec<CustomRule> = Vec::new();
    for (i, rule) in rules_data.iter().enumerate() {
        if !rule.is_object() {
            return Err(err(format!("rules[{i}]: must be an object")));
        }
        rules.push(validate_rule(rule, i, &mut seen_names)?);
    }

    Ok(Config { version: 1, rules })
}

/// Load one scope file. Missing, unreadable, or invalid files yield `None`.
pub fn load_scope(path: &Path) -> Option<Config> {
    if !path.exists() {
        return None;
    }
    let content = fs::read_to_string(path).ok()?;
    if content.trim().is_empty() {
        return None;
    }
    let data: Value = serde_json::from_str(&content).ok()?;
    if !data.is_object() {
        return None;
    }
    validate_config(&data).ok()
}

/// Merge user and project scopes: project rules override user rules sharing
/// the same case-folded name.
pub fn merge_configs(user: Option<Config>, project: Option<Config>) -> Config {
    match (user, project) {
        (None, None) => Config::default(),
        (None, Some(project)) => project,
        (Some(user), None) => user,
        (Some(user), Some(project)) => {
            let overridden: HashSet<String> =
                project.rules.iter().map(|r| r.name.to_lowercase()).collect();
            let mut rules: Vec<CustomRule> = user
                .rules
                .into_iter()
                .filter(|r| !overridden.contains(&r.name.to_lowercase()))
                .collect();
            rules.extend(project.rules);
            Config { version: 1, rules }
        }
    }
}

/// Load the rule sets the analyzer needs: the user scope alone and the
/// user+project merge. The user scope survives a cwd downgrade; the project
/// scope does not.
pub fn load_rules(home: Option<&Path>, cwd: Option<&str>) -> (Vec<CustomRule>, Vec<CustomRule>) {
    let user = home.map(|h| user_config_path(h)).and_then(|p| load_scope(&p));
    let project = cwd
        .map(|c| project_config_path(Path::new(c)))
        .and_then(|p| load_scope(&p));
    let user_rules = user.clone().map(|c| c.rules).unwrap_or_default();
    let merged = merge_configs(user, project).rules;
    (user_rules, merged)
}

/// Validate a config file and report errors and rule names.
pub fn validate_config_file(path: &Path) -> ValidationResult {
    let fail = |msg: String| ValidationResult {
        errors: vec![msg],
        rule_names: vec![],
    };

    if !path.exists() {
        return fail(format!("file not found: {}", path.display()));
    }
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(format!("cannot read file: {e}")),
    };
    if content.trim().is_empty() {
        return fail("config file is empty".to_string());
    }
    let data: Value = match serde_json::from_str(&content) {
        Ok(d) => d,
        Err(e) => return fail(format!("invalid JSON: {e}")),
    };
    if !data.is_object() {
        return fail("config must be a JSON object".to_string());
    }
    match validate_config(&data) {
        Ok(config) => ValidationResult {
            errors: vec![],
            rule_names: config.rules.into_iter().map(|r| r.name).collect(),
        },
        Err(e) => ValidationResult {
            errors: e.errors,
            rule_names: vec![],
        },
    }
}
