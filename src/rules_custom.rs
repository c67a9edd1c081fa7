//! Custom-rule matching against one tokenized command.

use std::collections::HashSet;

use crate::config::CustomRule;
use crate::shell::short_opts;

/// Normalize the command token to its basename. Case is preserved: custom
/// rules match case-sensitively.
fn normalize_command(token: &str) -> &str {
    match token.rsplit_once('/') {
        Some((_, base)) => base,
        None => token,
    }
}

/// The first non-option token after the command, honoring `--`.
///
/// Short options are not assumed to consume a following token: without
/// command-specific knowledge, `git -C /path push` yields `/path` here. The
/// attached form (`-C/path`) sidesteps the ambiguity.
fn extract_subcommand(tokens: &[String]) -> Option<&String> {
    let mut i = 1;
    while i < tokens.len() {
        let tok = tokens[i].as_str();
        if tok == "--" {
            return tokens.get(i + 1);
        }
        if tok.starts_with('-') && tok.len() >= 2 {
            i += 1;
            continue;
        }
        return Some(&tokens[i]);
    }
    None
}

/// Check the tokenized command against the custom rules, first match wins.
/// Returns the formatted block message `"[<name>] <reason>"`.
pub fn check_custom_rules(tokens: &[String], rules: &[CustomRule]) -> Option<String> {
    if tokens.is_empty() || rules.is_empty() {
        return None;
    }

    let command = normalize_command(&tokens[0]);
    let subcommand = extract_subcommand(tokens);
    let token_set: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    let shorts = short_opts(tokens);

    for rule in rules {
        if rule.command != command {
            continue;
        }
        if let Some(want) = &rule.subcommand {
            if subcommand.map(String::as_str) != Some(want.as_str()) {
                continue;
            }
        }
        for blocked in &rule.block_args {
            let exact = token_set.contains(blocked.as_str());
            // A two-character short flag also matches inside a bundle:
            // block_args ["-A"] fires on `-Ap`.
            let bundled = {
                let bytes = blocked.as_bytes();
                blocked.len() == 2
                    && bytes[0] == b'-'
                    && bytes[1] != b'-'
                    && shorts.contains(&(bytes[1] as char))
            };
            if exact || bundled {
                return Some(format!("[{}] {}", rule.name, rule.reason));
            }
        }
    }

    None
}
