//! Option/template parsers for dispatcher utilities (`xargs`, `parallel`).
//!
//! These scans are best-effort: they know which options consume values so
//! the child-command boundary is found correctly, without modeling every
//! platform variant.

use std::collections::HashSet;

use crate::shell::normalize_cmd_token;

const XARGS_CONSUMES_VALUE: &[&str] = &[
    "-a",
    "-I",
    "-J",
    "-L",
    "-l",
    "-n",
    "-R",
    "-S",
    "-s",
    "-P",
    "-d",
    "-E",
    "--arg-file",
    "--delimiter",
    "--eof",
    "--max-args",
    "--max-lines",
    "--max-procs",
    "--max-chars",
    "--process-slot-var",
];

/// Return the command tokens `xargs` will execute, or `None` when no child
/// command is given.
pub fn extract_xargs_child_command(tokens: &[String]) -> Option<&[String]> {
    if tokens.is_empty() || normalize_cmd_token(&tokens[0]) != "xargs" {
        return None;
    }

    let mut i = 1;
    while i < tokens.len() {
        let tok = tokens[i].as_str();

        if tok == "--" {
            i += 1;
            break;
        }
        if !tok.starts_with('-') || tok == "-" {
            break;
        }

        if tok.starts_with("--") {
            if XARGS_CONSUMES_VALUE.contains(&tok) {
                i += 2;
                continue;
            }
            // --opt=value forms and unknown long flags are one token.
            i += 1;
            continue;
        }

        // -i enables replacement but does not consume the next token in the
        // common `xargs -i cmd ...` form.
        if tok == "-i" {
            i += 1;
            continue;
        }
        if XARGS_CONSUMES_VALUE.contains(&tok) {
            i += 2;
            continue;
        }

        // Attached short forms: -I{}, -i{}, -n1, -P4, -a/tmp/paths, ...
        if tok.len() > 2 {
            let attached_any = tok.starts_with("-I")
                || tok.starts_with("-i")
                || tok.starts_with("-a")
                || tok.starts_with("-d")
                || tok.starts_with("-E")
                || tok.starts_with("-J");
            let attached_numeric = ["-n", "-P", "-L", "-R", "-S", "-s"]
                .iter()
                .any(|p| tok.starts_with(p) && tok[2..].chars().all(|c| c.is_ascii_digit()));
            if attached_any || attached_numeric {
                i += 1;
                continue;
            }
        }

        // Unknown short option; skip it.
        i += 1;
    }

    if i >= tokens.len() {
        return None;
    }
    Some(&tokens[i..])
}

/// Replacement tokens enabled by `-I`/`-i`/`-J`/`--replace[-str]`. Empty when
/// xargs is not in replacement mode.
pub fn xargs_replacement_tokens(tokens: &[String]) -> HashSet<String> {
    let mut repl = HashSet::new();
    if tokens.is_empty() || normalize_cmd_token(&tokens[0]) != "xargs" {
        return repl;
    }

    let mut i = 1;
    while i < tokens.len() {
        let tok = tokens[i].as_str();
        if tok == "--" {
            break;
        }
        if !tok.starts_with('-') || tok == "-" {
            break;
        }

        if tok == "-I" || tok == "-J" {
            match tokens.get(i + 1) {
                Some(value) => {
                    repl.insert(value.clone());
                    i += 2;
                    continue;
                }
                None => break,
            }
        }
        if tok.len() > 2 && (tok.starts_with("-I") || tok.starts_with("-J")) {
            repl.insert(tok[2..].to_string());
            i += 1;
            continue;
        }

        if tok == "-i" {
            repl.insert("{}".to_string());
            i += 1;
            continue;
        }
        if tok.len() > 2 && tok.starts_with("-i") {
            repl.insert(tok[2..].to_string());
            i += 1;
            continue;
        }

        // --replace-str without a value behaves like -i: replacement mode
        // with the default token.
        if tok == "--replace" || tok == "--replace=" || tok == "--replace-str" {
            repl.insert("{}".to_string());
            i += 1;
            continue;
        }
        if let Some(value) = tok.strip_prefix("--replace=") {
            repl.insert(if value.is_empty() { "{}".to_string() } else { value.to_string() });
            i += 1;
            continue;
        }

        i += 1;
    }

    repl
}

const PARALLEL_CONSUMES_VALUE: &[&str] = &[
    "-j",
    "--jobs",
    "-S",
    "--sshlogin",
    "--sshloginfile",
    "--results",
    "--joblog",
    "--workdir",
    "--tmpdir",
    "--tempdir",
    "--tagstring",
];

/// Split a `parallel` invocation into (template, explicit args, dynamic).
///
/// With the `:::` sentinel the args follow it; without it, parallel reads
/// args from stdin and `dynamic` is true.
pub fn extract_parallel_template_and_args(
    tokens: &[String],
) -> Option<(&[String], &[String], bool)> {
    if tokens.is_empty() || normalize_cmd_token(&tokens[0]) != "parallel" {
        return None;
    }

    let marker = tokens.iter().position(|t| t == ":::");
    let dynamic = marker.is_none();
    let marker = marker.unwrap_or(tokens.len());
    let args: &[String] = if dynamic { &[] } else { &tokens[marker + 1..] };

    let mut i = 1;
    while i < marker {
        let tok = tokens[i].as_str();
        if tok == "--" {
            i += 1;
            break;
        }
        if !tok.starts_with('-') || tok == "-" {
            break;
        }
        if PARALLEL_CONSUMES_VALUE.contains(&tok) {
            i += 2;
            continue;
        }
        if tok.starts_with("--") {
            i += 1;
            continue;
        }
        if tok.len() > 2 && (tok.starts_with("-j") || tok.starts_with("-S")) {
            i += 1;
            continue;
        }
        i += 1;
    }

    Some((&tokens[i.min(marker)..marker], args, dynamic))
}
