//! `find` command analysis: `-delete` and `-exec rm -rf` detection.

use crate::rules_rm::rm_has_recursive_force;
use crate::shell::{normalize_cmd_token, strip_token_wrappers, strip_wrappers};

const REASON_FIND_DELETE: &str =
    "find -delete permanently removes files matching the criteria. \
     Use find -print first to verify targets.";
const REASON_FIND_EXEC_RM_RF: &str =
    "find -exec rm -rf runs destructive deletion on matched files. \
     Use find -print first to verify targets.";

/// Predicates and actions that consume exactly one following argument.
const CONSUMES_ONE: &[&str] = &[
    "-name",
    "-iname",
    "-path",
    "-ipath",
    "-wholename",
    "-iwholename",
    "-regex",
    "-iregex",
    "-lname",
    "-ilname",
    "-samefile",
    "-newer",
    "-newerxy",
    "-perm",
    "-user",
    "-group",
    "-printf",
    "-fprintf",
    "-fprint",
    "-fprint0",
    "-fls",
];

const EXEC_LIKE: &[&str] = &["-exec", "-execdir", "-ok", "-okdir"];

/// Walk `find` arguments (everything after the `find` token) and return a
/// deny reason if a dangerous action is present. `-delete` consumed as the
/// argument of a one-argument predicate (e.g. `-name -delete`) is inert.
pub fn find_dangerous_action(args: &[String]) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        let tok = strip_token_wrappers(&args[i]).to_lowercase();

        if EXEC_LIKE.contains(&tok.as_str()) {
            let exec_start = i + 1;
            i += 1;
            while i < args.len() {
                let end = strip_token_wrappers(&args[i]);
                if end == ";" || end == "+" {
                    break;
                }
                i += 1;
            }

            let exec_tokens = &args[exec_start..i.min(args.len())];
            if !exec_tokens.is_empty() {
                let exec_tokens = strip_wrappers(exec_tokens);
                if !exec_tokens.is_empty() {
                    let mut cmd = normalize_cmd_token(&exec_tokens[0]);
                    let mut rest: &[String] = &exec_tokens[1..];
                    if cmd == "busybox" && exec_tokens.len() >= 2 {
                        let applet = normalize_cmd_token(&exec_tokens[1]);
                        if applet == "rm" {
                            cmd = "rm".to_string();
                            rest = &exec_tokens[2..];
                        }
                    }
                    if cmd == "rm" {
                        let mut rm_tokens = vec!["rm".to_string()];
                        rm_tokens.extend(rest.iter().cloned());
                        if rm_has_recursive_force(&rm_tokens) {
                            return Some(REASON_FIND_EXEC_RM_RF.to_string());
                        }
                    }
                }
            }

            i += 1;
            continue;
        }

        if CONSUMES_ONE.contains(&tok.as_str()) {
            i += 2;
            continue;
        }

        if tok == "-delete" {
            return Some(REASON_FIND_DELETE.to_string());
        }

        i += 1;
    }

    None
}
