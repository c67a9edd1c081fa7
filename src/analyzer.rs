//! Per-segment command analysis: routing to the built-in analyzers,
//! interpreter recursion, dispatcher handling, cwd tracking, and mode flags.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::CustomRule;
use crate::dispatch::{
    extract_parallel_template_and_args, extract_xargs_child_command, xargs_replacement_tokens,
};
use crate::heuristics::{dangerous_find_delete_in_text, dangerous_in_text};
use crate::rules_custom::check_custom_rules;
use crate::rules_find::find_dangerous_action;
use crate::rules_git::analyze_git;
use crate::rules_rm::{analyze_rm, rm_has_recursive_force, RmContext};
use crate::shell::{normalize_cmd_token, split_commands, strip_wrappers, tokenize};

pub const MAX_RECURSION_DEPTH: usize = 5;

pub const STRICT_SUFFIX: &str = " [strict mode - disable with: unset SAFETY_NET_STRICT]";
pub const PARANOID_INTERPRETERS_SUFFIX: &str =
    " [paranoid mode - disable with: unset SAFETY_NET_PARANOID SAFETY_NET_PARANOID_INTERPRETERS]";
pub const PARANOID_RM_SUFFIX: &str =
    " [paranoid mode - disable with: unset SAFETY_NET_PARANOID SAFETY_NET_PARANOID_RM]";

const REASON_RECURSION_LIMIT: &str = "Command analysis recursion limit reached.";
const REASON_XARGS_RM_RF: &str =
    "xargs can feed arbitrary input to rm -rf. List files first, then delete individually.";
const REASON_PARALLEL_RM_RF: &str =
    "parallel can feed arbitrary input to rm -rf. List files first, then delete individually.";

const SHELLS: &[&str] = &["bash", "sh", "zsh", "dash", "ksh"];
const INTERPRETERS: &[&str] = &["python", "python3", "node", "ruby", "perl"];

static TMPDIR_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bTMPDIR=").unwrap());
static CD_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:\$\(\s*)?[({]*\s*(?:command\s+|builtin\s+)?(?:cd|pushd|popd)(?:\s|$)")
        .unwrap()
});

fn env_truthy(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Mode flags, sourced from the environment once per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modes {
    /// Fail closed on input that cannot be parsed or verified.
    pub strict: bool,
    /// Deny every recursive-force rm regardless of target.
    pub paranoid_rm: bool,
    /// Deny interpreter one-liners that cannot be fully analyzed.
    pub paranoid_interpreters: bool,
}

impl Modes {
    pub fn from_env() -> Self {
        let paranoid = env_truthy("SAFETY_NET_PARANOID");
        Modes {
            strict: env_truthy("SAFETY_NET_STRICT"),
            paranoid_rm: paranoid || env_truthy("SAFETY_NET_PARANOID_RM"),
            paranoid_interpreters: paranoid || env_truthy("SAFETY_NET_PARANOID_INTERPRETERS"),
        }
    }
}

/// A deny decision: the offending segment verbatim plus a human-readable
/// reason. The first deny wins; no output means allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub segment: String,
    pub reason: String,
}

/// One request's analysis context. Holds the mode flags, the caller's home
/// directory (for the rm home-cwd check), and both custom-rule scopes.
pub struct Analyzer<'a> {
    modes: Modes,
    home: Option<String>,
    user_rules: &'a [CustomRule],
    merged_rules: &'a [CustomRule],
}

impl<'a> Analyzer<'a> {
    pub fn new(
        modes: Modes,
        home: Option<String>,
        user_rules: &'a [CustomRule],
        merged_rules: &'a [CustomRule],
    ) -> Self {
        Analyzer {
            modes,
            home,
            user_rules,
            merged_rules,
        }
    }

    /// Analyze a full command string. Returns the first denial, if any.
    pub fn analyze(&self, command: &str, cwd: Option<&str>) -> Option<Denial> {
        self.analyze_command(command, cwd, 0, self.merged_rules)
    }

    fn analyze_command(
        &self,
        command: &str,
        cwd: Option<&str>,
        depth: usize,
        rules: &'a [CustomRule],
    ) -> Option<Denial> {
        let mut effective_cwd = cwd;
        let mut effective_rules = rules;
        for segment in split_commands(command) {
            if let Some(denial) =
                self.analyze_segment(&segment, effective_cwd, depth, effective_rules)
            {
                return Some(denial);
            }

            // After cd/pushd/popd the cwd is unknown, and project-scope rules
            // (which were resolved against it) no longer apply.
            if effective_cwd.is_some() && segment_changes_cwd(&segment) {
                effective_cwd = None;
                effective_rules = self.user_rules;
            }
        }
        None
    }

    fn rm_context<'b>(&'b self, cwd: Option<&'b str>, allow_tmpdir_var: bool) -> RmContext<'b> {
        RmContext {
            cwd,
            home: self.home.as_deref(),
            allow_tmpdir_var,
            paranoid: self.modes.paranoid_rm,
            strict: self.modes.strict,
        }
    }

    fn analyze_segment(
        &self,
        segment: &str,
        cwd: Option<&str>,
        depth: usize,
        rules: &[CustomRule],
    ) -> Option<Denial> {
        let deny = |reason: String| {
            Some(Denial {
                segment: segment.to_string(),
                reason,
            })
        };

        let Some(tokens) = tokenize(segment) else {
            if self.modes.strict {
                return deny(format!("Unable to parse shell command safely.{STRICT_SUFFIX}"));
            }
            let reason =
                dangerous_in_text(segment).or_else(|| dangerous_find_delete_in_text(segment));
            return reason.and_then(|r| deny(r.to_string()));
        };
        if tokens.is_empty() {
            return None;
        }

        let stripped = strip_wrappers(&tokens);
        if stripped.is_empty() {
            return None;
        }

        let head = normalize_cmd_token(&stripped[0]);

        // Interpreter recursion: bash/sh/zsh -c '...'
        if SHELLS.contains(&head.as_str()) {
            if let Some(code) = extract_dash_c_arg(&stripped) {
                if depth >= MAX_RECURSION_DEPTH {
                    return deny(REASON_RECURSION_LIMIT.to_string());
                }
                if let Some(denial) = self.analyze_command(code, cwd, depth + 1, self.user_rules) {
                    return Some(denial);
                }
            } else if self.modes.strict && has_shell_dash_c(&stripped) {
                return deny(format!("Unable to parse shell -c wrapper safely.{STRICT_SUFFIX}"));
            }
        }

        // python/node/ruby/perl one-liners can hide rm/git.
        if INTERPRETERS.contains(&head.as_str()) {
            if let Some(code) = extract_interpreter_code_arg(&stripped) {
                if let Some(reason) =
                    dangerous_in_text(code).or_else(|| dangerous_find_delete_in_text(code))
                {
                    return deny(reason.to_string());
                }
                if self.modes.paranoid_interpreters {
                    return deny(format!(
                        "Cannot safely analyze interpreter one-liners.{PARANOID_INTERPRETERS_SUFFIX}"
                    ));
                }
            }
        }

        let allow_tmpdir_var = !TMPDIR_ASSIGNMENT.is_match(segment);

        if head == "xargs" {
            return self.analyze_xargs(segment, &tokens, &stripped, cwd, depth, rules, allow_tmpdir_var);
        }
        if head == "parallel" {
            return self.analyze_parallel(segment, &tokens, &stripped, cwd, depth, rules, allow_tmpdir_var);
        }

        if head == "busybox" && stripped.len() >= 2 {
            let applet = normalize_cmd_token(&stripped[1]);
            if applet == "rm" {
                let rm_tokens = prepend("rm", &stripped[2..]);
                return analyze_rm(&rm_tokens, &self.rm_context(cwd, allow_tmpdir_var))
                    .and_then(deny);
            }
            if applet == "find" {
                if let Some(reason) = find_dangerous_action(&stripped[2..]) {
                    return deny(reason);
                }
            }
        }

        // git/rm/find get their analyzers and skip the text heuristics.
        if head == "git" {
            if let Some(reason) = analyze_git(&prepend("git", &stripped[1..])) {
                return deny(reason);
            }
            if depth == 0 {
                if let Some(reason) = check_custom_rules(&tokens, rules) {
                    return deny(reason);
                }
            }
            return None;
        }
        if head == "rm" {
            if let Some(reason) = analyze_rm(
                &prepend("rm", &stripped[1..]),
                &self.rm_context(cwd, allow_tmpdir_var),
            ) {
                return deny(reason);
            }
            if depth == 0 {
                if let Some(reason) = check_custom_rules(&tokens, rules) {
                    return deny(reason);
                }
            }
            return None;
        }
        if head == "find" {
            if let Some(reason) = find_dangerous_action(&stripped[1..]) {
                return deny(reason);
            }
            if depth == 0 {
                if let Some(reason) = check_custom_rules(&tokens, rules) {
                    return deny(reason);
                }
            }
            return None;
        }

        // Other commands: look for embedded rm/git/find tokens (catches
        // substitutions like `echo $(rm -rf /x)`), then the text heuristics.
        for i in 1..stripped.len() {
            match normalize_cmd_token(&stripped[i]).as_str() {
                "rm" => {
                    if let Some(reason) = analyze_rm(
                        &prepend("rm", &stripped[i + 1..]),
                        &self.rm_context(cwd, allow_tmpdir_var),
                    ) {
                        return deny(reason);
                    }
                }
                "git" => {
                    if let Some(reason) = analyze_git(&prepend("git", &stripped[i + 1..])) {
                        return deny(reason);
                    }
                }
                "find" => {
                    if let Some(reason) = find_dangerous_action(&stripped[i + 1..]) {
                        return deny(reason);
                    }
                }
                _ => {}
            }
        }

        if let Some(reason) = dangerous_in_text(segment) {
            return deny(reason.to_string());
        }

        if depth == 0 {
            if let Some(reason) = check_custom_rules(&tokens, rules) {
                return deny(reason);
            }
        }

        None
    }

    #[allow(clippy::too_many_arguments)]
    fn analyze_xargs(
        &self,
        segment: &str,
        orig_tokens: &[String],
        stripped: &[String],
        cwd: Option<&str>,
        depth: usize,
        rules: &[CustomRule],
        allow_tmpdir_var: bool,
    ) -> Option<Denial> {
        let deny = |reason: String| {
            Some(Denial {
                segment: segment.to_string(),
                reason,
            })
        };

        let Some(child) = extract_xargs_child_command(stripped) else {
            if depth == 0 {
                if let Some(reason) = check_custom_rules(orig_tokens, rules) {
                    return deny(reason);
                }
            }
            return None;
        };
        let child = strip_wrappers(child);
        if child.is_empty() {
            return None;
        }

        let child_head = normalize_cmd_token(&child[0]);

        // xargs feeds dynamic input into the child; rm targets visible on
        // the command line cannot be trusted.
        if child_head == "rm" && rm_has_recursive_force(&prepend("rm", &child[1..])) {
            return deny(REASON_XARGS_RM_RF.to_string());
        }
        if child_head == "busybox" && child.len() >= 3 {
            let applet = normalize_cmd_token(&child[1]);
            if applet == "rm" && rm_has_recursive_force(&prepend("rm", &child[2..])) {
                return deny(REASON_XARGS_RM_RF.to_string());
            }
        }

        if SHELLS.contains(&child_head.as_str()) {
            if let Some(code) = extract_dash_c_arg(&child) {
                let repl = xargs_replacement_tokens(stripped);
                if !repl.is_empty() && repl.contains(code.trim()) {
                    return deny(format!(
                        "xargs {} -c can execute arbitrary commands from input.",
                        child[0]
                    ));
                }
                if !repl.is_empty() && repl.iter().any(|t| !t.is_empty() && code.contains(t)) {
                    // Replacement mode substitutes dynamic input into the
                    // command string; a placeholder-based rm -rf is opaque.
                    if let Some(reason) = dangerous_in_text(code) {
                        if reason.starts_with("rm -rf") {
                            return deny(REASON_XARGS_RM_RF.to_string());
                        }
                    }
                }
                if depth >= MAX_RECURSION_DEPTH {
                    return deny(REASON_RECURSION_LIMIT.to_string());
                }
                if let Some(denial) = self.analyze_command(code, cwd, depth + 1, self.user_rules) {
                    return Some(denial);
                }
            } else if has_shell_dash_c(&child) {
                return deny(format!(
                    "xargs {} -c can execute arbitrary commands from input.",
                    child[0]
                ));
            }
        }

        if child_head == "busybox" && child.len() >= 2 {
            let applet = normalize_cmd_token(&child[1]);
            if applet == "rm" {
                return analyze_rm(
                    &prepend("rm", &child[2..]),
                    &self.rm_context(cwd, allow_tmpdir_var),
                )
                .and_then(deny);
            }
            if applet == "find" {
                if let Some(reason) = find_dangerous_action(&child[2..]) {
                    return deny(reason);
                }
            }
        }

        if child_head == "git" {
            return analyze_git(&prepend("git", &child[1..])).and_then(deny);
        }
        if child_head == "rm" {
            return analyze_rm(
                &prepend("rm", &child[1..]),
                &self.rm_context(cwd, allow_tmpdir_var),
            )
            .and_then(deny);
        }
        if child_head == "find" {
            if let Some(reason) = find_dangerous_action(&child[1..]) {
                return deny(reason);
            }
        }

        if depth == 0 {
            if let Some(reason) = check_custom_rules(orig_tokens, rules) {
                return deny(reason);
            }
        }

        None
    }

    #[allow(clippy::too_many_arguments)]
    fn analyze_parallel(
        &self,
        segment: &str,
        orig_tokens: &[String],
        stripped: &[String],
        cwd: Option<&str>,
        depth: usize,
        rules: &[CustomRule],
        allow_tmpdir_var: bool,
    ) -> Option<Denial> {
        let deny = |reason: String| {
            Some(Denial {
                segment: segment.to_string(),
                reason,
            })
        };

        let (template, args, dynamic) = extract_parallel_template_and_args(stripped)?;

        let template = strip_wrappers(template);
        if template.is_empty() {
            if !dynamic {
                // `parallel ::: <cmd> ...` runs each argument as a command.
                for cmd_str in args {
                    if depth >= MAX_RECURSION_DEPTH {
                        return deny(REASON_RECURSION_LIMIT.to_string());
                    }
                    if let Some(denial) =
                        self.analyze_command(cmd_str, cwd, depth + 1, self.user_rules)
                    {
                        return Some(denial);
                    }
                }
            }
            if depth == 0 {
                if let Some(reason) = check_custom_rules(orig_tokens, rules) {
                    return deny(reason);
                }
            }
            return None;
        }

        let template_head = normalize_cmd_token(&template[0]);

        if SHELLS.contains(&template_head.as_str()) {
            if let Some(code) = extract_dash_c_arg(&template) {
                if code.contains("{}") {
                    if dynamic {
                        if code.trim() == "{}" {
                            return deny(format!(
                                "parallel {} -c can execute arbitrary commands from input.",
                                template[0]
                            ));
                        }
                        if let Some(reason) = dangerous_in_text(code) {
                            if reason.starts_with("rm -rf") {
                                return deny(REASON_PARALLEL_RM_RF.to_string());
                            }
                        }
                    } else if !args.is_empty() {
                        // Model the substitution when the args are known.
                        for arg in args {
                            if depth >= MAX_RECURSION_DEPTH {
                                return deny(REASON_RECURSION_LIMIT.to_string());
                            }
                            if let Some(denial) = self.analyze_command(
                                &code.replace("{}", arg),
                                cwd,
                                depth + 1,
                                self.user_rules,
                            ) {
                                return Some(denial);
                            }
                        }
                        return None;
                    }
                }
                if depth >= MAX_RECURSION_DEPTH {
                    return deny(REASON_RECURSION_LIMIT.to_string());
                }
                if let Some(denial) = self.analyze_command(code, cwd, depth + 1, self.user_rules) {
                    return Some(denial);
                }
            } else if has_shell_dash_c(&template) {
                return deny(format!(
                    "parallel {} -c can execute arbitrary commands from input.",
                    template[0]
                ));
            }
        }

        if template_head == "busybox" && template.len() >= 2 {
            let applet = normalize_cmd_token(&template[1]);
            if applet == "rm" {
                let rm_template = prepend("rm", &template[2..]);
                if dynamic && rm_has_recursive_force(&rm_template) {
                    return deny(REASON_PARALLEL_RM_RF.to_string());
                }
                for rm_tokens in materialize(&rm_template, args) {
                    if let Some(reason) =
                        analyze_rm(&rm_tokens, &self.rm_context(cwd, allow_tmpdir_var))
                    {
                        return deny(reason);
                    }
                }
                return None;
            }
            if applet == "find" {
                if let Some(reason) = find_dangerous_action(&template[2..]) {
                    return deny(reason);
                }
            }
        }

        if template_head == "git" {
            return analyze_git(&prepend("git", &template[1..])).and_then(deny);
        }
        if template_head == "rm" {
            if dynamic && rm_has_recursive_force(&prepend("rm", &template[1..])) {
                return deny(REASON_PARALLEL_RM_RF.to_string());
            }
            for tokens in materialize(&template, args) {
                if let Some(reason) = analyze_rm(
                    &prepend("rm", &tokens[1..]),
                    &self.rm_context(cwd, allow_tmpdir_var),
                ) {
                    return deny(reason);
                }
            }
            return None;
        }
        if template_head == "find" {
            if let Some(reason) = find_dangerous_action(&template[1..]) {
                return deny(reason);
            }
        }

        if depth == 0 {
            if let Some(reason) = check_custom_rules(orig_tokens, rules) {
                return deny(reason);
            }
        }

        None
    }
}

/// Expand a command template against explicit args: substitute `{}` when
/// present, append otherwise. With no args the template stands alone.
fn materialize(template: &[String], args: &[String]) -> Vec<Vec<String>> {
    if args.is_empty() {
        return vec![template.to_vec()];
    }
    if template.iter().any(|t| t.contains("{}")) {
        args.iter()
            .map(|arg| template.iter().map(|t| t.replace("{}", arg)).collect())
            .collect()
    } else {
        args.iter()
            .map(|arg| {
                let mut tokens = template.to_vec();
                tokens.push(arg.clone());
                tokens
            })
            .collect()
    }
}

fn prepend(head: &str, rest: &[String]) -> Vec<String> {
    let mut tokens = Vec::with_capacity(rest.len() + 1);
    tokens.push(head.to_string());
    tokens.extend(rest.iter().cloned());
    tokens
}

/// Extract the code argument of `<shell> -c '...'`, handling combined short
/// options like `-lc`.
fn extract_dash_c_arg(tokens: &[String]) -> Option<&String> {
    for i in 1..tokens.len() {
        let tok = tokens[i].as_str();
        if tok == "--" {
            return None;
        }
        if tok == "-c" {
            return tokens.get(i + 1);
        }
        if let Some(letters) = short_letter_cluster(tok) {
            if letters.contains(&'c') && letters.iter().all(|c| matches!(c, 'c' | 'l' | 'i' | 's'))
            {
                return tokens.get(i + 1);
            }
        }
    }
    None
}

fn has_shell_dash_c(tokens: &[String]) -> bool {
    for tok in &tokens[1..] {
        if tok == "--" {
            return false;
        }
        if tok == "-c" {
            return true;
        }
        if let Some(letters) = short_letter_cluster(tok) {
            if letters.contains(&'c') && letters.iter().all(|c| matches!(c, 'c' | 'l' | 'i' | 's'))
            {
                return true;
            }
        }
    }
    false
}

fn short_letter_cluster(token: &str) -> Option<HashSet<char>> {
    let cluster = token.strip_prefix('-')?;
    if cluster.is_empty() || token.starts_with("--") || !cluster.chars().all(char::is_alphabetic) {
        return None;
    }
    Some(cluster.chars().collect())
}

/// The code argument of a `python -c` / `node -e` style one-liner.
fn extract_interpreter_code_arg(tokens: &[String]) -> Option<&String> {
    for i in 1..tokens.len() {
        let tok = tokens[i].as_str();
        if tok == "--" {
            return None;
        }
        if tok == "-c" || tok == "-e" {
            return tokens.get(i + 1);
        }
    }
    None
}

/// True if a segment changes the shell's working directory (cd/pushd/popd,
/// also behind grouping tokens, `builtin`, and wrappers).
pub fn segment_changes_cwd(segment: &str) -> bool {
    if let Some(tokens) = tokenize(segment) {
        let mut start = 0;
        while start < tokens.len() && matches!(tokens[start].as_str(), "{" | "(" | "$(") {
            start += 1;
        }
        let mut tokens = strip_wrappers(&tokens[start..]);
        if tokens.first().is_some_and(|t| t.to_lowercase() == "builtin") {
            tokens.remove(0);
        }
        if let Some(head) = tokens.first() {
            return matches!(normalize_cmd_token(head).as_str(), "cd" | "pushd" | "popd");
        }
    }

    CD_FALLBACK.is_match(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> Analyzer<'static> {
        Analyzer::new(Modes::default(), None, &[], &[])
    }

    fn analyzer_at_home(home: &str) -> Analyzer<'static> {
        Analyzer::new(Modes::default(), Some(home.to_string()), &[], &[])
    }

    fn blocked(command: &str, cwd: Option<&str>, reason_contains: &str) {
        let denial = analyzer()
            .analyze(command, cwd)
            .unwrap_or_else(|| panic!("expected {command:?} to be blocked"));
        assert!(
            denial.reason.contains(reason_contains),
            "reason {:?} missing {:?}",
            denial.reason,
            reason_contains
        );
    }

    fn allowed(command: &str, cwd: Option<&str>) {
        let denial = analyzer().analyze(command, cwd);
        assert!(denial.is_none(), "expected {command:?} allowed, got {denial:?}");
    }

    // --- segment splitting and wrappers end to end ---

    #[test]
    fn compound_segments_deny_on_any_segment() {
        blocked("git status && git reset --hard", None, "git reset --hard");
        blocked("git status || git reset --hard", None, "git reset --hard");
        blocked("git status; git reset --hard", None, "git reset --hard");
        blocked("git status\ngit reset --hard", None, "git reset --hard");
        blocked("echo ok |& git reset --hard", None, "git reset --hard");
        blocked("true & rm -rf /some/path", None, "rm -rf");
        blocked("echo ok 2>&1 && git reset --hard", None, "git reset --hard");
    }

    #[test]
    fn leading_operators_tolerated() {
        blocked("&& git reset --hard", None, "git reset --hard");
        blocked("| git reset --hard", None, "git reset --hard");
        blocked("& git reset --hard", None, "git reset --hard");
        allowed("git status;", None);
    }

    #[test]
    fn wrapper_transparency() {
        blocked("sudo -- git reset --hard", None, "git reset --hard");
        blocked("sudo -u root -- git reset --hard", None, "git reset --hard");
        blocked("env --unset=PATH git reset --hard", None, "git reset --hard");
        blocked("env -uPATH git reset --hard", None, "git reset --hard");
        blocked("env -C /tmp git reset --hard", None, "git reset --hard");
        blocked("env - git reset --hard", None, "git reset --hard");
        blocked("command -pv -- git reset --hard", None, "git reset --hard");
        blocked("FOO=1 BAR=2 git reset --hard", None, "git reset --hard");
        blocked("1A=2 git reset --hard", None, "git reset --hard");
    }

    #[test]
    fn assignments_only_allowed() {
        allowed("FOO=1", None);
    }

    #[test]
    fn case_insensitive_head_dispatch() {
        blocked("GIT CHECKOUT -- file", None, "git checkout --");
        blocked("/bin/rm -rf /some/path", None, "rm -rf");
        blocked("busybox rm -rf /some/path", None, "rm -rf");
    }

    // --- interpreter recursion ---

    #[test]
    fn shell_dash_c_recurses() {
        blocked("bash -c 'rm -rf /some/path'", None, "rm -rf");
        blocked("sh -lc 'git reset --hard'", None, "git reset --hard");
        allowed("bash -c 'echo ok'", None);
        allowed("bash -c", None);
        allowed("bash -- -c 'echo ok'", None);
        allowed("bash -n script.sh", None);
    }

    #[test]
    fn recursion_limit_denies() {
        let analyzer = analyzer();
        let denial = analyzer
            .analyze_command("bash -c 'rm -rf /some/path'", None, MAX_RECURSION_DEPTH, &[])
            .unwrap();
        assert!(denial.reason.contains("recursion limit"));
    }

    #[test]
    fn interpreter_one_liners_scanned() {
        blocked(
            "python -c \"import os; os.system('rm -rf /some/path')\"",
            None,
            "rm -rf",
        );
        blocked("node -e \"rm -rf /\"", None, "rm -rf");
        blocked("ruby -e \"rm -rf /\"", None, "rm -rf");
        blocked("perl -e \"rm -rf /\"", None, "rm -rf");
        allowed("node -e 'console.log(1)'", None);
        allowed("python script.py", None);
        allowed("python -- -c 'print(1)'", None);
    }

    #[test]
    fn paranoid_interpreters_denies_all_one_liners() {
        let modes = Modes {
            paranoid_interpreters: true,
            ..Modes::default()
        };
        let analyzer = Analyzer::new(modes, None, &[], &[]);
        let denial = analyzer.analyze("python -c \"print('ok')\"", None).unwrap();
        assert!(denial.reason.contains("SAFETY_NET_PARANOID"));
        assert!(analyzer.analyze("python script.py", None).is_none());
    }

    // --- strict mode ---

    #[test]
    fn strict_denies_unparseable() {
        let modes = Modes {
            strict: true,
            ..Modes::default()
        };
        let analyzer = Analyzer::new(modes, None, &[], &[]);
        let denial = analyzer.analyze("git reset --hard 'unterminated", None).unwrap();
        assert!(denial.reason.contains("unset SAFETY_NET_STRICT"));

        let denial = analyzer.analyze("bash -c", None).unwrap();
        assert!(denial.reason.contains("shell -c wrapper"));
        let denial = analyzer.analyze("bash -lc", None).unwrap();
        assert!(denial.reason.contains("shell -c wrapper"));

        assert!(analyzer.analyze("bash", None).is_none());
        assert!(analyzer.analyze("bash -l echo ok", None).is_none());
        assert!(analyzer.analyze("bash -- -c 'echo ok'", None).is_none());
        assert!(analyzer.analyze("python -c \"print('ok')\"", None).is_none());
    }

    #[test]
    fn non_strict_unparseable_falls_back_to_heuristics() {
        blocked("rm -rf /some/path 'unterminated", None, "rm -rf");
        blocked("git push -f origin main 'unterminated", None, "Force push");
        blocked("find . -delete 'unterminated", None, "find -delete");
        blocked("git restore file.txt 'unterminated", None, "git restore discards");
        blocked("git branch -D feature 'unterminated", None, "git branch -D");
        allowed("echo 'unterminated", None);
        allowed("git restore --help 'unterminated", None);
        allowed("echo \"find . -delete", None);
        allowed("rg \"find . -delete", None);
    }

    // --- rm routing ---

    #[test]
    fn rm_allow_and_deny_through_orchestrator() {
        blocked("rm -rf /some/path", None, "rm -rf");
        allowed("rm -rf /tmp/test-dir", None);
        allowed("rm -r /some/path", None);
        blocked("TMPDIR=/Users rm -rf $TMPDIR/test-dir", None, "rm -rf");
        allowed("rm -rf $TMPDIR/test-dir", None);
    }

    #[test]
    fn cwd_downgrade_after_cd() {
        blocked("cd .. && rm -rf build", Some("/tmp/proj"), "rm -rf");
        blocked("{ cd ..; rm -rf build; }", Some("/tmp/proj"), "rm -rf");
        blocked("( cd ..; rm -rf build )", Some("/tmp/proj"), "rm -rf");
        blocked("$( cd ..; echo ok ) && rm -rf build", Some("/tmp/proj"), "rm -rf");
        blocked("builtin cd .. && rm -rf build", Some("/tmp/proj"), "rm -rf");
        blocked("pushd .. && rm -rf build", Some("/tmp/proj"), "rm -rf");
        allowed("rm -rf build", Some("/tmp/proj"));
    }

    #[test]
    fn home_cwd_denies_relative_rm() {
        let analyzer = analyzer_at_home("/home/alice");
        assert!(analyzer.analyze("rm -rf build", Some("/home/alice")).is_some());
        assert!(analyzer.analyze("rm -rf build", Some("/home/alice/repo")).is_none());
    }

    #[test]
    fn segment_changes_cwd_detection() {
        assert!(segment_changes_cwd("cd .."));
        assert!(segment_changes_cwd("pushd /tmp"));
        assert!(segment_changes_cwd("popd"));
        assert!(segment_changes_cwd("{ cd .."));
        assert!(segment_changes_cwd("$( cd .."));
        assert!(segment_changes_cwd("builtin cd .."));
        assert!(segment_changes_cwd("command cd .."));
        assert!(segment_changes_cwd("cd 'unterminated"));
        assert!(!segment_changes_cwd("builtin"));
        assert!(!segment_changes_cwd("echo cd"));
    }

    // --- substitutions and embedded commands ---

    #[test]
    fn command_substitution_scanned() {
        blocked("echo $(rm -rf /some/path)", None, "rm -rf");
        blocked("echo $(git reset --hard )", None, "git reset --hard");
        blocked("echo $(find . -delete )", None, "find -delete");
        allowed("echo $(rm -f /tmp/a )", None);
        allowed("echo $(git status )", None);
        allowed("echo $(find . -name foo )", None);
    }

    // --- find routing ---

    #[test]
    fn find_through_orchestrator() {
        blocked("find . -name \"*.pyc\" -delete", None, "find -delete");
        blocked("find . -exec rm -rf {} \\;", None, "find -exec rm -rf");
        blocked("bash -c 'find . -exec rm -rf {} \\;'", None, "find -exec rm -rf");
        blocked("busybox find . -delete", None, "find -delete");
        allowed("find . -name -delete -print", None);
        allowed("find . -name \"*.pyc\" -print", None);
        allowed("busybox find . -name foo", None);
    }

    // --- xargs ---

    #[test]
    fn xargs_rm_rf_denied_dynamic_input() {
        blocked("echo / | xargs rm -rf", None, "xargs");
        blocked("echo / | xargs -n1 rm -rf", None, "rm -rf");
        blocked("echo / | xargs -P2 rm -rf", None, "rm -rf");
        blocked("echo / | xargs -i rm -rf", None, "rm -rf");
        blocked("echo / | xargs --delimiter '\\n' rm -rf", None, "rm -rf");
        blocked("echo / | xargs --arg-file=/tmp/paths rm -rf", None, "rm -rf");
        blocked("echo / | xargs busybox rm -rf", None, "rm -rf");
        blocked("find . -print0 | xargs -0 rm -rf", None, "rm -rf");
        blocked("echo / | xargs -J {} rm -rf {}", None, "rm -rf");
    }

    #[test]
    fn xargs_shell_child_placeholder_denied() {
        blocked("echo / | xargs -I{} bash -c 'rm -rf {}'", Some("/tmp"), "xargs");
        blocked("echo / | xargs -I% bash -c 'rm -rf %'", Some("/tmp"), "xargs");
        blocked("echo ok | xargs -I{} bash -c {}", None, "arbitrary commands");
        blocked("echo ok | xargs bash -c", None, "arbitrary commands");
        blocked("echo / | xargs --replace bash -c 'rm -rf {}'", None, "xargs");
        blocked("echo / | xargs --replace=FOO bash -c 'rm -rf FOO'", None, "xargs");
        blocked("echo / | xargs --replace= bash -c 'rm -rf {}'", None, "xargs");
    }

    #[test]
    fn xargs_shell_child_static_code_recursed() {
        blocked("echo ok | xargs bash -c 'git reset --hard'", None, "git reset --hard");
    }

    #[test]
    fn xargs_other_children() {
        blocked("echo ok | xargs git reset --hard", None, "git reset --hard");
        blocked("echo ok | xargs find . -delete", None, "find -delete");
        blocked("echo ok | xargs busybox find . -delete", None, "find -delete");
        allowed("echo ok | xargs echo", None);
        allowed("echo ok | xargs", None);
        allowed("echo ok | xargs -n1", None);
        allowed("echo ok | xargs sudo --", None);
        allowed("echo ok | xargs busybox rm -f /tmp/test", None);
        allowed("echo ok | xargs find . -name foo", None);
        allowed("echo ok | xargs rm -- -rf", Some("/tmp"));
    }

    // --- parallel ---

    #[test]
    fn parallel_dynamic_mode_denied() {
        blocked("echo / | parallel rm -rf", None, "parallel");
        blocked("echo / | parallel busybox rm -rf", None, "rm -rf");
        blocked("echo / | parallel bash -c 'rm -rf {}'", None, "rm -rf");
        blocked("echo ok | parallel bash -c {}", None, "arbitrary commands");
        blocked("parallel bash -c ::: 'rm -rf /'", None, "parallel");
    }

    #[test]
    fn parallel_explicit_args_materialized() {
        blocked("parallel rm -rf {} ::: /", Some("/tmp"), "rm -rf");
        blocked("parallel rm -rf ::: /", None, "root or home");
        blocked("parallel busybox rm -rf {} ::: /", Some("/tmp"), "rm -rf");
        blocked("parallel bash -c 'rm -rf {}' ::: /", Some("/tmp"), "rm -rf");
        allowed("parallel rm -rf {} ::: build", Some("/tmp"));
        allowed("parallel bash -c 'rm -rf {}' ::: build", Some("/tmp"));
        allowed("parallel busybox rm -rf {} ::: build", Some("/tmp"));
    }

    #[test]
    fn parallel_empty_template_runs_args_as_commands() {
        blocked("parallel ::: 'rm -rf /'", None, "rm -rf");
        allowed("parallel ::: 'echo ok' 'true'", None);
        allowed("parallel :::", None);
        allowed("echo ok | parallel", None);
    }

    #[test]
    fn parallel_templates_analyzed() {
        blocked("parallel git reset --hard ::: ok", None, "git reset --hard");
        blocked("parallel find . -delete ::: ok", None, "find -delete");
        blocked("parallel busybox find . -delete ::: ok", None, "find -delete");
        blocked("parallel bash -c 'git reset --hard' ::: ok", None, "git reset --hard");
        blocked("parallel --results out rm -rf {} ::: /", Some("/tmp"), "rm -rf");
        blocked("parallel -j2 rm -rf {} ::: /", Some("/tmp"), "root or home");
        blocked("parallel --eta rm -rf {} ::: /", Some("/tmp"), "root or home");
        allowed("parallel bash -c 'echo ok' ::: ok", None);
        allowed("parallel find . -name foo ::: ok", None);
        allowed("parallel busybox find . -name foo ::: ok", None);
    }

    // --- custom rules ---

    fn add_all_rule() -> Vec<CustomRule> {
        vec![CustomRule {
            name: "no-add-all".to_string(),
            command: "git".to_string(),
            subcommand: Some("add".to_string()),
            block_args: vec!["-A".to_string(), "--all".to_string(), ".".to_string()],
            reason: "Use specific files.".to_string(),
        }]
    }

    #[test]
    fn custom_rules_apply_at_top_level_only() {
        let rules = add_all_rule();
        let analyzer = Analyzer::new(Modes::default(), None, &rules, &rules);
        let denial = analyzer.analyze("git add -A", None).unwrap();
        assert_eq!(denial.reason, "[no-add-all] Use specific files.");
        // Not applied inside interpreter recursion.
        assert!(analyzer.analyze("bash -c 'git add -A'", None).is_none());
        assert!(analyzer.analyze("git add file.txt", None).is_none());
    }

    #[test]
    fn builtin_rules_win_over_custom() {
        let rules = vec![CustomRule {
            name: "custom-reset".to_string(),
            command: "git".to_string(),
            subcommand: Some("reset".to_string()),
            block_args: vec!["--hard".to_string()],
            reason: "Custom reason.".to_string(),
        }];
        let analyzer = Analyzer::new(Modes::default(), None, &rules, &rules);
        let denial = analyzer.analyze("git reset --hard", None).unwrap();
        assert!(denial.reason.contains("git reset --hard destroys"));
    }

    #[test]
    fn custom_rules_apply_to_dispatchers() {
        let rules = vec![
            CustomRule {
                name: "block-xargs-grep".to_string(),
                command: "xargs".to_string(),
                subcommand: None,
                block_args: vec!["grep".to_string()],
                reason: "Use ripgrep instead.".to_string(),
            },
            CustomRule {
                name: "block-parallel-curl".to_string(),
                command: "parallel".to_string(),
                subcommand: None,
                block_args: vec!["curl".to_string()],
                reason: "No parallel curl.".to_string(),
            },
        ];
        let analyzer = Analyzer::new(Modes::default(), None, &rules, &rules);
        let denial = analyzer.analyze("find . | xargs grep pattern", None).unwrap();
        assert!(denial.reason.contains("[block-xargs-grep]"));
        let denial = analyzer.analyze("parallel curl ::: url1 url2", None).unwrap();
        assert!(denial.reason.contains("[block-parallel-curl]"));
    }

    #[test]
    fn project_rules_dropped_after_cd() {
        let user: Vec<CustomRule> = vec![];
        let merged = add_all_rule();
        let analyzer = Analyzer::new(Modes::default(), None, &user, &merged);
        assert!(analyzer.analyze("git add -A", Some("/tmp/proj")).is_some());
        assert!(analyzer.analyze("cd .. && git add -A", Some("/tmp/proj")).is_none());
    }

    // --- benign commands ---

    #[test]
    fn ordinary_development_commands_allowed() {
        allowed("git status", None);
        allowed("git diff --stat", None);
        allowed("git log --oneline -5", None);
        allowed("ls -la", None);
        allowed("cargo build --release", None);
        allowed("npm test", None);
        allowed("", None);
        allowed("   ", None);
    }

    #[test]
    fn denial_carries_offending_segment() {
        let denial = analyzer().analyze("echo ok && git reset --hard", None).unwrap();
        assert_eq!(denial.segment, "git reset --hard");
    }
}
