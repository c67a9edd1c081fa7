//! `rm` command analysis: recursive-force detection and the scratch-path
//! allow-list.

use crate::analyzer::{PARANOID_RM_SUFFIX, STRICT_SUFFIX};
use crate::shell::short_opts;

pub(crate) const REASON_RM_RF: &str =
    "rm -rf is destructive. List files first, then delete individually.";
const REASON_RM_ROOT_OR_HOME: &str = "rm -rf on root or home directories is blocked.";
const REASON_RM_PARANOID: &str = "rm -rf is blocked in paranoid mode.";

/// Context for one `rm` analysis. `cwd` and `home` are used only for lexical
/// containment checks; the filesystem is never touched.
pub struct RmContext<'a> {
    pub cwd: Option<&'a str>,
    pub home: Option<&'a str>,
    /// False when the surrounding segment reassigns TMPDIR.
    pub allow_tmpdir_var: bool,
    pub paranoid: bool,
    pub strict: bool,
}

/// Return true if the invocation is effectively `rm -rf` (recursive and
/// force both present, in any short/long/bundled form, before `--`).
pub fn rm_has_recursive_force(tokens: &[String]) -> bool {
    if tokens.is_empty() {
        return false;
    }
    let mut opts: Vec<&String> = Vec::new();
    for tok in &tokens[1..] {
        if tok == "--" {
            break;
        }
        opts.push(tok);
    }
    let opts_owned: Vec<String> = opts.iter().map(|t| t.to_string()).collect();
    let short = short_opts(&opts_owned);
    let lower: Vec<String> = opts_owned.iter().map(|t| t.to_lowercase()).collect();
    let recursive =
        lower.iter().any(|t| t == "--recursive") || short.contains(&'r') || short.contains(&'R');
    let force = lower.iter().any(|t| t == "--force") || short.contains(&'f');
    recursive && force
}

/// Analyze an `rm` invocation (tokens[0] is `rm`). Returns a deny reason for
/// recursive-force deletions whose targets fall outside the scratch-path
/// allow-list.
pub fn analyze_rm(tokens: &[String], ctx: &RmContext) -> Option<String> {
    if !rm_has_recursive_force(tokens) {
        return None;
    }
    if ctx.paranoid {
        return Some(format!("{}{}", REASON_RM_PARANOID, PARANOID_RM_SUFFIX));
    }

    for target in positional_targets(tokens) {
        if let Some(reason) = target_denial(target, ctx) {
            return Some(reason);
        }
    }
    None
}

fn positional_targets(tokens: &[String]) -> Vec<&str> {
    let mut targets = Vec::new();
    let mut past_options = false;
    for tok in &tokens[1..] {
        if !past_options {
            if tok == "--" {
                past_options = true;
                continue;
            }
            if tok.starts_with('-') && tok != "-" {
                continue;
            }
        }
        targets.push(tok.as_str());
    }
    targets
}

fn target_denial(target: &str, ctx: &RmContext) -> Option<String> {
    if target == "/" {
        return Some(REASON_RM_ROOT_OR_HOME.to_string());
    }

    if let Some(rest) = target.strip_prefix('~') {
        // `~` and `~user` are root/home; `~/x` and `~user/x` still point
        // into a home directory.
        if !rest.contains('/') {
            return Some(REASON_RM_ROOT_OR_HOME.to_string());
        }
        return Some(REASON_RM_RF.to_string());
    }

    // Command substitution in a path cannot be resolved lexically.
    if target.contains('`') || target.contains("$(") {
        return Some(REASON_RM_RF.to_string());
    }

    if let Some(verdict) = tmpdir_target(target, ctx) {
        return verdict;
    }

    // $PWD-prefixed targets resolve against the caller's cwd when known.
    let resolved: String;
    let target = if let Some(rest) = strip_var_prefix(target, "PWD") {
        if rest.contains("..") || rest.is_empty() {
            // $PWD/.. escapes; bare $PWD is the working directory itself.
            return Some(REASON_RM_RF.to_string());
        }
        let Some(cwd) = absolute_cwd(ctx) else {
            return Some(REASON_RM_RF.to_string());
        };
        resolved = format!("{}{}", cwd, rest);
        resolved.as_str()
    } else {
        target
    };

    // Any other variable expansion is unknowable.
    if target.contains('$') {
        return Some(REASON_RM_RF.to_string());
    }

    if target.starts_with('/') {
        let candidate = normalize_absolute(target);
        if candidate == "/" {
            return Some(REASON_RM_ROOT_OR_HOME.to_string());
        }
        if let Some(cwd) = absolute_cwd(ctx) {
            if normalize_absolute(cwd) == candidate {
                return Some(REASON_RM_RF.to_string());
            }
        }
        // Absolute scratch locations are safe regardless of cwd.
        if candidate == "/tmp"
            || candidate == "/var/tmp"
            || candidate.starts_with("/tmp/")
            || candidate.starts_with("/var/tmp/")
        {
            return None;
        }
        containment_denial(&candidate, ctx)
    } else {
        // Relative targets are judged purely against cwd; `../x` from a
        // directory under /tmp still escapes the caller's workspace.
        let Some(cwd) = absolute_cwd(ctx) else {
            return Some(REASON_RM_RF.to_string());
        };
        let cwd_norm = normalize_absolute(cwd);
        let candidate = normalize_absolute(&format!("{}/{}", cwd, target));
        if candidate == "/" {
            return Some(REASON_RM_ROOT_OR_HOME.to_string());
        }
        if candidate == cwd_norm {
            return Some(REASON_RM_RF.to_string());
        }
        containment_denial(&candidate, ctx)
    }
}

/// Allow a candidate path only when it sits strictly inside a known,
/// non-home cwd. Strict mode refuses to rely on this lexical heuristic.
fn containment_denial(candidate: &str, ctx: &RmContext) -> Option<String> {
    let Some(cwd) = absolute_cwd(ctx) else {
        return Some(REASON_RM_RF.to_string());
    };
    let cwd = normalize_absolute(cwd);

    // Deleting inside $HOME is not covered by the cwd allowance: `rm -rf
    // build` at the home directory is as destructive as naming it outright.
    if let Some(home) = ctx.home.filter(|h| h.starts_with('/')) {
        if normalize_absolute(home) == cwd {
            return Some(REASON_RM_RF.to_string());
        }
    }

    let prefix = if cwd == "/" { "/".to_string() } else { format!("{}/", cwd) };
    if candidate != cwd && candidate.starts_with(&prefix) {
        if ctx.strict {
            return Some(format!("{}{}", REASON_RM_RF, STRICT_SUFFIX));
        }
        return None;
    }

    Some(REASON_RM_RF.to_string())
}

/// Classify `$TMPDIR`-prefixed targets. Returns `Some(verdict)` when the
/// target is TMPDIR-shaped; the verdict is `None` for allowed targets.
#[allow(clippy::option_option)]
fn tmpdir_target(target: &str, ctx: &RmContext) -> Option<Option<String>> {
    let rest = strip_var_prefix(target, "TMPDIR")?;
    if !ctx.allow_tmpdir_var {
        return Some(Some(REASON_RM_RF.to_string()));
    }
    if rest.is_empty() {
        return Some(None);
    }
    if relative_escapes(&rest[1..]) {
        return Some(Some(REASON_RM_RF.to_string()));
    }
    Some(None)
}

/// Strip a `$VAR` or `${VAR}` prefix, returning the remainder (which is
/// either empty or starts with `/`).
fn strip_var_prefix<'a>(target: &'a str, var: &str) -> Option<&'a str> {
    for prefix in [format!("${}", var), format!("${{{}}}", var)] {
        if let Some(rest) = target.strip_prefix(&prefix) {
            if rest.is_empty() || rest.starts_with('/') {
                return Some(rest);
            }
        }
    }
    None
}

fn absolute_cwd<'a>(ctx: &RmContext<'a>) -> Option<&'a str> {
    ctx.cwd.filter(|c| c.starts_with('/'))
}

/// Lexically normalize an absolute path: resolve `.` and `..` without
/// touching the filesystem, clamping at the root.
fn normalize_absolute(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// True if a relative path walks above its starting point.
fn relative_escapes(path: &str) -> bool {
    let mut depth: i32 = 0;
    for comp in path.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            _ => depth += 1,
        }
    }
    false
}
