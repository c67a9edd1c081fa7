//! Git command analysis: classifies subcommand/option combinations that
//! destroy history or working-tree state.

use crate::shell::short_opts;

pub(crate) const REASON_CHECKOUT_DOUBLE_DASH: &str =
    "git checkout -- discards uncommitted changes permanently. Use 'git stash' first.";
const REASON_CHECKOUT_REF_DOUBLE_DASH: &str =
    "git checkout <ref> -- <path> overwrites working tree. Use 'git stash' first.";
const REASON_CHECKOUT_REF_PATHSPEC: &str =
    "git checkout <ref> <path> overwrites working tree. Use 'git stash' first.";
const REASON_CHECKOUT_PATHSPEC_FROM_FILE: &str =
    "git checkout --pathspec-from-file overwrites working tree. Use 'git stash' first.";
pub(crate) const REASON_RESTORE: &str =
    "git restore discards uncommitted changes. Use 'git stash' or 'git diff' first.";
pub(crate) const REASON_RESTORE_WORKTREE: &str =
    "git restore --worktree discards uncommitted changes permanently.";
pub(crate) const REASON_RESET_HARD: &str =
    "git reset --hard destroys uncommitted changes. Use 'git stash' first.";
pub(crate) const REASON_RESET_MERGE: &str = "git reset --merge can lose uncommitted changes.";
pub(crate) const REASON_CLEAN_FORCE: &str =
    "git clean -f removes untracked files permanently. Review with 'git clean -n' first.";
pub(crate) const REASON_PUSH_FORCE: &str =
    "Force push can destroy remote history. Use --force-with-lease if necessary.";
const REASON_WORKTREE_REMOVE_FORCE: &str =
    "git worktree remove --force can delete worktree files. Verify the path first.";
pub(crate) const REASON_BRANCH_DELETE_FORCE: &str =
    "git branch -D force-deletes without merge check. Use -d for safety.";
pub(crate) const REASON_STASH_DROP: &str =
    "git stash drop permanently deletes stashed changes. List stashes first with 'git stash list'.";
pub(crate) const REASON_STASH_CLEAR: &str =
    "git stash clear permanently deletes ALL stashed changes.";

/// Analyze a `git` invocation (tokens[0] is `git`, case-insensitive).
pub fn analyze_git(tokens: &[String]) -> Option<String> {
    let (sub, rest) = git_subcommand_and_rest(tokens)?;
    let sub = sub.to_lowercase();
    let rest_lower: Vec<String> = rest.iter().map(|t| t.to_lowercase()).collect();
    let short = short_opts(rest);

    let reason = match sub.as_str() {
        "checkout" => {
            if let Some(idx) = rest.iter().position(|t| t == "--") {
                return Some(
                    if idx == 0 {
                        REASON_CHECKOUT_DOUBLE_DASH
                    } else {
                        REASON_CHECKOUT_REF_DOUBLE_DASH
                    }
                    .to_string(),
                );
            }
            if rest.iter().any(|t| t == "-b" || t == "-B")
                || short.contains(&'b')
                || short.contains(&'B')
                || rest_lower.iter().any(|t| t == "--orphan")
            {
                return None;
            }
            if rest_lower
                .iter()
                .any(|t| t == "--pathspec-from-file" || t.starts_with("--pathspec-from-file="))
            {
                return Some(REASON_CHECKOUT_PATHSPEC_FROM_FILE.to_string());
            }
            // `git checkout <ref> <pathspec>` (without `--`) overwrites
            // working-tree files when git can disambiguate.
            if checkout_positional_args(rest).len() >= 2 {
                Some(REASON_CHECKOUT_REF_PATHSPEC)
            } else {
                None
            }
        }
        "restore" => {
            if rest_lower
                .iter()
                .any(|t| t == "-h" || t == "--help" || t == "--version")
            {
                None
            } else if rest_lower.iter().any(|t| t == "--worktree") {
                Some(REASON_RESTORE_WORKTREE)
            } else if rest_lower.iter().any(|t| t == "--staged") {
                None
            } else {
                Some(REASON_RESTORE)
            }
        }
        "reset" => {
            if rest_lower.iter().any(|t| t == "--hard") {
                Some(REASON_RESET_HARD)
            } else if rest_lower.iter().any(|t| t == "--merge") {
                Some(REASON_RESET_MERGE)
            } else {
                None
            }
        }
        "clean" => {
            if rest_lower.iter().any(|t| t == "--force") || short.contains(&'f') {
                Some(REASON_CLEAN_FORCE)
            } else {
                None
            }
        }
        "push" => {
            let has_lease = rest_lower.iter().any(|t| t.starts_with("--force-with-lease"));
            let has_force = rest_lower.iter().any(|t| t == "--force") || short.contains(&'f');
            // --force-with-lease neutralizes -f/--force, except when the
            // plain form is also given (mixed intent).
            if has_force && !has_lease {
                Some(REASON_PUSH_FORCE)
            } else if has_force && has_lease {
                Some(REASON_PUSH_FORCE)
            } else {
                None
            }
        }
        "worktree" => {
            if rest_lower.first().map(String::as_str) != Some("remove") {
                return None;
            }
            let opts_end = rest.iter().position(|t| t == "--").unwrap_or(rest.len());
            let opts = &rest[..opts_end];
            let opts_short = short_opts(opts);
            if opts.iter().any(|t| t.to_lowercase() == "--force") || opts_short.contains(&'f') {
                Some(REASON_WORKTREE_REMOVE_FORCE)
            } else {
                None
            }
        }
        "branch" => {
            // -D vs -d is case-significant.
            if rest.iter().any(|t| t == "-D") || short.contains(&'D') {
                Some(REASON_BRANCH_DELETE_FORCE)
            } else {
                None
            }
        }
        "stash" => match rest_lower.first().map(String::as_str) {
            Some("drop") => Some(REASON_STASH_DROP),
            Some("clear") => Some(REASON_STASH_CLEAR),
            _ => None,
        },
        _ => None,
    };

    reason.map(str::to_string)
}

/// Split git tokens into (subcommand, rest), scanning over git's global
/// options.
pub fn git_subcommand_and_rest(tokens: &[String]) -> Option<(&String, &[String])> {
    if tokens.is_empty() || tokens[0].to_lowercase() != "git" {
        return None;
    }

    const OPTS_WITH_VALUE: &[&str] = &[
        "-c",
        "-C",
        "--exec-path",
        "--git-dir",
        "--namespace",
        "--super-prefix",
        "--work-tree",
    ];
    const OPTS_NO_VALUE: &[&str] = &[
        "-p",
        "-P",
        "-h",
        "--help",
        "--no-pager",
        "--paginate",
        "--version",
        "--bare",
        "--no-replace-objects",
        "--literal-pathspecs",
        "--noglob-pathspecs",
        "--icase-pathspecs",
    ];

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
        if OPTS_NO_VALUE.contains(&tok) {
            i += 1;
            continue;
        }
        if OPTS_WITH_VALUE.contains(&tok) {
            i += 2;
            continue;
        }
        if tok.starts_with("--") {
            // --opt=value and unknown long flags consume one token.
            i += 1;
            continue;
        }
        // Attached short values: -Cpath, -cname=value.
        i += 1;
    }

    if i >= tokens.len() {
        return None;
    }
    Some((&tokens[i], &tokens[i + 1..]))
}

/// Positional args for `git checkout`, skipping options and their values.
pub fn checkout_positional_args(rest: &[String]) -> Vec<&String> {
    const OPTS_WITH_VALUE: &[&str] = &[
        "-b",
        "-B",
        "--orphan",
        "--conflict",
        "-U",
        "--unified",
        "--inter-hunk-context",
        "--pathspec-from-file",
    ];
    const OPTS_NO_VALUE: &[&str] = &[
        "-f",
        "--force",
        "-m",
        "--merge",
        "-q",
        "--quiet",
        "--detach",
        "--ignore-skip-worktree-bits",
        "--overwrite-ignore",
        "--no-overlay",
        "--overlay",
        "--progress",
        "--no-progress",
        "--guess",
        "--no-guess",
        "--pathspec-file-nul",
    ];

    let mut positionals = Vec::new();
    let mut i = 0;
    while i < rest.len() {
        let tok = rest[i].as_str();
        if tok == "--" {
            break;
        }
        // A lone '-' names the previous branch.
        if tok == "-" {
            positionals.push(&rest[i]);
            i += 1;
            continue;
        }
        if tok.starts_with('-') {
            if OPTS_NO_VALUE.contains(&tok) {
                i += 1;
                continue;
            }
            if tok.starts_with("--") && tok.contains('=') {
                i += 1;
                continue;
            }
            if tok.len() > 2
                && (tok.starts_with("-U") || tok.starts_with("-b") || tok.starts_with("-B"))
            {
                i += 1;
                continue;
            }
            if OPTS_WITH_VALUE.contains(&tok) {
                i += 2;
                continue;
            }
            // Options whose value is optional: consume it only when it is
            // one of the accepted literals.
            if tok == "--recurse-submodules" {
                if matches!(
                    rest.get(i + 1).map(String::as_str),
                    Some("checkout") | Some("on-demand")
                ) {
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }
            if tok == "-t" || tok == "--track" {
                if matches!(
                    rest.get(i + 1).map(String::as_str),
                    Some("direct") | Some("inherit")
                ) {
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }
            // Unknown long options may take a value; assuming they do avoids
            // counting option arguments as pathspecs.
            if tok.starts_with("--") {
                if rest.get(i + 1).is_some_and(|next| !next.starts_with('-')) {
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }
            i += 1;
            continue;
        }
        positionals.push(&rest[i]);
        i += 1;
    }
    positionals
}
