//! Audit records for denied commands, persisted as JSON lines under
//! `~/.cc-safety-net/logs/`. Failures are swallowed: the audit trail never
//! affects the decision.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::heuristics::redact_secrets;

#[derive(Debug, Serialize)]
pub struct AuditRecord<'a> {
    pub ts: String,
    pub command: String,
    pub segment: String,
    pub reason: &'a str,
    pub cwd: Option<&'a str>,
}

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]+").unwrap());

pub fn logs_dir(home: &Path) -> PathBuf {
    home.join(".cc-safety-net").join("logs")
}

/// Derive a safe log filename component from a session id. Rejects ids that
/// reduce to nothing usable (so a hostile id cannot escape the logs dir).
pub fn sanitize_session_id(session_id: &str) -> Option<String> {
    let raw = session_id.trim();
    if raw.is_empty() {
        return None;
    }
    let safe = UNSAFE_CHARS.replace_all(raw, "_");
    let safe = safe.trim_matches(['.', '_', '-']);
    let safe: String = safe.chars().take(128).collect();
    if safe.is_empty() || safe == "." || safe == ".." {
        return None;
    }
    Some(safe)
}

fn clip(text: &str) -> String {
    redact_secrets(text).chars().take(300).collect()
}

/// Build the audit record for a denial, with excerpts redacted and bounded.
pub fn denial_record<'a>(
    command: &str,
    segment: &str,
    reason: &'a str,
    cwd: Option<&'a str>,
) -> AuditRecord<'a> {
    AuditRecord {
        ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        command: clip(command),
        segment: clip(segment),
        reason,
        cwd,
    }
}

/// Append a denial record to the session's log file. Best effort only.
pub fn write_denial(
    home: &Path,
    session_id: &str,
    command: &str,
    segment: &str,
    reason: &str,
    cwd: Option<&str>,
) {
    let Some(safe_session_id) = sanitize_session_id(session_id) else {
        return;
    };

    let dir = logs_dir(home);
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    let record = denial_record(command, segment, reason, cwd);
    let Ok(line) = serde_json::to_string(&record) else {
        return;
    };
    let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{safe_session_id}.jsonl")))
    else {
        return;
    };
    let _ = writeln!(file, "{line}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_safe_ids() {
        assert_eq!(sanitize_session_id("test-session-123"), Some("test-session-123".to_string()));
        assert_eq!(sanitize_session_id("a.b_c-d"), Some("a.b_c-d".to_string()));
    }

    #[test]
    fn sanitize_replaces_and_trims() {
        assert_eq!(sanitize_session_id("a/b c"), Some("a_b_c".to_string()));
        assert_eq!(sanitize_session_id("../../outside"), Some("outside".to_string()));
        assert_eq!(sanitize_session_id("/abs/path"), Some("abs_path".to_string()));
    }

    #[test]
    fn sanitize_rejects_unusable_ids() {
        assert_eq!(sanitize_session_id(""), None);
        assert_eq!(sanitize_session_id("   "), None);
        assert_eq!(sanitize_session_id("..."), None);
        assert_eq!(sanitize_session_id("///"), None);
    }

    #[test]
    fn sanitize_truncates_long_ids() {
        let long = "a".repeat(200);
        assert_eq!(sanitize_session_id(&long).unwrap().len(), 128);
    }

    #[test]
    fn record_redacts_and_bounds_excerpts() {
        let long = format!("TOKEN=secret123 git reset --hard {}", "a".repeat(400));
        let record = denial_record(&long, "git reset --hard", "reason", Some("/work"));
        assert!(!record.command.contains("secret123"));
        assert!(record.command.chars().count() <= 300);
        assert_eq!(record.cwd, Some("/work"));
        assert!(record.ts.contains('T'));
    }

    #[test]
    fn write_denial_appends_jsonl() {
        let home = tempfile::tempdir().unwrap();
        write_denial(home.path(), "sess-1", "git reset --hard", "git reset --hard", "r", None);
        write_denial(home.path(), "sess-1", "git clean -f", "git clean -f", "r", None);

        let content =
            fs::read_to_string(logs_dir(home.path()).join("sess-1.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["command"], "git reset --hard");
        assert!(first["cwd"].is_null());
    }

    #[test]
    fn hostile_session_id_stays_in_logs_dir() {
        let home = tempfile::tempdir().unwrap();
        write_denial(home.path(), "../../escape", "cmd", "cmd", "r", None);
        assert!(!home.path().join("escape.jsonl").exists());
        assert!(logs_dir(home.path()).join("escape.jsonl").exists());
    }

    #[test]
    fn unusable_session_id_skips_log() {
        let home = tempfile::tempdir().unwrap();
        write_denial(home.path(), "///", "cmd", "cmd", "r", None);
        assert!(!logs_dir(home.path()).exists() || fs::read_dir(logs_dir(home.path())).unwrap().next().is_none());
    }
}
