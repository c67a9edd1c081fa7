use std::io::{self, Read};

use serde_json::{json, Value};

use cc_safety_net::analyzer::{Analyzer, Modes};
use cc_safety_net::heuristics::safe_excerpt;
use cc_safety_net::{audit, config};

/// Print a deny decision in the PreToolUse hook format. The host reads the
/// JSON; the exit code is always 0.
fn print_deny(reason_text: String) {
    let output = json!({
        "hookSpecificOutput": {
            "hookEventName": "PreToolUse",
            "permissionDecision": "deny",
            "permissionDecisionReason": reason_text,
        }
    });
    println!("{output}");
}

fn print_invalid_input(reason: &str) {
    print_deny(format!("BLOCKED by Safety Net\n\nReason: {reason}"));
}

fn main() {
    let modes = Modes::from_env();

    // Read all stdin; if that fails there is nothing to analyze.
    let mut input = String::new();
    if io::stdin().read_to_string(&mut input).is_err() {
        return;
    }

    let data: Value = match serde_json::from_str(&input) {
        Ok(v) => v,
        Err(_) => {
            if modes.strict {
                print_invalid_input("Invalid hook input.");
            }
            return;
        }
    };

    let Some(request) = data.as_object() else {
        if modes.strict {
            print_invalid_input("Invalid hook input structure.");
        }
        return;
    };

    // Only Bash tool calls are analyzed.
    if request.get("tool_name").and_then(Value::as_str) != Some("Bash") {
        return;
    }

    let Some(tool_input) = request.get("tool_input").and_then(Value::as_object) else {
        if modes.strict {
            print_invalid_input("Invalid hook input structure.");
        }
        return;
    };

    let Some(command) = tool_input
        .get("command")
        .and_then(Value::as_str)
        .filter(|c| !c.trim().is_empty())
    else {
        return;
    };

    let cwd = request
        .get("cwd")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let home = dirs::home_dir();
    let (user_rules, merged_rules) = config::load_rules(home.as_deref(), cwd);

    let analyzer = Analyzer::new(
        modes,
        home.as_ref().map(|h| h.to_string_lossy().into_owned()),
        &user_rules,
        &merged_rules,
    );

    let Some(denial) = analyzer.analyze(command, cwd) else {
        return;
    };

    if let Some(session_id) = request
        .get("session_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    {
        if let Some(home) = &home {
            audit::write_denial(home, session_id, command, &denial.segment, &denial.reason, cwd);
        }
    }

    print_deny(format!(
        "BLOCKED by Safety Net\n\nReason: {}\n\nCommand: {}\n\nSegment: {}\n\n\
         If this operation is truly needed, ask the user for explicit permission \
         and have them run the command manually.",
        denial.reason,
        safe_excerpt(command),
        safe_excerpt(&denial.segment),
    ));
}
