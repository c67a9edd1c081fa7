//! Verify the user- and project-scope safety-net config files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cc_safety_net::config::{user_config_path, validate_config_file};

fn print_errors(scope: &str, path: &Path, errors: &[String]) {
    eprintln!("\n{scope} config: {}", path.display());
    eprintln!("{}", "-".repeat(60));
    for error in errors {
        for part in error.split("; ") {
            eprintln!("  \u{2717} {part}");
        }
    }
}

fn main() -> ExitCode {
    let user_config = dirs::home_dir().map(|home| user_config_path(&home));
    let project_config = PathBuf::from(".safety-net.json");

    let mut has_errors = false;
    let mut scopes: Vec<&str> = Vec::new();

    if let Some(path) = user_config.as_ref().filter(|p| p.exists()) {
        scopes.push("user");
        let result = validate_config_file(path);
        if !result.errors.is_empty() {
            has_errors = true;
            print_errors("User", path, &result.errors);
        }
    }

    if project_config.exists() {
        scopes.push("project");
        let result = validate_config_file(&project_config);
        if !result.errors.is_empty() {
            has_errors = true;
            let resolved = project_config
                .canonicalize()
                .unwrap_or_else(|_| project_config.clone());
            print_errors("Project", &resolved, &result.errors);
        }
    }

    if has_errors {
        eprintln!("\nConfig validation failed.");
        return ExitCode::FAILURE;
    }

    if scopes.is_empty() {
        println!("No config files found. Using built-in rules only.");
    } else {
        println!("Config OK ({})", scopes.join(", "));
    }

    ExitCode::SUCCESS
}
