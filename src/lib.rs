//! Git/filesystem safety net for AI coding assistants.
//!
//! The library turns a proposed Bash command plus contextual metadata into
//! an allow/deny decision. It blocks a closed catalog of irreversible
//! operations (rm -rf outside scratch areas, history-destroying git actions,
//! find -delete, dispatcher-driven deletion) plus user-configured rules,
//! while leaving ordinary development activity alone. It is a safety net
//! against accidents, not a sandbox against adversaries.

pub mod analyzer;
pub mod audit;
pub mod config;
pub mod dispatch;
pub mod heuristics;
pub mod rules_custom;
pub mod rules_find;
pub mod rules_git;
pub mod rules_rm;
pub mod shell;
