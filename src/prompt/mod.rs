//! System-instruction template
//!
//! The instruction is assembled once at process start: the template's
//! `{POLITICAS}` placeholder is filled with the live policy fetch. It is not
//! re-evaluated per turn.

use anyhow::{Context, Result};
use std::path::Path;

/// Built-in template, used when no prompt path is configured
pub const DEFAULT_TEMPLATE: &str = include_str!("../../prompt.txt");

/// Placeholder substituted with the policy fetch result
const POLICY_PLACEHOLDER: &str = "{POLITICAS}";

/// Load the template from `path`, or the built-in one when `path` is `None`.
pub fn load_template(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt template {}", path.display())),
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}

/// Fill the policy placeholder. `policy_json` is the JSON text returned by
/// the policy fetch (`{"policy": ...}`), empty-valued when the fetch failed.
pub fn render_system_instruction(template: &str, policy_json: &str) -> String {
    template.replace(POLICY_PLACEHOLDER, policy_json)
}
