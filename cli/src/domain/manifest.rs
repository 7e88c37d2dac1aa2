//! Fleet manifest validation.
//!
//! Structural checks only, collected rather than fail-fast so a bad
//! manifest reports every problem at once. Checks that need file access
//! (value sizes, missing files) happen in the fleet loader, which appends
//! to the same issue list before bailing.

use std::collections::HashSet;

use flotilla_common::{FleetManifest, names};

use crate::domain::resources::is_builtin_tool;

/// Where a referenced tool name is expected to come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOrigin {
    Builtin,
    Custom,
    /// Assumed MCP-provided; verified against the server listings at
    /// reconcile time.
    Mcp,
}

/// Classify a referenced tool name against the manifest's declarations.
///
/// `None` means the reference cannot be satisfied: it is neither builtin,
/// nor defined under `tools:`, and no MCP server is declared that could
/// provide it.
#[must_use]
pub fn classify_tool(manifest: &FleetManifest, name: &str) -> Option<ToolOrigin> {
    if is_builtin_tool(name) {
        return Some(ToolOrigin::Builtin);
    }
    if manifest.tools.iter().any(|t| t.name == name) {
        return Some(ToolOrigin::Custom);
    }
    if !manifest.mcp_servers.is_empty() {
        // which server provides it is only knowable by listing them
        return Some(ToolOrigin::Mcp);
    }
    None
}

/// Structural validation issues, one human-readable line each.
/// An empty list means the manifest is structurally valid.
#[must_use]
pub fn validation_issues(manifest: &FleetManifest) -> Vec<String> {
    let mut issues = Vec::new();

    if let Some(fleet) = &manifest.fleet {
        if let Err(e) = names::validate_agent_name(fleet) {
            issues.push(format!("fleet: {e}"));
        }
    }

    check_shared_blocks(manifest, &mut issues);
    check_tools(manifest, &mut issues);
    check_mcp_servers(manifest, &mut issues);
    check_agents(manifest, &mut issues);

    issues
}

fn check_shared_blocks(manifest: &FleetManifest, issues: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for block in &manifest.shared_blocks {
        if let Err(e) = names::validate_block_label(&block.name) {
            issues.push(format!("shared block '{}': {e}", block.name));
        }
        if !names::is_shared_name(&block.name) {
            issues.push(format!(
                "shared block '{}': name must carry the '{}' prefix",
                block.name,
                names::SHARED_PREFIX
            ));
        }
        if !seen.insert(block.name.as_str()) {
            issues.push(format!("shared block '{}': duplicate name", block.name));
        }
        check_block_source(&block.name, block.value.is_some(), block.value_file.is_some(), issues);
    }
}

fn check_tools(manifest: &FleetManifest, issues: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for tool in &manifest.tools {
        if let Err(e) = names::validate_block_label(&tool.name) {
            issues.push(format!("tool '{}': {e}", tool.name));
        }
        if is_builtin_tool(&tool.name) {
            issues.push(format!(
                "tool '{}': name collides with a builtin tool",
                tool.name
            ));
        }
        if !seen.insert(tool.name.as_str()) {
            issues.push(format!("tool '{}': duplicate name", tool.name));
        }
        if tool.source_file.is_empty() {
            issues.push(format!("tool '{}': source_file must not be empty", tool.name));
        }
    }
}

fn check_mcp_servers(manifest: &FleetManifest, issues: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for server in &manifest.mcp_servers {
        if let Err(e) = names::validate_block_label(&server.name) {
            issues.push(format!("mcp server '{}': {e}", server.name));
        }
        if !seen.insert(server.name.as_str()) {
            issues.push(format!("mcp server '{}': duplicate name", server.name));
        }
        if !server.url.starts_with("http://") && !server.url.starts_with("https://") {
            issues.push(format!(
                "mcp server '{}': url must be http(s), got '{}'",
                server.name, server.url
            ));
        }
    }
}

fn check_agents(manifest: &FleetManifest, issues: &mut Vec<String>) {
    let shared_declared: HashSet<&str> = manifest
        .shared_blocks
        .iter()
        .map(|b| b.name.as_str())
        .collect();

    let mut seen_agents = HashSet::new();
    for agent in &manifest.agents {
        let who = format!("agent '{}'", agent.name);

        if let Err(e) = names::validate_agent_name(&agent.name) {
            issues.push(format!("{who}: {e}"));
        }
        if !seen_agents.insert(agent.name.as_str()) {
            issues.push(format!("{who}: duplicate name"));
        }

        match (&agent.system_prompt, &agent.system_prompt_file) {
            (None, None) => {
                issues.push(format!("{who}: provide system_prompt or system_prompt_file"));
            }
            (Some(_), Some(_)) => issues.push(format!(
                "{who}: system_prompt and system_prompt_file are mutually exclusive"
            )),
            _ => {}
        }

        if agent.context_window == 0 {
            issues.push(format!("{who}: context_window must be positive"));
        }

        for tool in &agent.tools {
            if classify_tool(manifest, tool).is_none() {
                issues.push(format!(
                    "{who}: unknown tool '{tool}' (not builtin, not defined under tools:, and no mcp_servers declared)"
                ));
            }
        }

        let mut seen_blocks = HashSet::new();
        for block in &agent.blocks {
            if let Err(e) = names::validate_block_label(&block.name) {
                issues.push(format!("{who}: block '{}': {e}", block.name));
            }
            if names::is_shared_name(&block.name) {
                issues.push(format!(
                    "{who}: block '{}': agent-scoped blocks must not carry the '{}' prefix",
                    block.name,
                    names::SHARED_PREFIX
                ));
            }
            if !seen_blocks.insert(block.name.as_str()) {
                issues.push(format!("{who}: block '{}': duplicate name", block.name));
            }
            check_block_source(
                &format!("{who}: block '{}'", block.name),
                block.value.is_some(),
                block.value_file.is_some(),
                issues,
            );
        }

        for reference in &agent.shared_blocks {
            if !shared_declared.contains(reference.as_str()) {
                issues.push(format!(
                    "{who}: shared block '{reference}' is not declared under shared_blocks:"
                ));
            }
            if !seen_blocks.insert(reference.as_str()) {
                issues.push(format!("{who}: block '{reference}': duplicate name"));
            }
        }

        let mut seen_folders = HashSet::new();
        for folder in &agent.folders {
            if let Err(e) = names::validate_agent_name(&folder.name) {
                issues.push(format!("{who}: folder '{}': {e}", folder.name));
            }
            if !seen_folders.insert(folder.name.as_str()) {
                issues.push(format!("{who}: folder '{}': duplicate name", folder.name));
            }
        }

        let mut seen_archives = HashSet::new();
        for archive in &agent.archives {
            if let Err(e) = names::validate_agent_name(&archive.name) {
                issues.push(format!("{who}: archive '{}': {e}", archive.name));
            }
            if !seen_archives.insert(archive.name.as_str()) {
                issues.push(format!("{who}: archive '{}': duplicate name", archive.name));
            }
        }
    }
}

fn check_block_source(who: &str, has_value: bool, has_file: bool, issues: &mut Vec<String>) {
    match (has_value, has_file) {
        (false, false) => issues.push(format!("{who}: provide value or value_file")),
        (true, true) => issues.push(format!("{who}: value and value_file are mutually exclusive")),
        _ => {}
    }
}
