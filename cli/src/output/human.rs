//! Human-readable terminal renderer.

use std::path::Path;

use owo_colors::OwoColorize as _;

use crate::application::services::bulk::BulkTally;
use crate::application::services::reconcile::{FleetPlan, FleetReport, SharedPlan};
use crate::domain::config::{config_entries, FlotillaConfig};
use crate::domain::diff::{FieldUpdate, OperationSet};
use crate::domain::resources::{Agent, AgentSummary};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        self.ctx.info(&format!("flotilla v{version}"));
    }

    /// Render the store-side agent listing.
    pub fn render_agent_list(&self, agents: &[AgentSummary]) {
        if agents.is_empty() {
            if !self.ctx.quiet {
                println!("No agents on the store. Declare a fleet and run: flotilla apply");
            }
            return;
        }

        println!("Agents on the store:\n");
        for agent in agents {
            let model = agent.model.as_deref().unwrap_or("");
            println!("  {:<28} {:<26} {}", agent.name, model, agent.id);
        }
        println!("\nInspect one: flotilla agents info <name>");
    }

    /// Render one agent's full configuration and attachments.
    pub fn render_agent_info(&self, agent: &Agent) {
        println!();
        println!("  {}", agent.name.style(self.ctx.styles.header));
        println!();
        self.ctx.kv("id:", &agent.id);
        self.ctx.kv("model:", &agent.model);
        if let Some(embedding) = &agent.embedding {
            self.ctx.kv("embedding:", embedding);
        }
        self.ctx.kv("context window:", &agent.context_window.to_string());
        self.ctx.kv("reasoning:", on_off(agent.reasoning));

        if !agent.tools.is_empty() {
            println!();
            self.ctx.header("Tools:");
            for tool in &agent.tools {
                let desc = tool.description.as_deref().unwrap_or("");
                println!("    {:<24} {desc}", tool.name);
            }
        }
        if !agent.blocks.is_empty() {
            println!();
            self.ctx.header("Memory blocks:");
            for block in &agent.blocks {
                println!(
                    "    {:<24} {} / {} chars",
                    block.label,
                    block.value.len(),
                    block.limit
                );
            }
        }
        if !agent.folders.is_empty() {
            println!();
            self.ctx.header("Folders:");
            for folder in &agent.folders {
                println!("    {:<24} {} file(s)", folder.name, folder.files.len());
            }
        }
        if !agent.archives.is_empty() {
            println!();
            self.ctx.header("Archives:");
            for archive in &agent.archives {
                let desc = archive.description.as_deref().unwrap_or("");
                println!("    {:<24} {desc}", archive.name);
            }
        }
        println!();
    }

    /// Render the current flotilla configuration.
    pub fn render_config(&self, config: &FlotillaConfig, path: &Path) {
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        for (key, value) in config_entries(config) {
            println!("  {key:<20} {value}");
        }
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        for var in [
            "FLOTILLA_CONFIG",
            "FLOTILLA_BASE_URL",
            "FLOTILLA_API_KEY",
            "NO_COLOR",
        ] {
            println!("    {:<20} {}", format!("{var}:"), env_display(var));
        }
        println!();
    }

    /// Render a full dry-run plan: shared-resource actions first, then one
    /// section per declared agent.
    pub fn render_plan(&self, plan: &FleetPlan) {
        if plan.is_converged() {
            self.ctx.success("Fleet is in sync; nothing to do.");
            return;
        }

        if !plan.shared.is_empty() {
            println!();
            self.ctx.header("Shared resources:");
            self.render_shared(&plan.shared);
        }

        for agent in &plan.agents {
            println!();
            println!("  {}", agent_title(agent).style(self.ctx.styles.bold));
            if agent.create {
                self.plus(&format!("create agent '{}'", agent.resolved_name));
            } else if agent.operations.is_empty() {
                println!("    {} in sync", "✓".style(self.ctx.styles.success));
                continue;
            }
            self.render_operations(&agent.operations);
        }

        println!();
        let shared = shared_pending_count(&plan.shared);
        let agent_ops: usize = plan
            .agents
            .iter()
            .map(|a| a.operations.operation_count())
            .sum();
        self.ctx.info(&format!(
            "{shared} shared change(s), {agent_ops} agent operation(s) pending. Run: flotilla apply"
        ));
    }

    /// Render the per-agent convergence summary.
    pub fn render_status(&self, plan: &FleetPlan) {
        let shared = shared_pending_count(&plan.shared);
        if shared > 0 {
            self.ctx
                .warn(&format!("shared resources: {shared} change(s) pending"));
        }

        for agent in &plan.agents {
            let title = agent_title(agent);
            if agent.create {
                self.ctx
                    .warn(&format!("{title}: missing (apply will create it)"));
                continue;
            }
            let pending = agent.operations.operation_count();
            if pending == 0 {
                self.ctx.success(&format!("{title}: in sync"));
            } else {
                self.ctx
                    .warn(&format!("{title}: {pending} operation(s) pending"));
            }
            if agent.config_differs {
                self.ctx.info(&format!(
                    "{title}: config drifted (apply --new-version mints a new version)"
                ));
            }
        }

        println!();
        if plan.is_converged() {
            self.ctx.success("Fleet is in sync.");
        } else {
            self.ctx
                .info("Details: flotilla plan. Converge: flotilla apply");
        }
    }

    /// Render the end-of-apply summary. Per-agent progress has already
    /// been streamed by the reporter, so this is failures plus a tally.
    pub fn render_fleet_report(&self, report: &FleetReport) {
        println!();
        for failure in &report.failed {
            self.ctx
                .error(&format!("{}: {}", failure.name, failure.error));
        }
        let summary = report_summary(report);
        if report.success() {
            self.ctx.success(&summary);
        } else {
            self.ctx.error(&summary);
        }
    }

    /// Render the end-of-send tally. Per-target outcomes have already
    /// been streamed during the fan-out.
    pub fn render_bulk(&self, tally: &BulkTally) {
        println!();
        let summary = bulk_summary(tally);
        if tally.all_completed() {
            self.ctx.success(&summary);
        } else {
            self.ctx.warn(&summary);
        }
    }

    /// Render one agent's categorized operations as `+`/`-`/`~` lines.
    pub fn render_operations(&self, set: &OperationSet) {
        for update in &set.field_updates {
            self.tilde(&field_update_line(update));
        }

        for tool in &set.tools.to_add {
            self.plus(&format!("attach tool '{}'", tool.name));
        }
        for tool in &set.tools.to_update {
            self.tilde(&format!("update tool '{}' ({})", tool.name, tool.reason));
        }
        for tool in &set.tools.to_remove {
            self.minus(&format!("detach tool '{}'", tool.name));
        }

        for block in &set.blocks.to_add {
            self.plus(&format!("attach block '{}'", block.label));
        }
        for sync in &set.blocks.to_update_value {
            self.tilde(&format!("sync block '{}'", sync.label));
        }
        for swap in &set.blocks.to_update {
            self.tilde(&format!("swap block to '{}'", swap.label));
        }
        for block in &set.blocks.to_remove {
            self.minus(&format!("detach block '{}'", block.label));
        }

        for folder in &set.folders.to_attach {
            self.plus(&format!("attach folder '{}'", folder.name));
        }
        for ops in &set.folders.file_ops {
            for file in &ops.files_to_add {
                self.plus(&format!("upload {}/{}", ops.folder_name, file.name));
            }
            for file in &ops.files_to_update {
                self.tilde(&format!("replace {}/{}", ops.folder_name, file.name));
            }
            for file in &ops.files_to_remove {
                self.minus(&format!("delete {}/{}", ops.folder_name, file.name));
            }
        }
        for folder in &set.folders.to_detach {
            self.minus(&format!("detach folder '{}'", folder.name));
        }

        for archive in &set.archives.to_attach {
            self.plus(&format!("attach archive '{}'", archive.name));
        }
        for archive in &set.archives.to_update {
            self.tilde(&format!("update archive '{}' description", archive.name));
        }
        for archive in &set.archives.to_detach {
            self.minus(&format!("detach archive '{}'", archive.name));
        }
    }

    fn render_shared(&self, shared: &SharedPlan) {
        for name in &shared.blocks_to_create {
            self.plus(&format!("create block '{name}'"));
        }
        for name in &shared.blocks_to_sync {
            self.tilde(&format!("sync block '{name}'"));
        }
        for name in &shared.blocks_to_version {
            self.tilde(&format!("version block '{name}'"));
        }
        for name in &shared.tools_to_create {
            self.plus(&format!("create tool '{name}'"));
        }
        for name in &shared.tools_to_update {
            self.tilde(&format!("update tool '{name}'"));
        }
        for name in &shared.mcp_servers_to_register {
            self.plus(&format!("register MCP server '{name}'"));
        }
        for name in &shared.folders_to_create {
            self.plus(&format!("create folder '{name}'"));
        }
        for name in &shared.archives_to_create {
            self.plus(&format!("create archive '{name}'"));
        }
    }

    fn plus(&self, msg: &str) {
        println!("    {} {msg}", "+".style(self.ctx.styles.added));
    }

    fn minus(&self, msg: &str) {
        println!("    {} {msg}", "-".style(self.ctx.styles.removed));
    }

    fn tilde(&self, msg: &str) {
        println!("    {} {msg}", "~".style(self.ctx.styles.changed));
    }
}

// ── Display helpers (used by tests and output layer) ─────────────────────────

/// One pending-change line for a scalar field update. The system prompt
/// is summarized without values (it is usually multi-line).
#[must_use]
pub fn field_update_line(update: &FieldUpdate) -> String {
    match update {
        FieldUpdate::System { .. } => "update system prompt".to_string(),
        FieldUpdate::Model { from, to } => format!("model {from} → {to}"),
        FieldUpdate::Embedding { from, to } => format!(
            "embedding {} → {to}",
            from.as_deref().unwrap_or("(store default)")
        ),
        FieldUpdate::ContextWindow { from, to } => format!("context window {from} → {to}"),
        FieldUpdate::Reasoning { from, to } => {
            format!("reasoning {} → {}", on_off(*from), on_off(*to))
        }
    }
}

/// Plan-section title: manifest name, with the resolved store name in
/// parentheses when versioning makes them differ.
#[must_use]
pub fn agent_title(agent: &crate::application::services::reconcile::AgentPlan) -> String {
    if agent.name == agent.resolved_name {
        agent.name.clone()
    } else {
        format!("{} ({})", agent.name, agent.resolved_name)
    }
}

#[must_use]
pub fn shared_pending_count(shared: &SharedPlan) -> usize {
    shared.blocks_to_create.len()
        + shared.blocks_to_sync.len()
        + shared.blocks_to_version.len()
        + shared.tools_to_create.len()
        + shared.tools_to_update.len()
        + shared.mcp_servers_to_register.len()
        + shared.folders_to_create.len()
        + shared.archives_to_create.len()
}

#[must_use]
pub fn report_summary(report: &FleetReport) -> String {
    format!(
        "{} converged, {} unchanged, {} failed",
        report.succeeded.len(),
        report.unchanged.len(),
        report.failed.len()
    )
}

#[must_use]
pub fn bulk_summary(tally: &BulkTally) -> String {
    format!(
        "{} completed, {} failed, {} timed out, {} cancelled",
        tally.completed, tally.failed, tally.timed_out, tally.cancelled
    )
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn env_display(var: &str) -> String {
    match std::env::var(var) {
        // never echo a credential back to the terminal
        Ok(_) if var == "FLOTILLA_API_KEY" => "********".to_string(),
        Ok(value) => value,
        Err(_) => "(not set)".to_string(),
    }
}
