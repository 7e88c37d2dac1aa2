//! Application service — fleet manifest loading and resolution.
//!
//! Turns the on-disk manifest into a fully resolved desired state: prompt
//! and value files read, tool sources read and fingerprinted, folder files
//! fingerprinted, MCP tokens pulled from the environment. Structural and
//! content problems are collected into one validation error rather than
//! failing on the first.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flotilla_common::FleetManifest;

use crate::application::ports::{LocalFs, McpServerBinding};
use crate::domain::error::ManifestError;
use crate::domain::fingerprint::fingerprint;
use crate::domain::manifest::validation_issues;

/// The manifest with every external reference resolved.
#[derive(Debug, Clone)]
pub struct LoadedFleet {
    pub fleet: Option<String>,
    pub shared_blocks: Vec<LoadedBlock>,
    pub tools: Vec<LoadedTool>,
    pub mcp_servers: Vec<McpServerBinding>,
    pub agents: Vec<LoadedAgent>,
}

#[derive(Debug, Clone)]
pub struct LoadedAgent {
    /// Base name as declared; versioning happens at resolve time.
    pub name: String,
    pub system: String,
    pub model: String,
    pub embedding: Option<String>,
    pub context_window: u32,
    pub reasoning: bool,
    /// Referenced tool names (builtin, custom, or MCP-provided).
    pub tools: Vec<String>,
    pub blocks: Vec<LoadedBlock>,
    pub shared_block_refs: Vec<String>,
    pub folders: Vec<LoadedFolder>,
    pub archives: Vec<LoadedArchive>,
}

#[derive(Debug, Clone)]
pub struct LoadedBlock {
    pub name: String,
    pub description: Option<String>,
    pub limit: u32,
    pub value: String,
    pub mutable: bool,
}

#[derive(Debug, Clone)]
pub struct LoadedTool {
    pub name: String,
    pub description: Option<String>,
    pub source_code: String,
    pub source_hash: String,
}

#[derive(Debug, Clone)]
pub struct LoadedFolder {
    pub name: String,
    pub files: Vec<LoadedFile>,
}

#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub name: String,
    pub path: PathBuf,
    pub content_hash: String,
}

#[derive(Debug, Clone)]
pub struct LoadedArchive {
    pub name: String,
    pub description: Option<String>,
}

/// Load and fully resolve the fleet manifest at `manifest_path`.
///
/// # Errors
///
/// Returns `ManifestError::NotFound` if the file does not exist, a parse
/// error if it is not valid YAML, and `ManifestError::ValidationFailed`
/// carrying every collected structural and content problem otherwise.
pub fn load_fleet(fs: &impl LocalFs, manifest_path: &Path) -> Result<LoadedFleet> {
    if !fs.exists(manifest_path) {
        return Err(ManifestError::NotFound(manifest_path.display().to_string()).into());
    }
    let content = fs
        .read_to_string(manifest_path)
        .with_context(|| format!("reading {}", manifest_path.display()))?;
    let manifest: FleetManifest =
        serde_yaml::from_str(&content).context("failed to parse fleet manifest")?;

    let mut issues = validation_issues(&manifest);
    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let fleet = resolve_fleet(fs, base_dir, &manifest, &mut issues);

    if issues.is_empty() {
        Ok(fleet)
    } else {
        Err(ManifestError::ValidationFailed(issues.join("\n")).into())
    }
}

fn resolve_fleet(
    fs: &impl LocalFs,
    base_dir: &Path,
    manifest: &FleetManifest,
    issues: &mut Vec<String>,
) -> LoadedFleet {
    let shared_blocks = manifest
        .shared_blocks
        .iter()
        .map(|b| resolve_block(fs, base_dir, &format!("shared block '{}'", b.name), b, issues))
        .collect();

    let tools = manifest
        .tools
        .iter()
        .map(|t| {
            let source_code = read_text(
                fs,
                base_dir,
                &t.source_file,
                &format!("tool '{}' source", t.name),
                issues,
            );
            let source_hash = fingerprint(&source_code);
            LoadedTool {
                name: t.name.clone(),
                description: t.description.clone(),
                source_code,
                source_hash,
            }
        })
        .collect();

    let mcp_servers = manifest
        .mcp_servers
        .iter()
        .map(|s| {
            let token = s.token_env.as_ref().and_then(|var| {
                std::env::var(var).ok().or_else(|| {
                    issues.push(format!(
                        "mcp server '{}': environment variable '{var}' is not set",
                        s.name
                    ));
                    None
                })
            });
            McpServerBinding {
                name: s.name.clone(),
                url: s.url.clone(),
                token,
            }
        })
        .collect();

    let agents = manifest
        .agents
        .iter()
        .map(|a| {
            let who = format!("agent '{}'", a.name);
            let system = resolve_inline_or_file(
                fs,
                base_dir,
                a.system_prompt.as_deref(),
                a.system_prompt_file.as_deref(),
                &format!("{who} system prompt"),
                issues,
            );
            let blocks = a
                .blocks
                .iter()
                .map(|b| {
                    resolve_block(fs, base_dir, &format!("{who}: block '{}'", b.name), b, issues)
                })
                .collect();
            let folders = a
                .folders
                .iter()
                .map(|f| resolve_folder(fs, base_dir, &who, &f.name, &f.files, issues))
                .collect();
            LoadedAgent {
                name: a.name.clone(),
                system,
                model: a.model.clone(),
                embedding: a.embedding.clone(),
                context_window: a.context_window,
                reasoning: a.reasoning,
                tools: a.tools.clone(),
                blocks,
                shared_block_refs: a.shared_blocks.clone(),
                folders,
                archives: a
                    .archives
                    .iter()
                    .map(|ar| LoadedArchive {
                        name: ar.name.clone(),
                        description: ar.description.clone(),
                    })
                    .collect(),
            }
        })
        .collect();

    LoadedFleet {
        fleet: manifest.fleet.clone(),
        shared_blocks,
        tools,
        mcp_servers,
        agents,
    }
}

fn resolve_block(
    fs: &impl LocalFs,
    base_dir: &Path,
    who: &str,
    spec: &flotilla_common::BlockSpec,
    issues: &mut Vec<String>,
) -> LoadedBlock {
    let value = resolve_inline_or_file(
        fs,
        base_dir,
        spec.value.as_deref(),
        spec.value_file.as_deref(),
        &format!("{who} value"),
        issues,
    );
    let length = value.chars().count();
    if length > spec.limit as usize {
        issues.push(format!(
            "{who}: value length {length} exceeds limit {}",
            spec.limit
        ));
    }
    LoadedBlock {
        name: spec.name.clone(),
        description: spec.description.clone(),
        limit: spec.limit,
        value,
        mutable: spec.mutable,
    }
}

fn resolve_folder(
    fs: &impl LocalFs,
    base_dir: &Path,
    who: &str,
    folder_name: &str,
    files: &[String],
    issues: &mut Vec<String>,
) -> LoadedFolder {
    let mut seen = HashSet::new();
    let loaded = files
        .iter()
        .map(|rel| {
            let path = base_dir.join(rel);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| rel.clone());
            if !seen.insert(name.clone()) {
                issues.push(format!(
                    "{who}: folder '{folder_name}': duplicate file name '{name}'"
                ));
            }
            let content_hash = match fs.read(&path) {
                Ok(bytes) => fingerprint(&bytes),
                Err(_) => {
                    issues.push(format!(
                        "{who}: folder '{folder_name}': file not found: {rel}"
                    ));
                    String::new()
                }
            };
            LoadedFile {
                name,
                path,
                content_hash,
            }
        })
        .collect();
    LoadedFolder {
        name: folder_name.to_string(),
        files: loaded,
    }
}

/// Resolve an inline-or-file text source. Mutual exclusivity and presence
/// are already reported by structural validation; here a missing file is
/// the only new failure mode.
fn resolve_inline_or_file(
    fs: &impl LocalFs,
    base_dir: &Path,
    inline: Option<&str>,
    file: Option<&str>,
    what: &str,
    issues: &mut Vec<String>,
) -> String {
    match (inline, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(rel)) => read_text(fs, base_dir, rel, what, issues),
        (None, None) => String::new(),
    }
}

fn read_text(
    fs: &impl LocalFs,
    base_dir: &Path,
    rel: &str,
    what: &str,
    issues: &mut Vec<String>,
) -> String {
    let path = base_dir.join(rel);
    match fs.read_to_string(&path) {
        Ok(text) => text,
        Err(_) => {
            issues.push(format!("{what}: cannot read file: {rel}"));
            String::new()
        }
    }
}
