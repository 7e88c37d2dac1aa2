//! Application service — the per-run agent registry.
//!
//! Maps each base agent name to its active remote identity. Versioned
//! names (`triage__v2`) register under their base; only the highest
//! version per base is the active agent.

use std::collections::HashMap;

use anyhow::Result;

use crate::application::ports::AgentStore;
use crate::domain::fingerprint::agent_config_fingerprint;
use crate::domain::resources::Agent;
use crate::domain::version::{split_version, versioned_name};

/// The active remote agent for one base name.
#[derive(Debug, Clone)]
pub struct AgentRecord {
    pub id: String,
    /// Store-side name, version suffix included.
    pub name: String,
    pub version: u32,
}

/// Outcome of resolving one desired agent against the registry.
#[derive(Debug)]
pub struct AgentResolution {
    /// The store-side name to converge on (may carry a new version suffix).
    pub resolved_name: String,
    /// True when no suitable remote agent exists and one must be created.
    pub should_create: bool,
    /// True when an agent exists but its configuration fingerprint differs.
    pub config_differs: bool,
    /// The full observed agent, fetched once here and reused as the diff's
    /// observed side. `None` only when no agent exists for the base name.
    pub existing: Option<Agent>,
}

/// Purely a fingerprint comparison, no remote calls.
#[derive(Debug, Clone)]
pub struct ConfigDelta {
    pub differs: bool,
    pub observed_fingerprint: String,
    pub desired_fingerprint: String,
}

#[derive(Debug, Default)]
pub struct AgentRegistry {
    active: HashMap<String, AgentRecord>,
}

impl AgentRegistry {
    /// Populate from the store's agent list, keeping the highest version
    /// per base name.
    pub async fn load_observed(store: &impl AgentStore) -> Result<Self> {
        let mut registry = Self::default();
        for summary in store.list_agents().await? {
            let (base, version) = split_version(&summary.name);
            let record = AgentRecord {
                id: summary.id.clone(),
                name: summary.name.clone(),
                version,
            };
            match registry.active.get(base) {
                Some(current) if current.version >= version => {}
                _ => {
                    registry.active.insert(base.to_string(), record);
                }
            }
        }
        Ok(registry)
    }

    #[must_use]
    pub fn get(&self, base: &str) -> Option<&AgentRecord> {
        self.active.get(base)
    }

    /// Record a newly created agent as the active one for its base name.
    pub fn register(&mut self, base: &str, record: AgentRecord) {
        self.active.insert(base.to_string(), record);
    }

    /// Resolve one desired agent. With `new_version` set, a fingerprint
    /// mismatch resolves to the next version name instead of in-place
    /// convergence; an unchanged fingerprint still reuses the existing
    /// agent (no pointless new version).
    pub async fn resolve(
        &self,
        store: &impl AgentStore,
        base: &str,
        desired_fingerprint: &str,
        new_version: bool,
    ) -> Result<AgentResolution> {
        let Some(record) = self.active.get(base) else {
            return Ok(AgentResolution {
                resolved_name: base.to_string(),
                should_create: true,
                config_differs: false,
                existing: None,
            });
        };
        let observed = store.get_agent(&record.id).await?;
        let delta = config_changes(&observed, desired_fingerprint);
        if delta.differs && new_version {
            return Ok(AgentResolution {
                resolved_name: versioned_name(base, record.version + 1),
                should_create: true,
                config_differs: true,
                existing: Some(observed),
            });
        }
        Ok(AgentResolution {
            resolved_name: record.name.clone(),
            should_create: false,
            config_differs: delta.differs,
            existing: Some(observed),
        })
    }
}

/// Find one agent by user-supplied name: an explicitly versioned name
/// must match exactly; a base name resolves to its highest version.
///
/// # Errors
///
/// Returns `AgentError::NotFound` when nothing matches.
pub async fn find_agent(store: &impl AgentStore, name: &str) -> Result<AgentRecord> {
    let (base, _) = split_version(name);
    let explicit = base != name;
    let mut best: Option<AgentRecord> = None;
    for summary in store.list_agents().await? {
        if explicit {
            if summary.name == name {
                let (_, version) = split_version(&summary.name);
                return Ok(AgentRecord {
                    id: summary.id,
                    name: summary.name,
                    version,
                });
            }
            continue;
        }
        let (candidate_base, version) = split_version(&summary.name);
        if candidate_base != base {
            continue;
        }
        match &best {
            Some(current) if current.version >= version => {}
            _ => {
                best = Some(AgentRecord {
                    id: summary.id.clone(),
                    name: summary.name.clone(),
                    version,
                });
            }
        }
    }
    best.ok_or_else(|| crate::domain::error::AgentError::NotFound(name.to_string()).into())
}

/// Compare an observed agent's mutable surface against a desired
/// fingerprint.
#[must_use]
pub fn config_changes(observed: &Agent, desired_fingerprint: &str) -> ConfigDelta {
    let pairs: Vec<(String, Option<String>)> = observed
        .tools
        .iter()
        .map(|t| (t.name.clone(), t.source_hash()))
        .collect();
    let observed_fingerprint = agent_config_fingerprint(&observed.system, &pairs);
    ConfigDelta {
        differs: observed_fingerprint != desired_fingerprint,
        observed_fingerprint,
        desired_fingerprint: desired_fingerprint.to_string(),
    }
}
