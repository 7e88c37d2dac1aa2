use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current lock manifest schema version.
pub const LOCK_VERSION: u32 = 1;

/// Resolved-identity record for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLock {
    /// Remote-assigned agent id.
    pub id: String,
    /// The store-side name, version suffix included (e.g. `triage__v3`).
    pub resolved_name: String,
}

/// The reconciliation output artifact (`flotilla.lock.json`): every
/// declared resource name mapped to its resolved remote id.
///
/// BTreeMaps keep the serialized artifact diff-stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockManifest {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fleet: Option<String>,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentLock>,
    #[serde(default)]
    pub shared_blocks: BTreeMap<String, String>,
    #[serde(default)]
    pub tools: BTreeMap<String, String>,
    #[serde(default)]
    pub folders: BTreeMap<String, String>,
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, String>,
}

impl LockManifest {
    /// Fresh, empty lock manifest stamped with the current time.
    #[must_use]
    pub fn new(fleet: Option<String>) -> Self {
        Self {
            version: LOCK_VERSION,
            generated_at: Utc::now(),
            fleet,
            agents: BTreeMap::new(),
            shared_blocks: BTreeMap::new(),
            tools: BTreeMap::new(),
            folders: BTreeMap::new(),
            mcp_servers: BTreeMap::new(),
        }
    }
}
