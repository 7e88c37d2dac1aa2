//! Application service — the per-run block registry.
//!
//! An owned map from block key to remote block record, populated once from
//! the store at the start of a reconciliation and mutated as blocks are
//! created, synced, or versioned. Shared entries come from the global block
//! list; agent-scoped entries are seeded from each observed agent's own
//! attachments, so same-labelled blocks on different agents never collide.

use std::collections::HashMap;

use anyhow::Result;

use crate::application::ports::{BlockStore, NewBlock};
use crate::application::services::fleet_loader::LoadedBlock;
use crate::domain::classify::is_shared_name;
use crate::domain::fingerprint::{fingerprint, short_fingerprint};
use crate::domain::resources::{Agent, BlockResolution};
use crate::domain::version::{split_content_token, versioned_label};

/// Registry key: shared blocks are fleet-global, agent-scoped blocks are
/// namespaced by the owning agent's base name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKey {
    Shared(String),
    AgentScoped { agent: String, base: String },
}

/// One known remote block, keyed by base label.
#[derive(Debug, Clone)]
pub struct BlockRecord {
    pub id: String,
    /// Full label as it exists remotely (version token included).
    pub label: String,
    pub content_hash: String,
    pub shared: bool,
}

#[derive(Debug, Default)]
pub struct BlockRegistry {
    entries: HashMap<BlockKey, BlockRecord>,
}

impl BlockRegistry {
    /// Populate shared entries from the store's current block list.
    /// Versioned labels register under their base label; the list is in
    /// creation order, so the newest version wins.
    pub async fn load_observed(store: &impl BlockStore) -> Result<Self> {
        let mut registry = Self::default();
        for block in store.list_blocks().await? {
            let (base, _) = split_content_token(&block.label);
            if !is_shared_name(base) {
                continue;
            }
            registry.entries.insert(
                BlockKey::Shared(base.to_string()),
                BlockRecord {
                    id: block.id.clone(),
                    label: block.label.clone(),
                    content_hash: block.content_hash(),
                    shared: true,
                },
            );
        }
        Ok(registry)
    }

    /// Seed agent-scoped entries from an observed agent's attachments.
    /// Called once per agent before assembly; `agent` is the manifest base
    /// name, not the versioned store name.
    pub fn register_agent_blocks(&mut self, agent: &str, observed: &Agent) {
        for block in &observed.blocks {
            let (base, _) = split_content_token(&block.label);
            if is_shared_name(base) {
                continue;
            }
            self.entries.insert(
                BlockKey::AgentScoped {
                    agent: agent.to_string(),
                    base: base.to_string(),
                },
                BlockRecord {
                    id: block.id.clone(),
                    label: block.label.clone(),
                    content_hash: block.content_hash(),
                    shared: false,
                },
            );
        }
    }

    #[must_use]
    pub fn lookup_shared(&self, base: &str) -> Option<&BlockRecord> {
        self.entries.get(&BlockKey::Shared(base.to_string()))
    }

    #[must_use]
    pub fn lookup_agent_scoped(&self, agent: &str, base: &str) -> Option<&BlockRecord> {
        self.entries.get(&BlockKey::AgentScoped {
            agent: agent.to_string(),
            base: base.to_string(),
        })
    }

    /// The mutability policy, applied to one desired config against the
    /// registry's view. Pure: used by both planning and the effectful
    /// `ensure_*` paths.
    #[must_use]
    pub fn decide(existing: Option<&BlockRecord>, desired_hash: &str, mutable: bool) -> BlockResolution {
        match existing {
            None => BlockResolution::Created,
            Some(record) if record.content_hash == desired_hash => BlockResolution::Unchanged,
            Some(_) if mutable => BlockResolution::SyncValue,
            Some(record) => BlockResolution::Versioned {
                superseded_id: record.id.clone(),
            },
        }
    }

    /// What `ensure_shared` would do, without remote calls.
    #[must_use]
    pub fn plan_shared(&self, config: &LoadedBlock) -> BlockResolution {
        Self::decide(
            self.lookup_shared(&config.name),
            &fingerprint(&config.value),
            config.mutable,
        )
    }

    /// What `ensure_agent_scoped` would do, without remote calls.
    #[must_use]
    pub fn plan_agent_scoped(&self, agent: &str, config: &LoadedBlock) -> BlockResolution {
        Self::decide(
            self.lookup_agent_scoped(agent, &config.name),
            &fingerprint(&config.value),
            config.mutable,
        )
    }

    /// Converge one shared block during the pre-pass. Mutable drift is
    /// synced remotely here; immutable drift mints a content-addressed
    /// versioned label and re-points the registry entry.
    pub async fn ensure_shared(
        &mut self,
        store: &impl BlockStore,
        config: &LoadedBlock,
    ) -> Result<BlockResolution> {
        let desired_hash = fingerprint(&config.value);
        let resolution = Self::decide(self.lookup_shared(&config.name), &desired_hash, config.mutable);
        let key = BlockKey::Shared(config.name.clone());
        match &resolution {
            BlockResolution::Created => {
                let created = store
                    .create_block(&NewBlock {
                        label: config.name.clone(),
                        description: config.description.clone(),
                        limit: config.limit,
                        value: config.value.clone(),
                    })
                    .await?;
                self.entries.insert(
                    key,
                    BlockRecord {
                        id: created.id,
                        label: config.name.clone(),
                        content_hash: desired_hash,
                        shared: true,
                    },
                );
            }
            BlockResolution::SyncValue => {
                // id is present whenever decide returns SyncValue
                if let Some(record) = self.entries.get_mut(&key) {
                    store.update_block_value(&record.id, &config.value).await?;
                    record.content_hash = desired_hash;
                }
            }
            BlockResolution::Versioned { .. } => {
                let label = versioned_label(&config.name, &short_fingerprint(&config.value));
                let created = store
                    .create_block(&NewBlock {
                        label: label.clone(),
                        description: config.description.clone(),
                        limit: config.limit,
                        value: config.value.clone(),
                    })
                    .await?;
                self.entries.insert(
                    key,
                    BlockRecord {
                        id: created.id,
                        label,
                        content_hash: desired_hash,
                        shared: true,
                    },
                );
            }
            BlockResolution::Unchanged => {}
        }
        Ok(resolution)
    }

    /// Converge one agent-scoped block at assembly time. Unlike the shared
    /// path, mutable drift is not synced here — the resolution is carried
    /// into the Operation Set and executed by the applier.
    pub async fn ensure_agent_scoped(
        &mut self,
        store: &impl BlockStore,
        agent: &str,
        config: &LoadedBlock,
    ) -> Result<(BlockRecord, BlockResolution)> {
        let desired_hash = fingerprint(&config.value);
        let resolution = Self::decide(
            self.lookup_agent_scoped(agent, &config.name),
            &desired_hash,
            config.mutable,
        );
        let key = BlockKey::AgentScoped {
            agent: agent.to_string(),
            base: config.name.clone(),
        };
        match &resolution {
            BlockResolution::Created => {
                let created = store
                    .create_block(&NewBlock {
                        label: config.name.clone(),
                        description: config.description.clone(),
                        limit: config.limit,
                        value: config.value.clone(),
                    })
                    .await?;
                self.entries.insert(
                    key.clone(),
                    BlockRecord {
                        id: created.id,
                        label: config.name.clone(),
                        content_hash: desired_hash,
                        shared: false,
                    },
                );
            }
            BlockResolution::Versioned { .. } => {
                let label = versioned_label(&config.name, &short_fingerprint(&config.value));
                let created = store
                    .create_block(&NewBlock {
                        label: label.clone(),
                        description: config.description.clone(),
                        limit: config.limit,
                        value: config.value.clone(),
                    })
                    .await?;
                self.entries.insert(
                    key.clone(),
                    BlockRecord {
                        id: created.id,
                        label,
                        content_hash: desired_hash,
                        shared: false,
                    },
                );
            }
            BlockResolution::SyncValue | BlockResolution::Unchanged => {}
        }
        let record = self
            .entries
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("block '{}' missing from registry", config.name))?;
        Ok((record, resolution))
    }
}
