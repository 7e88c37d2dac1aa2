pub mod lock;
pub mod manifest;
pub mod names;

pub use lock::{AgentLock, LockManifest, LOCK_VERSION};
pub use manifest::{
    AgentSpec, ArchiveSpec, BlockSpec, FleetManifest, FolderSpec, McpServerSpec, ToolSpec,
};
pub use names::{
    base_name, is_shared_name, validate_agent_name, validate_block_label, SHARED_PREFIX,
    VERSION_SEP,
};
