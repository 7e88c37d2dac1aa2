//! Domain layer — pure reconciliation logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod classify;
pub mod config;
pub mod diff;
pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod resources;
pub mod version;

#[allow(unused_imports)]
pub use classify::{AttachmentProbe, Usage, any_found, classify_usage, is_agent_specific};
#[allow(unused_imports)]
pub use config::{FlotillaConfig, validate_config_key, validate_config_value};
#[allow(unused_imports)]
pub use diff::{DesiredAgent, OperationSet, diff};
#[allow(unused_imports)]
pub use error::{AgentError, ConfigError, ManifestError, StoreError};
#[allow(unused_imports)]
pub use fingerprint::{agent_config_fingerprint, fingerprint, short_fingerprint};
#[allow(unused_imports)]
pub use resources::{Agent, Block, BlockResolution, Run, RunStatus};
#[allow(unused_imports)]
pub use version::{split_version, versioned_label, versioned_name};
