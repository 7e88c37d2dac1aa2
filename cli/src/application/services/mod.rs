//! Application services — use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports` — never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod agent_registry;
pub mod applier;
pub mod block_registry;
pub mod bulk;
pub mod cleanup;
pub mod fleet_loader;
pub mod reconcile;
