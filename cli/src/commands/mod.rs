//! Command implementations

pub mod agents;
pub mod apply;
pub mod cleanup;
pub mod config;
pub mod plan;
pub mod send;
pub mod status;
pub mod version;
