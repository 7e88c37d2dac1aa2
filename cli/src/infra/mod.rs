//! Infrastructure layer — concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: the HTTP store client,
//! filesystem access, configuration persistence, and lock artifact writes.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod config;
pub mod fs;
pub mod http;
pub mod lockfile;
