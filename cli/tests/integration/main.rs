//! Integration tests for the flotilla CLI
//!
//! These tests exercise the compiled binary end to end with assert_cmd.
//! No remote store is involved: every scenario either fails before the
//! first network call or operates purely on local state.

mod config_command;
