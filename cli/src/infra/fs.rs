//! Infrastructure implementation of the `LocalFs` port.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::LocalFs;

/// Production implementation of `LocalFs` backed by `std::fs`.
pub struct StdFs;

impl LocalFs for StdFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))
    }
}
