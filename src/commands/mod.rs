use anyhow::{Context, Result};
use planfile::Secret;

use crate::paths;

pub mod delete;
pub mod doctor;
pub mod execute;
pub mod inspect;
pub mod plan;
pub mod restore;

/// Plan signing secret from the config directory, created on first use
pub fn load_secret() -> Result<Secret> {
    let dir = paths::config_dir()?;
    Secret::ensure(&dir)
        .with_context(|| format!("Could not load signing secret from {}", dir.display()))
}
