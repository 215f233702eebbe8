//! Reading and writing plan files.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{PlanError, Result};
use crate::types::DeletionPlan;

/// Write `data` to `path` with owner-only permissions, creating parent dirs.
pub(crate) fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PlanError::io(parent, e))?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| PlanError::io(path, e))?;
    file.write_all(data).map_err(|e| PlanError::io(path, e))?;

    // mode() only applies on creation; tighten files that already existed
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| PlanError::io(path, e))?;
    }
    Ok(())
}

/// Parse a plan from a JSON file. Does not validate it.
pub fn read(path: &Path) -> Result<DeletionPlan> {
    let content = fs::read_to_string(path).map_err(|e| PlanError::io(path, e))?;
    let plan = serde_json::from_str(&content)?;
    log::debug!("Read plan from {}", path.display());
    Ok(plan)
}

/// Write a plan as indented JSON with a trailing newline (mode 0600).
pub fn write(path: &Path, plan: &DeletionPlan) -> Result<()> {
    let mut json = serde_json::to_string_pretty(plan)?;
    json.push('\n');
    write_private(path, json.as_bytes())?;
    log::debug!("Wrote plan to {}", path.display());
    Ok(())
}
