use anyhow::Result;
use std::path::{Path, PathBuf};

pub const LOG_FOLDER_NAME: &str = "Portal_Wizard_Log";

/// Resolve deployment folder (absolute path)
pub fn resolve_deployment_folder() -> PathBuf {
    // Prefer the folder where the executable is running from
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(dir) = exe_path.parent() {
            return dir.to_path_buf();
        }
    }

    // Fallback: current working directory
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Resolve log folder (absolute path)
///
/// Order:
/// - an explicit directory from configuration
/// - an existing `Portal_Wizard_Log/` in the working directory or one of its parents
/// - `<deployment folder>/Portal_Wizard_Log/`, or the per-user data dir if that is not
///   writable
pub fn resolve_log_folder(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        std::fs::create_dir_all(dir)
            .map_err(|e| anyhow::anyhow!("Failed to create log folder {:?}: {}", dir, e))?;
        return Ok(dir.to_path_buf());
    }

    if let Ok(cwd) = std::env::current_dir() {
        if let Some(found) = find_existing_log_folder(&cwd) {
            return Ok(found);
        }
    }

    let beside_exe = resolve_deployment_folder().join(LOG_FOLDER_NAME);
    if std::fs::create_dir_all(&beside_exe).is_ok() {
        return Ok(beside_exe);
    }

    let user_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("No writable location for the log folder"))?
        .join("consular-wizard")
        .join(LOG_FOLDER_NAME);
    std::fs::create_dir_all(&user_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log folder {:?}: {}", user_dir, e))?;
    Ok(user_dir)
}

/// Walk up from `start` looking for an existing log folder.
fn find_existing_log_folder(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    for _ in 0..12 {
        let candidate = dir.join(LOG_FOLDER_NAME);
        if candidate.is_dir() {
            return Some(candidate);
        }
        dir = dir.parent()?.to_path_buf();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_folder_is_created_and_used() {
        let root = tempfile::tempdir().unwrap();
        let wanted = root.path().join("logs").join("wizard");
        let resolved = resolve_log_folder(Some(&wanted)).unwrap();
        assert_eq!(resolved, wanted);
        assert!(wanted.is_dir());
    }

    #[test]
    fn existing_folder_is_found_from_nested_directory() {
        let root = tempfile::tempdir().unwrap();
        let logs = root.path().join(LOG_FOLDER_NAME);
        std::fs::create_dir_all(&logs).unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_existing_log_folder(&nested), Some(logs));
    }
}
