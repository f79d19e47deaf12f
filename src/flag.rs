//! Module-loaded flag file
//!
//! The generated setup script writes a PID-stamped flag file after a
//! successful load so a second execution of the bootstrap inside the same
//! process exits early. The loader clears it at startup (fresh load per game
//! launch) and again at shutdown. Failures here are logged and swallowed.

use crate::logging::Logger;
use std::fs;
use std::path::PathBuf;

const SRC: &str = "FlagFile";

/// Flag filename inside the `_module_loader` directory.
pub const FLAG_FILE_NAME: &str = ".modules_loaded";

/// Full flag path for a module directory, or `None` when the module path is
/// not configured.
pub fn flag_file_path(module_path: &str) -> Option<PathBuf> {
    if module_path.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(format!(
        "{module_path}/{}/{FLAG_FILE_NAME}",
        crate::inject::LOADER_DIR_NAME
    )))
}

/// Remove the flag file so the next setup-script run loads modules again.
pub fn clear(module_path: &str, logger: &Logger) {
    let Some(flag_path) = flag_file_path(module_path) else {
        logger.warn(SRC, "cannot clear flag: module path is empty");
        return;
    };

    if !flag_path.exists() {
        logger.trace(SRC, "flag file does not exist, nothing to clear");
        return;
    }

    match fs::remove_file(&flag_path) {
        Ok(()) => logger.debug(SRC, "cleared module loaded flag for fresh reload"),
        Err(err) => logger.warn(SRC, &format!("failed to remove flag file: {err}")),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_path_requires_module_path() {
        assert!(flag_file_path("").is_none());
        assert!(flag_file_path("   ").is_none());
        let path = flag_file_path("/mods/lua").unwrap();
        assert_eq!(
            path,
            PathBuf::from("/mods/lua/_module_loader/.modules_loaded")
        );
    }

    #[test]
    fn test_clear_removes_existing_flag() {
        let dir = tempfile::tempdir().unwrap();
        let module_path = dir.path().to_string_lossy().replace('\\', "/");
        let flag = flag_file_path(&module_path).unwrap();
        fs::create_dir_all(flag.parent().unwrap()).unwrap();
        fs::write(&flag, "PID:42\n").unwrap();

        clear(&module_path, &Logger::disabled());
        assert!(!flag.exists());

        // Second clear finds nothing and stays quiet
        clear(&module_path, &Logger::disabled());
        assert!(!flag.exists());
    }
}
