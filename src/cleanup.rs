//! Cleanup utilities
//!
//! Reverses everything the loader ever wrote: the injected block in the
//! target script, the generated `_module_loader` directory, and the flag
//! files. Each sub-operation is best-effort; the aggregate reports whether
//! all of them succeeded.

use crate::backup;
use crate::config::LoaderConfig;
use crate::errors::ScriptError;
use crate::inject::{self, BlockScan, LOADER_DIR_NAME};
use crate::logging::Logger;
use std::fs;
use std::io;
use std::path::Path;

const SRC: &str = "Cleanup";

// =============================================================================
// Injection removal
// =============================================================================

/// Outcome of a removal call that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Target file does not exist; nothing to clean.
    MissingFile,
    /// Target exists but carries no block; content untouched.
    Absent,
    /// Block stripped. `terminated` is false when the block was truncated and
    /// removal ran through end of file.
    Removed {
        start: usize,
        end: usize,
        terminated: bool,
    },
}

/// Remove the injected block from the target script, if present.
///
/// Inverse of [`inject::inject_into_script`]: the lines outside the block are
/// written back verbatim, so on a file produced by apply the result is
/// byte-equal to the pre-apply original. Running it twice is a no-op the
/// second time.
pub fn remove_injection(
    config: &LoaderConfig,
    logger: &Logger,
) -> Result<RemoveOutcome, ScriptError> {
    let script_path = inject::target_script_path(config);

    match fs::metadata(&script_path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            logger.debug(
                SRC,
                &format!("target script not found, nothing to clean: {}", script_path.display()),
            );
            return Ok(RemoveOutcome::MissingFile);
        }
        Err(err) => return Err(ScriptError::from_probe(&script_path, &err)),
        Ok(_) => {}
    }

    let content = fs::read_to_string(&script_path)
        .map_err(|err| ScriptError::from_read(&script_path, &err))?;
    // Split keeps any '\r' attached to its line, so untouched spans are
    // reproduced byte-for-byte on write-back.
    let lines: Vec<&str> = content.split('\n').collect();
    logger.debug(SRC, &format!("read {} lines from target script", lines.len()));

    match inject::scan_for_block(&lines) {
        BlockScan::Absent => {
            logger.debug(SRC, "no injection found in target script");
            Ok(RemoveOutcome::Absent)
        }
        BlockScan::Found {
            start,
            end,
            terminated,
        } => {
            if !terminated {
                logger.warn(
                    SRC,
                    "injection block missing its dofile line, stripping through end of file",
                );
            }

            backup::create(&script_path, config, "cleanup", logger);

            let kept: Vec<&str> = lines[..start]
                .iter()
                .chain(lines[end + 1..].iter())
                .copied()
                .collect();
            inject::write_replace(&script_path, &kept.join("\n"))?;

            logger.info(SRC, "removed injection and trailing blank lines");
            logger.debug(
                SRC,
                &format!("injection spanned lines {} through {}", start + 1, end + 1),
            );
            Ok(RemoveOutcome::Removed {
                start,
                end,
                terminated,
            })
        }
    }
}

// =============================================================================
// Full artifact cleanup
// =============================================================================

/// Remove every loader artifact: the `_module_loader` directory, the flag
/// files, and the injected block. Returns true when all three sub-operations
/// completed cleanly.
pub fn perform_full_cleanup(config: &LoaderConfig, logger: &Logger) -> bool {
    logger.info(SRC, "cleanup operation initiated, removing loader artifacts");

    let mut all_ok = true;

    if config.module_path.is_empty() {
        logger.debug(SRC, "module path not configured, skipping directory cleanup");
    } else {
        let module_dir = Path::new(&config.module_path.absolute);
        if !remove_loader_directory(module_dir, logger) {
            logger.warn(SRC, "module loader directory cleanup encountered issues");
            all_ok = false;
        }
        if !remove_flag_files(module_dir, logger) {
            logger.warn(SRC, "flag file cleanup encountered issues");
            all_ok = false;
        }
    }

    if config.game_script_path.is_empty() {
        logger.debug(SRC, "game script path not configured, skipping injection cleanup");
    } else {
        match remove_injection(config, logger) {
            Ok(_) => {}
            Err(err) => {
                logger.error(SRC, &format!("injection cleanup failed: {err}"));
                all_ok = false;
            }
        }
    }

    if all_ok {
        logger.info(SRC, "cleanup completed, all loader artifacts removed");
    } else {
        logger.warn(SRC, "cleanup completed with warnings, some artifacts may remain");
    }
    all_ok
}

/// Delete `<module_path>/_module_loader` recursively.
fn remove_loader_directory(module_dir: &Path, logger: &Logger) -> bool {
    let loader_dir = module_dir.join(LOADER_DIR_NAME);

    if !loader_dir.exists() {
        logger.debug(SRC, "module loader directory not found (already clean)");
        return true;
    }

    let file_count = fs::read_dir(&loader_dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0);

    match fs::remove_dir_all(&loader_dir) {
        Ok(()) => {
            logger.info(
                SRC,
                &format!("removed {LOADER_DIR_NAME} directory with {file_count} entries"),
            );
            true
        }
        Err(err) => {
            logger.error(
                SRC,
                &format!("failed to remove {LOADER_DIR_NAME} directory: {err}"),
            );
            false
        }
    }
}

/// Delete the flag file from both locations it ever lived in.
fn remove_flag_files(module_dir: &Path, logger: &Logger) -> bool {
    let candidates = [
        module_dir.join(LOADER_DIR_NAME).join(crate::flag::FLAG_FILE_NAME),
        module_dir.join(crate::flag::FLAG_FILE_NAME),
    ];

    let mut all_ok = true;
    let mut removed = 0;
    for path in &candidates {
        if !path.exists() {
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => {
                removed += 1;
                logger.info(SRC, &format!("removed flag file: {}", path.display()));
            }
            Err(err) => {
                logger.error(
                    SRC,
                    &format!("failed to remove flag file {}: {err}", path.display()),
                );
                all_ok = false;
            }
        }
    }

    if removed == 0 {
        logger.debug(SRC, "no flag files found (already clean)");
    }
    all_ok
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathInfo;
    use crate::inject::TARGET_SCRIPT_NAME;

    fn test_config(dir: &Path) -> LoaderConfig {
        let base = dir.to_string_lossy().replace('\\', "/");
        LoaderConfig {
            game_script_path: PathInfo {
                relative: "script".to_string(),
                absolute: format!("{base}/script"),
                base: base.clone(),
            },
            module_path: PathInfo {
                relative: "script/lua".to_string(),
                absolute: format!("{base}/script/lua"),
                base: base.clone(),
            },
            config_file: dir.join("LuaLoader.toml"),
            config_dir: base,
            silent: false,
            log_level: crate::logging::LogLevel::Info,
            backup_on_launch: false,
            backup_folder: None,
            cleanup_on_next_launch: false,
        }
    }

    fn write_target(dir: &Path, content: &str) -> std::path::PathBuf {
        let script_dir = dir.join("script");
        fs::create_dir_all(&script_dir).unwrap();
        let target = script_dir.join(TARGET_SCRIPT_NAME);
        fs::write(&target, content).unwrap();
        target
    }

    #[test]
    fn test_remove_missing_file_is_silent_success() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let outcome = remove_injection(&config, &Logger::disabled()).unwrap();
        assert_eq!(outcome, RemoveOutcome::MissingFile);
    }

    #[test]
    fn test_remove_without_block_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let target = write_target(dir.path(), "-- user script\nrun()\n");

        let outcome = remove_injection(&config, &Logger::disabled()).unwrap();
        assert_eq!(outcome, RemoveOutcome::Absent);
        assert_eq!(fs::read_to_string(&target).unwrap(), "-- user script\nrun()\n");
    }

    #[test]
    fn test_remove_restores_pre_apply_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let original = "A\nB\n";
        let target = write_target(dir.path(), original);

        inject::inject_into_script(&config, &Logger::disabled()).unwrap();
        assert_ne!(fs::read_to_string(&target).unwrap(), original);

        let outcome = remove_injection(&config, &Logger::disabled()).unwrap();
        assert!(matches!(outcome, RemoveOutcome::Removed { terminated: true, .. }));
        assert_eq!(fs::read_to_string(&target).unwrap(), original);
    }

    #[test]
    fn test_remove_restores_crlf_file_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let original = "A\r\nB\r\n";
        let target = write_target(dir.path(), original);

        inject::inject_into_script(&config, &Logger::disabled()).unwrap();
        remove_injection(&config, &Logger::disabled()).unwrap();
        assert_eq!(fs::read(&target).unwrap(), original.as_bytes());
    }

    #[test]
    fn test_remove_twice_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_target(dir.path(), "A\nB\n");

        inject::inject_into_script(&config, &Logger::disabled()).unwrap();
        remove_injection(&config, &Logger::disabled()).unwrap();
        let outcome = remove_injection(&config, &Logger::disabled()).unwrap();
        assert_eq!(outcome, RemoveOutcome::Absent);
    }

    #[test]
    fn test_remove_unterminated_block_strips_to_eof() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let content = "keep_me()\n\
                       -- ========================================\n\
                       -- Lua Loader v11.3.0 - Enhanced Path Resolution\n\
                       -- truncated, no dofile line follows\n";
        let target = write_target(dir.path(), content);

        let outcome = remove_injection(&config, &Logger::disabled()).unwrap();
        assert!(matches!(outcome, RemoveOutcome::Removed { terminated: false, .. }));
        assert_eq!(fs::read_to_string(&target).unwrap(), "keep_me()");
    }

    #[test]
    fn test_full_cleanup_removes_directory_flag_and_injection() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let original = "A\nB\n";
        let target = write_target(dir.path(), original);

        let logger = Logger::disabled();
        crate::setup::write_setup_script(&config, &logger).unwrap();
        inject::inject_into_script(&config, &logger).unwrap();
        fs::write(
            Path::new(&config.module_path.absolute)
                .join(LOADER_DIR_NAME)
                .join(crate::flag::FLAG_FILE_NAME),
            "PID:1234\n",
        )
        .unwrap();

        assert!(perform_full_cleanup(&config, &logger));

        assert!(!Path::new(&config.module_path.absolute)
            .join(LOADER_DIR_NAME)
            .exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), original);
    }
}
