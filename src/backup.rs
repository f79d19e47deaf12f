//! Timestamped backups of the target script
//!
//! Backups are best-effort by policy: a failure to create the directory or
//! copy the file downgrades the backup to "skipped" and is logged, but never
//! blocks the injection or cleanup that requested it. Nothing ever deletes a
//! backup; they accumulate until the user prunes them.

use crate::config::LoaderConfig;
use crate::logging::Logger;
use crate::paths;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

const SRC: &str = "Backup";

/// Copy `source` into the configured backup location, tagged with `context`
/// ("injection", "cleanup", "launch").
///
/// Returns `true` only when a backup file actually exists afterwards.
pub fn create(source: &Path, config: &LoaderConfig, context: &str, logger: &Logger) -> bool {
    if !validate_source(source) {
        logger.warn(
            SRC,
            &format!(
                "source file missing or empty, skipping backup: {}",
                source.display()
            ),
        );
        return false;
    }

    let backup_dir = resolve_backup_dir(source, config);
    if let Err(err) = fs::create_dir_all(&backup_dir) {
        logger.error(
            SRC,
            &format!(
                "failed to create backup directory {}: {err}",
                backup_dir.display()
            ),
        );
        return false;
    }

    let backup_path = backup_dir.join(backup_name(source, context));
    match fs::copy(source, &backup_path) {
        Ok(_) => {
            logger.info(SRC, &format!("backup created: {}", backup_path.display()));
            true
        }
        Err(err) => {
            logger.error(SRC, &format!("backup creation failed: {err}"));
            false
        }
    }
}

/// `<basename>.backup_<YYYY-MM-DD_HH-MM-SS>[_<context>]`
fn backup_name(source: &Path, context: &str) -> String {
    let base = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");

    if context.is_empty() {
        format!("{base}.backup_{stamp}")
    } else {
        format!("{base}.backup_{stamp}_{context}")
    }
}

/// Configured folder (resolved against the config directory when relative),
/// or the source file's own directory when unset.
fn resolve_backup_dir(source: &Path, config: &LoaderConfig) -> PathBuf {
    match config.backup_folder.as_deref() {
        Some(folder) if !folder.trim().is_empty() => {
            PathBuf::from(paths::resolve_with_fallbacks(folder, &config.config_dir))
        }
        _ => source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    }
}

/// Refuse to back up files that do not exist or hold no content; an empty
/// backup would overwrite nothing useful and mask a broken target path.
fn validate_source(source: &Path) -> bool {
    fs::metadata(source)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathInfo;

    fn config_with_backup_folder(config_dir: &Path, folder: Option<&str>) -> LoaderConfig {
        let dir = config_dir.to_string_lossy().replace('\\', "/");
        LoaderConfig {
            game_script_path: PathInfo::default(),
            module_path: PathInfo::default(),
            config_file: config_dir.join("LuaLoader.toml"),
            config_dir: dir,
            silent: false,
            log_level: crate::logging::LogLevel::Info,
            backup_on_launch: true,
            backup_folder: folder.map(str::to_string),
            cleanup_on_next_launch: false,
        }
    }

    #[test]
    fn test_backup_lands_next_to_source_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("c0000.hks");
        fs::write(&source, "function on_update() end\n").unwrap();

        let config = config_with_backup_folder(dir.path(), None);
        assert!(create(&source, &config, "injection", &Logger::disabled()));

        let backups: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".backup_"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].starts_with("c0000.hks.backup_"));
        assert!(backups[0].ends_with("_injection"));
    }

    #[test]
    fn test_backup_honors_configured_folder() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("c0000.hks");
        fs::write(&source, "content\n").unwrap();

        let config = config_with_backup_folder(dir.path(), Some("HKS-Backups"));
        assert!(create(&source, &config, "cleanup", &Logger::disabled()));

        let backup_dir = dir.path().join("HKS-Backups");
        assert!(backup_dir.is_dir());
        let count = fs::read_dir(&backup_dir).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_backup_preserves_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("c0000.hks");
        fs::write(&source, "line1\r\nline2\n").unwrap();

        let config = config_with_backup_folder(dir.path(), Some("HKS-Backups"));
        assert!(create(&source, &config, "", &Logger::disabled()));

        let backup_dir = dir.path().join("HKS-Backups");
        let backup = fs::read_dir(&backup_dir)
            .unwrap()
            .filter_map(Result::ok)
            .next()
            .unwrap()
            .path();
        assert_eq!(fs::read(&backup).unwrap(), fs::read(&source).unwrap());
        assert!(!backup.to_string_lossy().ends_with('_'));
    }

    #[test]
    fn test_empty_source_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("c0000.hks");
        fs::write(&source, "").unwrap();

        let config = config_with_backup_folder(dir.path(), None);
        assert!(!create(&source, &config, "launch", &Logger::disabled()));
    }

    #[test]
    fn test_unreachable_backup_dir_reports_skip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("c0000.hks");
        fs::write(&source, "content\n").unwrap();

        // A file where the backup directory should be makes create_dir_all fail
        let obstruction = dir.path().join("blocked");
        fs::write(&obstruction, "").unwrap();
        let folder = obstruction.join("sub").to_string_lossy().replace('\\', "/");

        let config = config_with_backup_folder(dir.path(), Some(&folder));
        assert!(!create(&source, &config, "injection", &Logger::disabled()));
    }
}
