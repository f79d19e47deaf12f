//! Host profile (.me3) integration
//!
//! The loader finds its config through the mod host's `.me3` profile: the
//! profile may carry a `luaLoaderConfigPath` override, and when the loader
//! generates a fresh config it writes that key back into the profile so the
//! two files stay linked. The write-back is deliberately line-oriented so
//! user comments and formatting survive.

use crate::errors::ConfigError;
use crate::logging::Logger;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const SRC: &str = "Profile";

/// Key injected into the profile to point at the loader config.
pub const CONFIG_PATH_KEY: &str = "luaLoaderConfigPath";

// =============================================================================
// Discovery
// =============================================================================

/// Directories searched for a `.me3` profile, in order: the starting
/// directory, two levels of parents, then the working directory.
pub fn search_dirs(start: &Path) -> Vec<PathBuf> {
    let mut dirs = vec![start.to_path_buf()];
    if let Some(parent) = start.parent() {
        dirs.push(parent.to_path_buf());
        if let Some(grandparent) = parent.parent() {
            dirs.push(grandparent.to_path_buf());
        }
    }
    if let Ok(cwd) = env::current_dir() {
        if !dirs.contains(&cwd) {
            dirs.push(cwd);
        }
    }
    dirs
}

/// Find the first `.me3` file in the search directories.
pub fn find(start: &Path, logger: &Logger) -> Option<PathBuf> {
    for dir in search_dirs(start) {
        logger.debug(SRC, &format!("searching: {}", dir.display()));
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                logger.debug(
                    SRC,
                    &format!("cannot access directory {}: {err}", dir.display()),
                );
                continue;
            }
        };

        // read_dir order is platform-dependent; sort for a stable pick
        let mut profiles: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "me3"))
            .collect();
        profiles.sort();

        if let Some(profile) = profiles.into_iter().next() {
            logger.info(
                SRC,
                &format!("found .me3 file: {}", file_name(&profile)),
            );
            return Some(profile);
        }
    }
    None
}

// =============================================================================
// Config-path override
// =============================================================================

/// Read the `luaLoaderConfigPath` override from a profile, resolving a
/// relative value against the profile's directory. An unparseable profile is
/// treated as having no override.
pub fn config_path_override(profile: &Path, logger: &Logger) -> Option<PathBuf> {
    let text = fs::read_to_string(profile).ok()?;
    let value: toml::Value = match toml::from_str(&text) {
        Ok(value) => value,
        Err(err) => {
            logger.warn(
                SRC,
                &format!("{} is not valid TOML, ignoring overrides: {err}", file_name(profile)),
            );
            return None;
        }
    };

    let raw = value.get(CONFIG_PATH_KEY)?.as_str()?.to_string();
    let mut path = PathBuf::from(&raw);
    if path.is_relative() {
        if let Some(dir) = profile.parent() {
            path = dir.join(path);
        }
    }
    logger.info(
        SRC,
        &format!("using custom config path from .me3: {}", path.display()),
    );
    Some(path)
}

// =============================================================================
// Write-back
// =============================================================================

/// Record the config location in the profile.
///
/// Any existing `luaLoaderConfigPath` line is dropped, and the new one is
/// inserted right after the `profileVersion` line when present (appended at
/// the end otherwise). The stored path is made relative to the profile for
/// portability.
pub fn write_config_path(
    profile: &Path,
    config_path: &Path,
    logger: &Logger,
) -> Result<(), ConfigError> {
    let text = fs::read_to_string(profile).map_err(|err| ConfigError::ReadFailed {
        path: profile.to_path_buf(),
        message: err.to_string(),
    })?;

    let stored = relative_to_profile(profile, config_path);
    logger.debug(SRC, &format!("storing config path as: {stored}"));

    let mut lines: Vec<String> = Vec::new();
    let mut injected = false;
    let mut replaced_existing = false;

    for line in text.lines() {
        if line.contains(CONFIG_PATH_KEY) {
            replaced_existing = true;
            continue;
        }
        lines.push(line.to_string());

        let compact: String = line
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if !injected && compact.starts_with("profileversion") {
            lines.push(String::new());
            lines.push("# LuaLoader Configuration (relative path for portability)".to_string());
            lines.push(format!("{CONFIG_PATH_KEY} = \"{stored}\""));
            lines.push(String::new());
            injected = true;
        }
    }

    if !injected {
        lines.push(String::new());
        lines.push("# --- Added by LuaLoader ---".to_string());
        lines.push(format!("{CONFIG_PATH_KEY} = \"{stored}\""));
        logger.warn(SRC, "profileVersion line not found, appending config path at end");
    }

    let mut rewritten = lines.join("\n");
    rewritten.push('\n');
    fs::write(profile, rewritten).map_err(|err| ConfigError::WriteFailed {
        path: profile.to_path_buf(),
        message: err.to_string(),
    })?;

    if replaced_existing {
        logger.info(SRC, "updated existing luaLoaderConfigPath in .me3 file");
    } else {
        logger.info(SRC, "added luaLoaderConfigPath to .me3 file");
    }
    Ok(())
}

/// Express `target` relative to the profile's directory, falling back to the
/// bare filename when the two share no usable prefix (different drives).
fn relative_to_profile(profile: &Path, target: &Path) -> String {
    let base = profile.parent().unwrap_or_else(|| Path::new(""));

    let base_components: Vec<_> = base.components().collect();
    let target_components: Vec<_> = target.components().collect();

    let mut common = 0;
    while common < base_components.len()
        && common < target_components.len()
        && base_components[common] == target_components[common]
    {
        common += 1;
    }

    // Absolute paths that share no root live on different drives
    if common == 0 && (base.is_absolute() || target.is_absolute()) {
        return file_name(target);
    }

    let mut parts: Vec<String> = Vec::new();
    for _ in common..base_components.len() {
        parts.push("..".to_string());
    }
    for component in &target_components[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }

    if parts.is_empty() {
        file_name(target)
    } else {
        parts.join("/")
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_picks_profile_in_start_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("eldenring.me3"), "profileVersion = \"v1\"\n").unwrap();
        let found = find(dir.path(), &Logger::disabled()).unwrap();
        assert_eq!(found, dir.path().join("eldenring.me3"));
    }

    #[test]
    fn test_find_walks_up_to_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("mods").join("lualoader");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("profile.me3"), "profileVersion = \"v1\"\n").unwrap();
        let found = find(&nested, &Logger::disabled()).unwrap();
        assert_eq!(found, dir.path().join("profile.me3"));
    }

    #[test]
    fn test_override_resolves_relative_to_profile_dir() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("profile.me3");
        fs::write(
            &profile,
            "profileVersion = \"v1\"\nluaLoaderConfigPath = \"configs/LuaLoader.toml\"\n",
        )
        .unwrap();
        let resolved = config_path_override(&profile, &Logger::disabled()).unwrap();
        assert_eq!(resolved, dir.path().join("configs/LuaLoader.toml"));
    }

    #[test]
    fn test_override_absent_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("profile.me3");
        fs::write(&profile, "profileVersion = \"v1\"\n").unwrap();
        assert!(config_path_override(&profile, &Logger::disabled()).is_none());
    }

    #[test]
    fn test_write_back_inserts_after_profile_version() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("profile.me3");
        fs::write(
            &profile,
            "# my profile\nprofileVersion = \"v1\"\n[[packages]]\nid = \"base\"\n",
        )
        .unwrap();

        let config = dir.path().join("LuaLoader.toml");
        write_config_path(&profile, &config, &Logger::disabled()).unwrap();

        let rewritten = fs::read_to_string(&profile).unwrap();
        let version_idx = rewritten.find("profileVersion").unwrap();
        let key_idx = rewritten.find(CONFIG_PATH_KEY).unwrap();
        let package_idx = rewritten.find("[[packages]]").unwrap();
        assert!(version_idx < key_idx && key_idx < package_idx);
        assert!(rewritten.contains("luaLoaderConfigPath = \"LuaLoader.toml\""));
        assert!(rewritten.contains("# my profile"));
    }

    #[test]
    fn test_write_back_replaces_existing_key() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("profile.me3");
        fs::write(
            &profile,
            "profileVersion = \"v1\"\nluaLoaderConfigPath = \"old/stale.toml\"\n",
        )
        .unwrap();

        let config = dir.path().join("fresh").join("LuaLoader.toml");
        write_config_path(&profile, &config, &Logger::disabled()).unwrap();

        let rewritten = fs::read_to_string(&profile).unwrap();
        assert!(!rewritten.contains("old/stale.toml"));
        assert!(rewritten.contains("luaLoaderConfigPath = \"fresh/LuaLoader.toml\""));
        assert_eq!(rewritten.matches(CONFIG_PATH_KEY).count(), 1);
    }

    #[test]
    fn test_write_back_appends_without_profile_version() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("profile.me3");
        fs::write(&profile, "# empty profile\n").unwrap();

        let config = dir.path().join("LuaLoader.toml");
        write_config_path(&profile, &config, &Logger::disabled()).unwrap();

        let rewritten = fs::read_to_string(&profile).unwrap();
        assert!(rewritten.contains("# --- Added by LuaLoader ---"));
        assert!(rewritten.trim_end().ends_with("luaLoaderConfigPath = \"LuaLoader.toml\""));
    }

    #[test]
    fn test_relative_to_profile_walks_up() {
        let profile = Path::new("/games/er/mods/profile.me3");
        let target = Path::new("/games/er/configs/LuaLoader.toml");
        assert_eq!(
            relative_to_profile(profile, target),
            "../configs/LuaLoader.toml"
        );
    }
}
