//! Loader configuration
//!
//! Reads the `LuaLoader.toml` dialect the original tool established. Key
//! names are preserved verbatim (`gameScriptPath`, `modulePath`,
//! `backupHKSonLaunch`, ...) so existing user configs keep working; parsing
//! itself goes through `toml`/`serde` instead of a hand-rolled scanner.

use crate::errors::ConfigError;
use crate::logging::{LogLevel, Logger};
use crate::paths;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const SRC: &str = "ConfigParser";

/// Default config filename, expected next to the `.me3` profile unless the
/// profile overrides it.
pub const DEFAULT_CONFIG_NAME: &str = "LuaLoader.toml";

// =============================================================================
// Model
// =============================================================================

/// A configured path kept in both the user's spelling and its resolved form.
///
/// The relative spelling is what gets echoed into generated artifacts (it is
/// portable); the absolute form is what every filesystem operation uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathInfo {
    pub relative: String,
    pub absolute: String,
    pub base: String,
}

impl PathInfo {
    /// Resolve a raw config value against the config directory.
    pub fn resolve(raw: &str, config_dir: &str) -> Self {
        Self {
            relative: raw.to_string(),
            absolute: paths::resolve_with_fallbacks(raw, config_dir),
            base: config_dir.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.absolute.trim().is_empty()
    }
}

/// Runtime configuration. Read once at startup, immutable afterwards.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub game_script_path: PathInfo,
    pub module_path: PathInfo,
    pub config_file: PathBuf,
    pub config_dir: String,

    pub silent: bool,
    pub log_level: LogLevel,

    /// Back up the target script on every launch, not only when mutating it
    pub backup_on_launch: bool,
    /// Backup directory; relative values resolve against the config directory
    pub backup_folder: Option<String>,

    /// One-shot flag: remove every loader artifact on the next launch
    pub cleanup_on_next_launch: bool,
}

/// Raw TOML shape with the original key spellings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    #[serde(rename = "gameScriptPath", alias = "scriptPath")]
    game_script_path: Option<String>,
    #[serde(rename = "modulePath")]
    module_path: Option<String>,
    silent: Option<bool>,
    #[serde(rename = "logLevel")]
    log_level: Option<String>,
    #[serde(rename = "backupHKSonLaunch")]
    backup_on_launch: Option<bool>,
    #[serde(rename = "backupHKSFolder")]
    backup_folder: Option<String>,
    #[serde(rename = "cleanupOnNextLaunch")]
    cleanup_on_next_launch: Option<bool>,
}

// =============================================================================
// Loading
// =============================================================================

/// Parse a config file and resolve its paths.
///
/// Side effects on `logger`: `logLevel` and `silent` from the file are
/// applied immediately so the rest of startup logs at the configured
/// verbosity.
pub fn load(config_path: &Path, logger: &Logger) -> Result<LoaderConfig, ConfigError> {
    let config_dir = paths::normalize(
        &config_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .to_string_lossy(),
    );
    logger.debug(SRC, &format!("config directory: {config_dir}"));
    logger.debug(SRC, &format!("parsing config: {}", file_name(config_path)));

    let text = fs::read_to_string(config_path).map_err(|err| ConfigError::ReadFailed {
        path: config_path.to_path_buf(),
        message: err.to_string(),
    })?;
    let raw: RawConfig = toml::from_str(&text).map_err(|err| ConfigError::InvalidToml {
        path: config_path.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut log_level = LogLevel::Info;
    if let Some(value) = raw.log_level.as_deref() {
        match LogLevel::parse(value) {
            Some(level) => {
                log_level = level;
                logger.set_level(level);
            }
            None => logger.warn(SRC, &format!("unknown logLevel {value:?}, keeping info")),
        }
    }

    let silent = raw.silent.unwrap_or(false);
    if silent {
        logger.info(SRC, "silent mode enabled");
        logger.set_silent(true);
    }

    let script_raw = raw
        .game_script_path
        .ok_or_else(|| ConfigError::MissingGameScriptPath {
            path: config_path.to_path_buf(),
        })?;
    if script_raw.trim().is_empty() {
        return Err(ConfigError::EmptyGameScriptPath {
            path: config_path.to_path_buf(),
        });
    }
    let game_script_path = PathInfo::resolve(&script_raw, &config_dir);
    logger.debug(SRC, &format!("game script path (relative): {script_raw}"));
    logger.debug(
        SRC,
        &format!("game script path (absolute): {}", game_script_path.absolute),
    );

    let module_path = match raw.module_path.as_deref() {
        Some(value) if !value.trim().is_empty() => {
            let info = PathInfo::resolve(value, &config_dir);
            logger.debug(SRC, &format!("module path (relative): {value}"));
            logger.debug(SRC, &format!("module path (absolute): {}", info.absolute));
            info
        }
        _ => {
            logger.info(
                SRC,
                &format!(
                    "no modulePath specified, using gameScriptPath: {}",
                    game_script_path.absolute
                ),
            );
            game_script_path.clone()
        }
    };

    let backup_on_launch = raw.backup_on_launch.unwrap_or(true);
    logger.debug(
        SRC,
        &format!(
            "backup on launch: {}",
            if backup_on_launch { "enabled" } else { "disabled" }
        ),
    );
    let backup_folder = raw
        .backup_folder
        .filter(|folder| !folder.trim().is_empty());
    if let Some(folder) = backup_folder.as_deref() {
        logger.debug(SRC, &format!("backup folder: {folder}"));
    }

    Ok(LoaderConfig {
        game_script_path,
        module_path,
        config_file: config_path.to_path_buf(),
        config_dir,
        silent,
        log_level,
        backup_on_launch,
        backup_folder,
        cleanup_on_next_launch: raw.cleanup_on_next_launch.unwrap_or(false),
    })
}

// =============================================================================
// Default config generation
// =============================================================================

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# ======================================
# LuaLoader Configuration (v1)
# Generated automatically by LuaLoader
# Author: Malice
# ======================================
configVersion = 1

# You can place this file anywhere and set the path in your .me3 file:
#   luaLoaderConfigPath = "D:/Path/To/LuaLoader.toml"
# If not set, this config is expected next to your .me3 file.

# === Path Validation Notes ===
# - All paths can be relative (to .me3 file) or absolute
# - Use forward slashes (/) or double backslashes (\\) in paths
# - Spaces in paths are supported

# REQUIRED: Path to your main HKS scripts
gameScriptPath = "mod/action/script"   # Relative to your .me3 file or absolute path

# OPTIONAL: Path to Lua modules (defaults to gameScriptPath)
modulePath = "mod/action/script/lua"

# === LOGGING ===
# Logging verbosity. Set logLevel to one of:
#   trace   (everything, including super-verbose dev output)
#   debug   (debug, info, warnings, errors)
#   info    (normal user info, warnings, errors)  [default]
#   warning (only warnings and errors)
#   error   (only errors)
logLevel = "info"

# === HKS Backup Options ===
# backupHKSonLaunch behavior:
#   true  = Always backup c0000.hks on every launch
#   false = Only backup when actually injecting code (not when already injected)
backupHKSonLaunch = false        # true/false. If true, backup c0000.hks each launch. If false, only backup when injecting code.
backupHKSFolder = "HKS-Backups"  # Folder path for HKS backups (relative or absolute). Leave blank for same directory.

# === CLEANUP OPTIONS ===
# Set to true to remove all LuaLoader artifacts on next launch:
#   - Removes _module_loader directory
#   - Removes .modules_loaded flag files
#   - Removes LuaLoader injection from c0000.hks (backed up to backupHKSFolder)
# This flag automatically resets to false after cleanup completes.
cleanupOnNextLaunch = false      # true/false. Set to true to cleanup and reset project state.

# ======================================
# --- INSTRUCTIONS ---
# Edit paths as needed, save this file, and relaunch the game.
# If you move this config, update the .me3 to point to it with 'luaLoaderConfigPath'.
# To cleanup the project: set cleanupOnNextLaunch = true and relaunch.
# ======================================
"#;

/// Write the commented default config template.
pub fn generate_default(config_path: &Path, logger: &Logger) -> Result<(), ConfigError> {
    logger.debug(SRC, &format!("generating default config at {}", config_path.display()));

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| ConfigError::WriteFailed {
                path: config_path.to_path_buf(),
                message: err.to_string(),
            })?;
        }
    }
    fs::write(config_path, DEFAULT_CONFIG_TEMPLATE).map_err(|err| ConfigError::WriteFailed {
        path: config_path.to_path_buf(),
        message: err.to_string(),
    })?;

    logger.info(
        SRC,
        &format!("generated default LuaLoader config at: {}", config_path.display()),
    );
    Ok(())
}

// =============================================================================
// Cleanup flag rewrite
// =============================================================================

/// Rewrite `cleanupOnNextLaunch` in place, preserving every other line and
/// any trailing comment on the flag line itself. Appends the key when the
/// file never had it.
pub fn update_cleanup_flag(
    config_path: &Path,
    value: bool,
    logger: &Logger,
) -> Result<(), ConfigError> {
    let text = fs::read_to_string(config_path).map_err(|err| ConfigError::ReadFailed {
        path: config_path.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut found = false;
    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        if !found && line.trim_start().starts_with("cleanupOnNextLaunch") {
            let comment = line
                .find('#')
                .map(|idx| format!("      {}", &line[idx..]))
                .unwrap_or_default();
            lines.push(format!("cleanupOnNextLaunch = {value}{comment}"));
            found = true;
        } else {
            lines.push(line.to_string());
        }
    }
    if !found {
        lines.push(format!("cleanupOnNextLaunch = {value}"));
    }

    let mut rewritten = lines.join("\n");
    rewritten.push('\n');
    fs::write(config_path, rewritten).map_err(|err| ConfigError::WriteFailed {
        path: config_path.to_path_buf(),
        message: err.to_string(),
    })?;

    logger.debug(SRC, &format!("cleanupOnNextLaunch set to {value}"));
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// =============================================================================
// Tests
// =============================================================================
