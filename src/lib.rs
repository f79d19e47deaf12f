//! lualoader - Lua module auto-loading for HKS-scripted games
//!
//! A Rust port of the LuaLoader DLL: given a host `.me3` profile and a
//! `LuaLoader.toml` config, it generates a Lua setup script that scans a
//! directory for `.lua` modules, injects a `dofile` bootstrap line into the
//! game's `c0000.hks`, and keeps timestamped backups of everything it
//! touches. The whole thing can be reversed with one config flag.
//!
//! The host (me3 or any native mod host) drives it explicitly: [`startup`]
//! once when the game process comes up, [`shutdown`] when it goes away.

// =============================================================================
// Lints
// =============================================================================

// Enable comprehensive clippy lints for code quality
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow these specific patterns that are intentional in this codebase
#![allow(clippy::missing_errors_doc)] // Error semantics are documented on the error types
#![allow(clippy::missing_panics_doc)] // Library code does not panic
#![allow(clippy::must_use_candidate)] // Many functions have side effects
#![allow(clippy::module_name_repetitions)] // LoaderConfig, LoaderError etc. read better qualified
#![allow(clippy::doc_markdown)] // Game file names don't need backticks everywhere

pub mod backup;
pub mod cleanup;
pub mod config;
pub mod errors;
pub mod flag;
pub mod inject;
pub mod logging;
pub mod paths;
pub mod profile;
pub mod setup;

pub use config::{LoaderConfig, PathInfo, DEFAULT_CONFIG_NAME};
pub use errors::{ConfigError, LoaderError, ScriptError, SetupError};
pub use logging::{LogLevel, Logger};

use std::path::{Path, PathBuf};

const SRC: &str = "Loader";

// =============================================================================
// Startup / shutdown
// =============================================================================

/// What a [`startup`] call ended up doing.
#[derive(Debug)]
pub enum Startup {
    /// Config loaded, setup script written, injection in place.
    Ready(LoaderConfig),
    /// No config existed; a default was generated and linked into the
    /// profile. The user edits it and relaunches.
    ConfigGenerated(PathBuf),
    /// `cleanupOnNextLaunch` was set: artifacts were removed and the flag
    /// reset, nothing was (re-)installed.
    CleanupPerformed,
}

/// Bring the loader up: discover the profile and config, emit the setup
/// script, and patch the target script.
///
/// `search_root` is where profile discovery starts; a host passes the
/// directory it was loaded from.
pub fn startup(search_root: &Path, logger: &Logger) -> Result<Startup, LoaderError> {
    logger.info(SRC, "searching for .me3 config files");

    let profile_path = profile::find(search_root, logger).ok_or_else(|| {
        ConfigError::ProfileNotFound {
            searched: profile::search_dirs(search_root),
        }
    })?;

    let config_path = match profile::config_path_override(&profile_path, logger) {
        Some(path) => path,
        None => {
            let default = profile_path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(DEFAULT_CONFIG_NAME);
            logger.info(SRC, &format!("using default config path: {}", default.display()));
            default
        }
    };

    if !config_path.exists() {
        logger.warn(
            SRC,
            &format!(
                "no {DEFAULT_CONFIG_NAME} found, generating default at: {}",
                config_path.display()
            ),
        );
        config::generate_default(&config_path, logger)?;
        if let Err(err) = profile::write_config_path(&profile_path, &config_path, logger) {
            logger.warn(SRC, &format!("could not link config into profile: {err}"));
        }
        logger.info(SRC, "default config generated, edit and relaunch to set up");
        return Ok(Startup::ConfigGenerated(config_path));
    }

    let loaded = config::load(&config_path, logger)?;
    let config_name = config_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    logger.info(SRC, &format!("config loaded: {config_name}"));

    if loaded.cleanup_on_next_launch {
        cleanup::perform_full_cleanup(&loaded, logger);
        if let Err(err) = config::update_cleanup_flag(&config_path, false, logger) {
            logger.warn(SRC, &format!("could not reset cleanup flag: {err}"));
        }
        return Ok(Startup::CleanupPerformed);
    }

    if !validate_paths(&loaded, logger) {
        logger.warn(SRC, "path validation had issues, continuing anyway");
    }

    // Stale flag from a previous process would suppress module loading
    flag::clear(&loaded.module_path.absolute, logger);

    setup::write_setup_script(&loaded, logger)?;
    inject::inject_into_script(&loaded, logger)?;

    logger.info(SRC, "ready! modules will load automatically");
    Ok(Startup::Ready(loaded))
}

/// Tear down per-process state. The injection and setup script stay in place
/// for the next launch; only the flag file goes.
pub fn shutdown(config: &LoaderConfig, logger: &Logger) {
    flag::clear(&config.module_path.absolute, logger);
}

/// Warn about configured directories that do not exist yet. Non-fatal: the
/// paths may be created later, and inject/setup report their own errors.
fn validate_paths(config: &LoaderConfig, logger: &Logger) -> bool {
    let mut all_ok = true;

    for (label, info) in [
        ("gameScriptPath", &config.game_script_path),
        ("modulePath", &config.module_path),
    ] {
        if info.is_empty() {
            logger.warn(SRC, &format!("{label} is not configured"));
            all_ok = false;
        } else if !Path::new(&info.absolute).is_dir() {
            logger.warn(
                SRC,
                &format!("{label} does not exist: {}", info.absolute),
            );
            all_ok = false;
        }
    }

    all_ok
}
