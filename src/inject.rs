//! HKS script integration
//!
//! Prepends the `dofile` bootstrap block to the game's `c0000.hks`, exactly
//! once. Detection is deliberately paranoid: any trace of a current, manual,
//! or superseded installation counts as "already applied", because a
//! duplicated block would run user modules twice per frame script reload.

use crate::backup;
use crate::config::LoaderConfig;
use crate::errors::{ConfigError, LoaderError, ScriptError};
use crate::logging::Logger;
use std::fs;
use std::path::{Path, PathBuf};

const SRC: &str = "HksInjector";

/// Script the game engine reloads on every map load.
pub const TARGET_SCRIPT_NAME: &str = "c0000.hks";
/// Generated setup script the bootstrap line points at.
pub const SETUP_SCRIPT_NAME: &str = "module_loader_setup.lua";
/// Directory holding the generated setup script and the load flag.
pub const LOADER_DIR_NAME: &str = "_module_loader";

/// Banner line opening and closing the injected header.
const BANNER: &str = "-- ========================================";
/// Product signature expected on the line right after the opening banner.
const BLOCK_SIGNATURE: &str = "-- Lua Loader";

/// Marker substrings from superseded injection formats. Any hit means the
/// file already carries some form of the bootstrap. The union of every list
/// that ever shipped is kept here; dropping one would re-inject on top of an
/// old install.
const LEGACY_MARKERS: &[(&str, &str)] = &[
    ("-- Lua Loader by Malice", "legacy header signature"),
    ("dofile('", "legacy dofile single quotes"),
    ("dofile(\"", "legacy dofile double quotes"),
    ("_module_loader", "legacy module loader reference"),
];

// =============================================================================
// Derived paths
// =============================================================================

pub fn target_script_path(config: &LoaderConfig) -> PathBuf {
    PathBuf::from(format!(
        "{}/{}",
        config.game_script_path.absolute, TARGET_SCRIPT_NAME
    ))
}

pub fn setup_script_path(config: &LoaderConfig) -> String {
    format!(
        "{}/{}/{}",
        config.module_path.absolute, LOADER_DIR_NAME, SETUP_SCRIPT_NAME
    )
}

/// The exact line injected into the target script. Single quotes and an
/// absolute path: `dofile` has no search path of its own.
pub fn invocation_line(config: &LoaderConfig) -> String {
    format!("dofile('{}')", setup_script_path(config))
}

// =============================================================================
// Already-applied detection
// =============================================================================

/// What matched when a file was detected as already carrying the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionSignal {
    pub pattern: String,
    pub kind: &'static str,
}

/// Check every known "already applied" signal against the file content.
pub fn detect_existing(content: &str, invocation: &str) -> Option<InjectionSignal> {
    if content.contains(invocation) {
        return Some(InjectionSignal {
            pattern: invocation.to_string(),
            kind: "exact current injection",
        });
    }

    if content.contains(SETUP_SCRIPT_NAME) {
        return Some(InjectionSignal {
            pattern: SETUP_SCRIPT_NAME.to_string(),
            kind: "module loader reference",
        });
    }

    for &(pattern, kind) in LEGACY_MARKERS {
        if content.contains(pattern) {
            return Some(InjectionSignal {
                pattern: pattern.to_string(),
                kind,
            });
        }
    }

    None
}

// =============================================================================
// Block scanner
// =============================================================================

/// Result of scanning a script for the injected block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockScan {
    /// No start marker anywhere in the file.
    Absent,
    /// Block found; lines `start..=end` (inclusive) belong to it, including
    /// any blank lines absorbed after the end marker.
    Found {
        start: usize,
        end: usize,
        /// False when EOF was reached before the end marker; the block then
        /// runs to the last line.
        terminated: bool,
    },
}

#[derive(Clone, Copy)]
enum ScanState {
    Outside,
    InsideBlock { start: usize },
}

/// Two-state scan over the file's lines.
///
/// A start is a banner line whose immediate successor carries the product
/// signature. The end is the line holding both the `dofile(` call and the
/// setup-script name; blank lines directly after it are absorbed into the
/// block so repeated apply/remove cycles do not accumulate blank-line drift.
pub fn scan_for_block(lines: &[&str]) -> BlockScan {
    let mut state = ScanState::Outside;

    for (i, line) in lines.iter().enumerate() {
        match state {
            ScanState::Outside => {
                let next_is_signature = lines
                    .get(i + 1)
                    .is_some_and(|next| next.contains(BLOCK_SIGNATURE));
                if line.contains(BANNER) && next_is_signature {
                    state = ScanState::InsideBlock { start: i };
                }
            }
            ScanState::InsideBlock { start } => {
                if line.contains("dofile(") && line.contains(SETUP_SCRIPT_NAME) {
                    let mut end = i;
                    while end + 1 < lines.len() && lines[end + 1].trim().is_empty() {
                        end += 1;
                    }
                    return BlockScan::Found {
                        start,
                        end,
                        terminated: true,
                    };
                }
            }
        }
    }

    match state {
        ScanState::Outside => BlockScan::Absent,
        ScanState::InsideBlock { start } => BlockScan::Found {
            start,
            end: lines.len().saturating_sub(1),
            terminated: false,
        },
    }
}

// =============================================================================
// Apply
// =============================================================================

/// Outcome of an apply call that did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectOutcome {
    /// File already carried the bootstrap; content untouched.
    AlreadyApplied(InjectionSignal),
    /// Header and invocation prepended ahead of the original content.
    Applied,
}

/// Inject the bootstrap block into the target script.
///
/// The original content is never reordered or altered; the new block is
/// strictly prepended. A backup is taken before any mutation (and, when
/// `backupHKSonLaunch` is set, even on already-applied no-ops).
pub fn inject_into_script(
    config: &LoaderConfig,
    logger: &Logger,
) -> Result<InjectOutcome, LoaderError> {
    if config.game_script_path.is_empty() {
        return Err(ConfigError::EmptyGameScriptPath {
            path: config.config_file.clone(),
        }
        .into());
    }

    let script_path = target_script_path(config);
    probe_regular_file(&script_path)?;

    let content =
        fs::read_to_string(&script_path).map_err(|err| ScriptError::from_read(&script_path, &err))?;
    logger.debug(
        SRC,
        &format!(
            "read {} bytes from {}",
            content.len(),
            script_path.display()
        ),
    );

    let invocation = invocation_line(config);
    if let Some(signal) = detect_existing(&content, &invocation) {
        logger.info(SRC, "already integrated with game script");
        logger.debug(SRC, &format!("found: {} ({})", signal.pattern, signal.kind));

        if config.backup_on_launch {
            if backup::create(&script_path, config, "launch", logger) {
                logger.debug(SRC, "launch backup completed");
            } else {
                logger.debug(SRC, "launch backup skipped or failed");
            }
        }
        return Ok(InjectOutcome::AlreadyApplied(signal));
    }

    // Mutation is imminent; back up regardless of the launch flag. Still
    // best-effort: a failed backup must not stop the injection.
    if !backup::create(&script_path, config, "injection", logger) {
        logger.warn(SRC, "pre-injection backup skipped or failed, proceeding");
    }

    let new_content = format!("{}{invocation}\n\n{content}", header(config));
    write_replace(&script_path, &new_content)?;

    logger.info(SRC, "successfully integrated with game script");
    logger.debug(
        SRC,
        &format!("injection uses absolute path: {}", setup_script_path(config)),
    );
    Ok(InjectOutcome::Applied)
}

/// Header comment block prepended ahead of the invocation line.
fn header(config: &LoaderConfig) -> String {
    let config_name = config
        .config_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    format!(
        "{BANNER}\n\
         {BLOCK_SIGNATURE} v{} - Enhanced Path Resolution\n\
         -- by Malice\n\
         {BANNER}\n\
         -- Config: {config_name}\n\
         -- Module Path: {}\n\
         {BANNER}\n\n",
        env!("CARGO_PKG_VERSION"),
        config.module_path.relative,
    )
}

// =============================================================================
// Shared file plumbing
// =============================================================================

/// Distinguish "not found" from "inaccessible" up front, before reading.
pub(crate) fn probe_regular_file(path: &Path) -> Result<(), ScriptError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(ScriptError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(err) => Err(ScriptError::from_probe(path, &err)),
    }
}

/// Rewrite `path` through a sibling temp file and rename, so a failed write
/// leaves the original readable.
pub(crate) fn write_replace(path: &Path, content: &str) -> Result<(), ScriptError> {
    let tmp_name = path
        .file_name()
        .map(|name| format!("{}.tmp", name.to_string_lossy()))
        .unwrap_or_else(|| String::from(".lualoader.tmp"));
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, content).map_err(|err| ScriptError::from_write(path, &err))?;
    fs::rename(&tmp, path).map_err(|err| {
        let _ = fs::remove_file(&tmp);
        ScriptError::from_write(path, &err)
    })?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
