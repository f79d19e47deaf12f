//! Error types for lualoader
//!
//! Every filesystem call in this crate is wrapped so that the raw
//! `std::io::Error` is classified into one of these categories at the point
//! of the operation. Nothing here panics or propagates raw errors: this code
//! runs inside a host process that must never be taken down by a bad path.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while probing, reading, or rewriting a script file.
///
/// The categories are deliberately coarse but distinguishable: a missing
/// target is user-actionable (fix the configured path), while an access or
/// write failure points at permissions or another process holding the file.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Target file does not exist or is not a regular file
    #[error(
        "script file not found: {}\n\
         Verify the file exists and gameScriptPath points at the directory containing it.",
        path.display()
    )]
    FileNotFound { path: PathBuf },

    /// Target exists but cannot be opened with the required access
    #[error("access denied for {}: {message}", path.display())]
    AccessDenied { path: PathBuf, message: String },

    /// Opening succeeded but reading the content failed
    #[error("failed to read {}: {message}", path.display())]
    ReadFailure { path: PathBuf, message: String },

    /// Rewriting the file failed; the pre-existing content is left intact
    #[error("failed to write {}: {message}", path.display())]
    WriteFailure { path: PathBuf, message: String },

    /// Anything the other categories do not cover
    #[error("unexpected system error for {}: {message}", path.display())]
    UnknownSystemError { path: PathBuf, message: String },
}

impl ScriptError {
    /// Classify an error from an existence/metadata probe.
    pub fn from_probe(path: &Path, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => Self::AccessDenied {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
            _ => Self::UnknownSystemError {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
        }
    }

    /// Classify an error from a content read.
    pub fn from_read(path: &Path, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => Self::AccessDenied {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
            _ => Self::ReadFailure {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
        }
    }

    /// Classify an error from a content write or replace.
    pub fn from_write(path: &Path, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::AccessDenied {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
            _ => Self::WriteFailure {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
        }
    }
}

/// Errors raised while discovering, generating, or parsing configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No `.me3` profile was found in any of the search directories
    #[error(
        "no .me3 configuration file found (searched {searched:?})\n\
         Create a .me3 file with gameScriptPath and modulePath."
    )]
    ProfileNotFound { searched: Vec<PathBuf> },

    /// Config file could not be read
    #[error("failed to open config {}: {message}", path.display())]
    ReadFailed { path: PathBuf, message: String },

    /// Config file is not valid TOML
    #[error("config {} is not valid TOML: {message}", path.display())]
    InvalidToml { path: PathBuf, message: String },

    /// The one required key is absent
    #[error(
        "missing gameScriptPath in {}\n\
         Add: gameScriptPath = \"relative/path/to/script\"",
        path.display()
    )]
    MissingGameScriptPath { path: PathBuf },

    /// The key is present but empty or whitespace
    #[error(
        "gameScriptPath is empty in {}\n\
         Point it at your game's script directory and relaunch.",
        path.display()
    )]
    EmptyGameScriptPath { path: PathBuf },

    /// Default-config generation or flag rewrite failed
    #[error("failed to write config {}: {message}", path.display())]
    WriteFailed { path: PathBuf, message: String },
}

/// Errors raised while emitting the Lua setup script
#[derive(Debug, Error)]
pub enum SetupError {
    /// Configuration is unusable for script generation
    #[error(
        "setup script configuration invalid: {issue}\n\
         Check modulePath in your config file and relaunch."
    )]
    InvalidConfig { issue: String },

    /// The `_module_loader` directory could not be created
    #[error("failed to create loader directory {}: {message}", path.display())]
    CreateDirectory { path: PathBuf, message: String },

    /// The setup script itself could not be written
    #[error("failed to write setup script {}: {message}", path.display())]
    WriteScript { path: PathBuf, message: String },
}

/// Top-level error type for the lualoader library
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Configuration discovery/parsing error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Script file patching error
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Setup-script generation error
    #[error(transparent)]
    Setup(#[from] SetupError),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_not_found_maps_to_file_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            ScriptError::from_probe(Path::new("/x/c0000.hks"), &err),
            ScriptError::FileNotFound { .. }
        ));
    }

    #[test]
    fn test_permission_denied_maps_to_access_denied() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            ScriptError::from_read(Path::new("/x"), &err),
            ScriptError::AccessDenied { .. }
        ));
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            ScriptError::from_write(Path::new("/x"), &err),
            ScriptError::AccessDenied { .. }
        ));
    }

    #[test]
    fn test_other_read_and_write_failures_stay_distinct() {
        let err = io::Error::new(io::ErrorKind::InvalidData, "binary junk");
        assert!(matches!(
            ScriptError::from_read(Path::new("/x"), &err),
            ScriptError::ReadFailure { .. }
        ));
        let err = io::Error::new(io::ErrorKind::WriteZero, "disk full");
        assert!(matches!(
            ScriptError::from_write(Path::new("/x"), &err),
            ScriptError::WriteFailure { .. }
        ));
    }

    #[test]
    fn test_file_not_found_message_carries_remediation() {
        let err = ScriptError::FileNotFound {
            path: PathBuf::from("/game/script/c0000.hks"),
        };
        let text = err.to_string();
        assert!(text.contains("c0000.hks"));
        assert!(text.contains("gameScriptPath"));
    }
}
