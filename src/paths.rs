//! Filesystem path helpers
//!
//! Normalization plus the multi-strategy fallback resolution used for every
//! path read from configuration. All returned strings use forward slashes,
//! which both Windows and the game's Lua runtime accept, and which keep
//! generated configs portable.

use once_cell::sync::Lazy;
use std::env;
use std::path::{Component, Path, PathBuf};

/// Directory containing the running executable, resolved once.
static EXE_DIR: Lazy<Option<PathBuf>> = Lazy::new(|| {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
});

// =============================================================================
// Normalization
// =============================================================================

/// Normalize a path string: make it absolute (against the current directory),
/// collapse `.`/`..` lexically, and convert separators to forward slashes.
///
/// Empty input stays empty; a path that cannot be made absolute is returned
/// slash-converted rather than dropped.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    let p = Path::new(path);
    let absolute = if p.is_relative() {
        match env::current_dir() {
            Ok(cwd) => cwd.join(p),
            Err(_) => p.to_path_buf(),
        }
    } else {
        p.to_path_buf()
    };

    to_slash(&lexical_normal(&absolute))
}

/// Collapse `.` and `..` components without touching the filesystem.
fn lexical_normal(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// =============================================================================
// Fallback resolution
// =============================================================================

/// Resolve a configured path against several base directories in turn.
///
/// Strategy order, taking the first candidate whose parent (or self) exists:
/// absolute input as-is, relative to the config directory, relative to the
/// working directory, relative to the executable directory. When nothing
/// exists the config-directory join is returned anyway so the caller still
/// gets a deterministic absolute path to report.
pub fn resolve_with_fallbacks(input: &str, config_dir: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let path = Path::new(input);
    if path.is_absolute() {
        return to_slash(&lexical_normal(path));
    }

    let config_candidate = to_slash(&lexical_normal(&Path::new(config_dir).join(path)));
    if is_plausible(&config_candidate) {
        return config_candidate;
    }

    if let Ok(cwd) = env::current_dir() {
        let candidate = to_slash(&lexical_normal(&cwd.join(path)));
        if is_plausible(&candidate) {
            return candidate;
        }
    }

    if let Some(exe_dir) = EXE_DIR.as_ref() {
        let candidate = to_slash(&lexical_normal(&exe_dir.join(path)));
        if is_plausible(&candidate) {
            return candidate;
        }
    }

    config_candidate
}

/// A candidate is plausible when it, or at least its parent directory, exists.
fn is_plausible(candidate: &str) -> bool {
    let path = Path::new(candidate);
    path.exists() || path.parent().is_some_and(Path::exists)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_dot_and_dotdot() {
        let normal = lexical_normal(Path::new("/a/b/../c/./d"));
        assert_eq!(to_slash(&normal), "/a/c/d");
    }

    #[test]
    fn test_normalize_keeps_parent_at_root() {
        let normal = lexical_normal(Path::new("/../a"));
        assert_eq!(to_slash(&normal), "/a");
    }

    #[test]
    fn test_normalize_empty_stays_empty() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_resolve_absolute_input_wins() {
        let dir = tempfile::tempdir().unwrap();
        let abs = dir.path().join("x").to_string_lossy().replace('\\', "/");
        let resolved = resolve_with_fallbacks(&abs, "/nonexistent/base");
        assert_eq!(resolved, abs);
    }

    #[test]
    fn test_resolve_prefers_config_dir_when_it_exists() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().to_string_lossy().replace('\\', "/");
        let resolved = resolve_with_fallbacks("mods/lua", &config_dir);
        assert_eq!(resolved, format!("{config_dir}/mods/lua"));
    }

    #[test]
    fn test_resolve_falls_back_to_config_join_when_nothing_exists() {
        let resolved = resolve_with_fallbacks(
            "deep/unlikely/tree",
            "/definitely/not/a/real/base/dir",
        );
        assert_eq!(resolved, "/definitely/not/a/real/base/dir/deep/unlikely/tree");
    }
}
