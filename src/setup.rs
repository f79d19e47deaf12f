//! Lua setup-script generation
//!
//! Renders and writes `_module_loader/module_loader_setup.lua`, the script
//! the injected `dofile` line executes. It scans the module directory for
//! `.lua` files, loads each through `pcall(require, ...)`, and records a
//! PID-stamped flag file so one process never loads modules twice.

use crate::config::LoaderConfig;
use crate::errors::{LoaderError, SetupError};
use crate::inject::{LOADER_DIR_NAME, SETUP_SCRIPT_NAME};
use crate::logging::Logger;
use std::fs;
use std::path::{Path, PathBuf};

const SRC: &str = "LuaSetup";

/// Template for the generated script. `${...}` placeholders are substituted
/// with resolved config paths; everything else ships verbatim.
const LUA_TEMPLATE: &str = r#"-- Lua Loader by Malice - Setup Script (Enhanced Path Resolution Version)
local MODULE_PATH = "${MODULE_PATH}"
local LOADER_DIR = "${LOADER_DIR}"
local FLAG_FILE = LOADER_DIR .. "/.modules_loaded"
local CONFIG_DIR = "${CONFIG_DIR}"

function consolePrint(msg)
    local f = io.open("CONOUT$", "a")
    if f then f:write("  "..tostring(msg).."\n"); f:close() end
end
print = consolePrint

-- Current process ID, so the flag file only suppresses reloads within one run
local function getCurrentProcessId()
    local handle = io.popen("echo %WINPID% 2>nul || powershell -Command \"Get-Process -Id $PID | Select-Object -ExpandProperty Id\"")
    local pid = "unknown"
    if handle then
        pid = handle:read("*l") or "unknown"
        handle:close()
    end
    return tostring(pid):gsub("%s+", "")
end

local function isAlreadyLoaded()
    local f = io.open(FLAG_FILE, "r")
    if not f then return false end

    local content = f:read("*a")
    f:close()

    if not content then return false end

    local currentPid = getCurrentProcessId()
    if content:find("PID:" .. currentPid) then
        return true
    end

    return false
end

if isAlreadyLoaded() then
    print("Modules already loaded for this process - skipping")
    return
end

print("==========================================")
print("Module Loader - Enhanced Path Resolution Version")
print("Config directory: " .. CONFIG_DIR)
print("Module path (absolute): " .. MODULE_PATH)
print("Relative paths resolved from: ${CONFIG_RELATIVE_PATH}")
print("Module path (relative): ${MODULE_RELATIVE_PATH}")
print("==========================================")
print("")

local function scanForModules()
    local modules = {}
    local handle = io.popen('dir "' .. MODULE_PATH .. '\\*.lua" /b 2>nul')
    if handle then
        for filename in handle:lines() do
            local name = filename:match("(.+)%.lua$")
            if name and name ~= "module_loader_setup" then
                table.insert(modules, name)
            end
        end
        handle:close()
    end
    return modules
end

function loadModules()
    package.path = package.path .. ";" .. MODULE_PATH .. "/?.lua"

    local modules = scanForModules()
    if #modules == 0 then
        print("No modules found in: " .. MODULE_PATH)
        return false
    end

    print("Loading " .. #modules .. " Modules:")
    for i, moduleName in ipairs(modules) do
        print("  " .. i .. ". " .. moduleName .. ".lua")
    end
    print("")

    local loadedCount = 0
    for _, moduleName in ipairs(modules) do
        local success, result = pcall(require, moduleName)
        if success then
            -- Modules returning a table become globals under their own name
            if type(result) == "table" then
                _G[moduleName] = result
            end
            loadedCount = loadedCount + 1
            print("  [OK] Loaded: " .. moduleName)
        else
            print("  [ERROR] Failed to load: " .. moduleName .. " - " .. tostring(result))
        end
    end

    local flagFile = io.open(FLAG_FILE, "w")
    if flagFile then
        flagFile:write("Loaded at: " .. os.date() .. "\n")
        flagFile:write("PID:" .. getCurrentProcessId() .. "\n")
        flagFile:write("Modules loaded: " .. loadedCount .. "/" .. #modules .. "\n")
        flagFile:write("Config directory: " .. CONFIG_DIR .. "\n")
        flagFile:write("Module path (absolute): " .. MODULE_PATH .. "\n")
        flagFile:write("Module path (relative): ${MODULE_RELATIVE_PATH}\n")
        flagFile:close()
    end

    print("")
    if loadedCount > 0 then
        print("[OK] " .. loadedCount .. "/" .. #modules .. " modules loaded successfully")
        print("==========================================")
        return true
    else
        print("[ERROR] No modules loaded successfully")
        print("==========================================")
        return false
    end
end

loadModules()
"#;

/// Generate and write the setup script, returning its path.
pub fn write_setup_script(config: &LoaderConfig, logger: &Logger) -> Result<PathBuf, LoaderError> {
    logger.debug(SRC, "starting setup script creation");

    if let Some(issue) = validate(config) {
        return Err(SetupError::InvalidConfig {
            issue: issue.to_string(),
        }
        .into());
    }

    let loader_dir = PathBuf::from(format!(
        "{}/{LOADER_DIR_NAME}",
        config.module_path.absolute
    ));
    let script_path = loader_dir.join(SETUP_SCRIPT_NAME);
    logger.debug(SRC, &format!("target setup script: {}", script_path.display()));

    if loader_dir.exists() {
        logger.debug(SRC, "loader directory already exists");
    } else {
        fs::create_dir_all(&loader_dir).map_err(|err| SetupError::CreateDirectory {
            path: loader_dir.clone(),
            message: err.to_string(),
        })?;
        logger.debug(SRC, &format!("created loader directory: {}", loader_dir.display()));
    }

    // A stale script from a previous run gets replaced; failure to delete it
    // first is non-fatal since the write below truncates anyway.
    if script_path.exists() {
        if let Err(err) = fs::remove_file(&script_path) {
            logger.warn(SRC, &format!("could not remove existing setup script: {err}"));
        }
    }

    let rendered = render(config, &loader_dir);
    fs::write(&script_path, &rendered).map_err(|err| SetupError::WriteScript {
        path: script_path.clone(),
        message: err.to_string(),
    })?;

    logger.info(
        SRC,
        &format!("setup script created successfully: {}", script_path.display()),
    );
    logger.debug(SRC, &format!("script size: {} bytes", rendered.len()));
    Ok(script_path)
}

fn validate(config: &LoaderConfig) -> Option<&'static str> {
    if config.module_path.absolute.is_empty() {
        Some("module path is empty")
    } else if config.config_dir.is_empty() {
        Some("config directory is empty")
    } else if config.module_path.absolute.trim().is_empty() {
        Some("module path contains only whitespace")
    } else {
        None
    }
}

fn render(config: &LoaderConfig, loader_dir: &Path) -> String {
    LUA_TEMPLATE
        .replace("${LOADER_DIR}", &loader_dir.to_string_lossy().replace('\\', "/"))
        .replace("${MODULE_PATH}", &config.module_path.absolute)
        .replace("${CONFIG_DIR}", &config.config_dir)
        .replace("${CONFIG_RELATIVE_PATH}", &config.game_script_path.relative)
        .replace("${MODULE_RELATIVE_PATH}", &config.module_path.relative)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathInfo;

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

    #[test]
    fn test_script_lands_under_module_loader_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let path = write_setup_script(&config, &Logger::disabled()).unwrap();
        assert!(path.ends_with("_module_loader/module_loader_setup.lua"));
        assert!(path.is_file());
    }

    #[test]
    fn test_all_placeholders_substituted() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let path = write_setup_script(&config, &Logger::disabled()).unwrap();
        let script = fs::read_to_string(&path).unwrap();
        assert!(!script.contains("${"), "unsubstituted placeholder in:\n{script}");
        assert!(script.contains(&config.module_path.absolute));
        assert!(script.contains(&config.config_dir));
        assert!(script.contains("script/lua"));
    }

    #[test]
    fn test_rewrite_replaces_stale_script() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let path = write_setup_script(&config, &Logger::disabled()).unwrap();
        fs::write(&path, "-- stale leftovers\n").unwrap();

        write_setup_script(&config, &Logger::disabled()).unwrap();
        let script = fs::read_to_string(&path).unwrap();
        assert!(!script.contains("stale leftovers"));
        assert!(script.contains("loadModules()"));
    }

    #[test]
    fn test_empty_module_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.module_path.absolute = String::new();
        let err = write_setup_script(&config, &Logger::disabled()).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::Setup(SetupError::InvalidConfig { .. })
        ));
    }
}
