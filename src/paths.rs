//! Centralized path resolution for homestead
//!
//! # Environment Variables
//!
//! - `HOMESTEAD_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/homestead`)
//! - `HOMESTEAD_HOME` - Override the home directory dotfiles deploy into
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `HOMESTEAD_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/homestead` (if set)
//! 3. `~/.config/homestead`
//!
//! The config file, the lock file and the dotfile sources all live in the
//! config directory, so the whole directory can be kept in a dotfiles repo.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "HOMESTEAD_CONFIG_DIR";

/// Environment variable for the dotfile target home override
pub const ENV_HOME: &str = "HOMESTEAD_HOME";

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "homestead.toml";

/// Lock file name inside the config directory
pub const LOCK_FILE: &str = "homestead.lock";

/// Dotfile source directory name inside the config directory
pub const DOTFILES_DIR: &str = "dotfiles";

/// Get the homestead config directory path
///
/// Priority:
/// 1. `HOMESTEAD_CONFIG_DIR` env var
/// 2. `XDG_CONFIG_HOME/homestead`
/// 3. `~/.config/homestead`
pub fn config_dir() -> Result<PathBuf> {
    // 1. Check environment variable override
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand_path(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    // 2. Check XDG_CONFIG_HOME
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config.is_empty() {
            let path = PathBuf::from(xdg_config).join("homestead");
            log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
            return Ok(path);
        }
    }

    // 3. Default: ~/.config/homestead
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("homestead");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Home directory dotfiles are deployed into
pub fn home_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_HOME) {
        let path = expand_path(&dir);
        log::debug!("Using home from {}: {}", ENV_HOME, path.display());
        return Ok(path);
    }
    dirs::home_dir().context("Could not determine home directory")
}

/// `homestead.toml` inside `config_dir`
pub fn config_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE)
}

/// `homestead.lock` inside `config_dir`
pub fn lock_path(config_dir: &Path) -> PathBuf {
    config_dir.join(LOCK_FILE)
}

/// Dotfile sources inside `config_dir`
pub fn dotfiles_dir(config_dir: &Path) -> PathBuf {
    config_dir.join(DOTFILES_DIR)
}

/// Expand `~` in a user-supplied path string.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

// ============================================================================
// Tests
// ============================================================================
