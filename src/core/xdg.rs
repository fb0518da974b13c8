//! XDG Base Directory Support
//!
//! Resolves where csvpipe keeps its configuration, its processed-file
//! index, loaded output and logs. Provides a one-time copy of a
//! legacy `./csvpipe.toml` into the XDG config location.

use std::env;
use std::fs;
use std::path::PathBuf;

/// XDG directory structure for csvpipe
#[derive(Debug, Clone)]
pub struct XdgDirs {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl XdgDirs {
    /// Create new XDG directory structure
    ///
    /// Priority order (highest to lowest):
    /// 1. Explicit CSVPIPE_* env vars
    /// 2. XDG_* environment variables
    /// 3. XDG defaults (~/.config, ~/.local/share, ~/.local/state)
    pub fn new() -> Self {
        Self {
            config_dir: resolve("CSVPIPE_CONFIG_DIR", "XDG_CONFIG_HOME", &[".config"]),
            data_dir: resolve("CSVPIPE_DATA_DIR", "XDG_DATA_HOME", &[".local", "share"]),
            state_dir: resolve("CSVPIPE_STATE_DIR", "XDG_STATE_HOME", &[".local", "state"]),
        }
    }

    /// Get config file path
    pub fn config_file(&self) -> PathBuf {
        if let Ok(file) = env::var("CSVPIPE_CONFIG_FILE") {
            return PathBuf::from(file);
        }

        self.config_dir.join("config.toml")
    }

    /// Default location of the processed-file snapshot
    pub fn index_file(&self) -> PathBuf {
        self.data_dir.join("file_index.json")
    }

    /// Default output directory of the JSON-lines loader
    pub fn loaded_dir(&self) -> PathBuf {
        self.data_dir.join("loaded")
    }

    /// Get logs directory path
    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// Pipeline event log (JSON lines)
    pub fn events_file(&self) -> PathBuf {
        self.state_dir.join("events.jsonl")
    }

    /// Create all XDG directories if they don't exist
    pub fn ensure_dirs_exist(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.config_dir)?;
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }

    /// Log the resolved XDG paths
    pub fn log_paths(&self) {
        tracing::debug!("XDG directories resolved:");
        tracing::debug!("  Config: {:?}", self.config_dir);
        tracing::debug!("  Data: {:?}", self.data_dir);
        tracing::debug!("  State: {:?}", self.state_dir);
        tracing::debug!("  Config file: {:?}", self.config_file());
    }
}

impl Default for XdgDirs {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(explicit_var: &str, xdg_var: &str, home_default: &[&str]) -> PathBuf {
    if let Ok(dir) = env::var(explicit_var) {
        return PathBuf::from(dir);
    }

    if let Ok(xdg) = env::var(xdg_var) {
        return PathBuf::from(xdg).join("csvpipe");
    }

    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    for part in home_default {
        path.push(part);
    }
    path.join("csvpipe")
}

/// Migrate legacy paths to XDG structure
///
/// Copies `./csvpipe.toml` to the XDG config file when the latter
/// does not exist yet. Never deletes the original.
pub fn migrate_legacy_paths(xdg: &XdgDirs) -> std::io::Result<()> {
    let legacy_config = PathBuf::from("./csvpipe.toml");
    let new_config = xdg.config_file();

    if legacy_config.exists() && !new_config.exists() {
        fs::create_dir_all(&xdg.config_dir)?;
        fs::copy(&legacy_config, &new_config)?;
        tracing::info!("Migrated config: {:?} → {:?}", legacy_config, new_config);
    }

    Ok(())
}
