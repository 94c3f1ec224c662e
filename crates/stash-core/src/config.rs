use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/stash/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StashConfig {
    /// Cache directory override. When unset, the XDG cache dir is used.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-transfer timeout in seconds (large video assets need headroom).
    pub transfer_timeout_secs: u64,
    /// Redirect cap before the transfer is abandoned.
    pub max_redirects: u32,
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            connect_timeout_secs: 30,
            transfer_timeout_secs: 3600,
            max_redirects: 10,
        }
    }
}

impl StashConfig {
    /// Effective cache directory: the configured override, or
    /// `~/.cache/stash/assets`.
    pub fn resolved_cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        default_cache_dir()
    }
}

/// Default on-disk location for cached assets.
pub fn default_cache_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("stash")?;
    Ok(xdg_dirs.get_cache_home().join("assets"))
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("stash")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<StashConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = StashConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: StashConfig = toml::from_str(&data)?;
    Ok(cfg)
}
