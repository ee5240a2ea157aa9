use crate::{AppConfig, DirViewError};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "dirview.toml";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    pub exists: bool,
    pub portable: bool,
}

pub fn load_config(prefer_portable: bool) -> Result<LoadedConfig, DirViewError> {
    let (path, portable) = resolve_config_path(prefer_portable)?;
    let mut loaded = load_config_from(&path)?;
    loaded.portable = portable;
    loaded.config.portable_mode = portable;
    Ok(loaded)
}

/// Load the configuration stored at `path`, falling back to defaults when the
/// file does not exist yet.
pub fn load_config_from(path: &Path) -> Result<LoadedConfig, DirViewError> {
    let exists = path.exists();

    let config = if exists {
        let data = fs::read_to_string(path)?;
        toml::from_str(&data).map_err(|e| DirViewError::Serialization(e.to_string()))?
    } else {
        AppConfig::default()
    };

    Ok(LoadedConfig {
        config,
        path: path.to_path_buf(),
        exists,
        portable: false,
    })
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), DirViewError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = toml::to_string_pretty(config)
        .map_err(|e| DirViewError::Serialization(e.to_string()))?;
    fs::write(path, data)?;
    Ok(())
}

pub fn default_cache_dir(portable: bool, config_path: &Path) -> Result<PathBuf, DirViewError> {
    if portable {
        let base = config_path
            .parent()
            .map(|path| path.to_path_buf())
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        return Ok(base.join("dirview_cache"));
    }

    Ok(project_dirs()?.cache_dir().to_path_buf())
}

fn project_dirs() -> Result<ProjectDirs, DirViewError> {
    ProjectDirs::from("", "dirview", "dirview")
        .ok_or_else(|| DirViewError::Config("Unable to determine config directory".to_string()))
}

fn resolve_config_path(prefer_portable: bool) -> Result<(PathBuf, bool), DirViewError> {
    if let Some(portable_path) = portable_config_path() {
        if prefer_portable || portable_path.exists() {
            return Ok((portable_path, true));
        }
    }

    Ok((project_dirs()?.config_dir().join(CONFIG_FILE_NAME), false))
}

fn portable_config_path() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
}
