use anyhow::{Context, Result};
use canvas_protocol::Settings;
use log::{debug, warn};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "bookmark-canvas";
const SETTINGS_FILE: &str = "settings.toml";

/// `--config` when given, otherwise `<config dir>/bookmark-canvas/settings.toml`.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
        .context("No config directory on this platform; pass --config")
}

/// Missing file means defaults. So does a corrupt one, with a warning.
pub fn load(path: &Path) -> Settings {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!("No settings at {}; using defaults", path.display());
            return Settings::default();
        }
        Err(err) => {
            warn!("Cannot read settings {}: {err}; using defaults", path.display());
            return Settings::default();
        }
    };
    match toml::from_str(&raw) {
        Ok(settings) => settings,
        Err(err) => {
            warn!("Ignoring corrupt settings {}: {err}", path.display());
            Settings::default()
        }
    }
}

pub fn save(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create config dir {}", parent.display()))?;
        }
    }
    let body = toml::to_string_pretty(settings)?;
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, body).with_context(|| format!("Cannot write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Cannot replace {}", path.display()))?;
    Ok(())
}
