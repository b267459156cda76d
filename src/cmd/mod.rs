//! Command-line entry points.

use crate::{
    prelude::*,
    settings::{Settings, settings_path},
};

pub mod extract;
pub mod pages;
pub mod settings;

/// Find and load our settings file.
pub fn load_settings(config_path: Option<&Path>) -> Result<(PathBuf, Settings)> {
    let path = settings_path(config_path)?;
    let settings = Settings::load(&path)?;
    debug!(path = %path.display(), ?settings, "Loaded settings");
    Ok((path, settings))
}
