//! User settings, persisted as a small TOML file.
//!
//! Settings are plain values. The command-line front end owns the only
//! mutable copy, and hands what the extractors need to them explicitly via
//! [`ExtractionContext`](crate::extractors::ExtractionContext).

use std::{env, fs, io};

use crate::{errors::SettingsError, export::OutputFormat, prelude::*, source::OcrEngineKind};

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV_VAR: &str = "SCRAPEY_CONFIG";

/// User-adjustable defaults.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Language passed to the OCR engine, as a Tesseract language code.
    pub ocr_language: String,

    /// Engine used when `--engine` is not given.
    pub default_ocr_engine: OcrEngineKind,

    /// Format used when `--format` is not given.
    pub default_output_format: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ocr_language: "eng".to_owned(),
            default_ocr_engine: OcrEngineKind::Tesseract,
            default_output_format: OutputFormat::Text,
        }
    }
}

impl Settings {
    /// The names of the settings we support, in display order.
    pub const KEYS: &'static [&'static str] = &["ocr_language", "default_ocr_engine", "default_output_format"];

    /// Load settings from `path`. A missing file gives us the defaults.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        toml::from_str(&data).map_err(|source| SettingsError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Save settings to `path`, creating parent directories as needed.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_owned(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let data = toml::to_string_pretty(self)?;
        fs::write(path, data).map_err(io_err)?;
        info!("Saved settings");
        Ok(())
    }

    /// Get a setting by name, formatted for display.
    pub fn get(&self, key: &str) -> Result<String, SettingsError> {
        match key {
            "ocr_language" => Ok(self.ocr_language.clone()),
            "default_ocr_engine" => Ok(self.default_ocr_engine.to_string()),
            "default_output_format" => Ok(self.default_output_format.to_string()),
            _ => Err(SettingsError::UnknownKey(key.to_owned())),
        }
    }

    /// Set a setting by name, validating the value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let invalid = |key, err: anyhow::Error| SettingsError::InvalidValue {
            key,
            value: value.to_owned(),
            reason: err.to_string(),
        };
        match key {
            "ocr_language" => {
                let value = value.trim();
                if value.is_empty() {
                    return Err(invalid("ocr_language", anyhow!("language cannot be empty")));
                }
                self.ocr_language = value.to_owned();
            }
            "default_ocr_engine" => {
                self.default_ocr_engine =
                    value.parse().map_err(|err| invalid("default_ocr_engine", err))?;
            }
            "default_output_format" => {
                self.default_output_format = value
                    .parse()
                    .map_err(|err| invalid("default_output_format", err))?;
            }
            _ => return Err(SettingsError::UnknownKey(key.to_owned())),
        }
        Ok(())
    }
}

/// Work out where the settings file lives: an explicit path, then
/// [`CONFIG_ENV_VAR`], then the user's configuration directory.
pub fn settings_path(explicit: Option<&Path>) -> Result<PathBuf, SettingsError> {
    if let Some(path) = explicit {
        return Ok(path.to_owned());
    }
    if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("scrapey").join("settings.toml"))
        .ok_or(SettingsError::NoConfigDir)
}
