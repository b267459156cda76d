//! The `settings` subcommand.

use clap::{Args, Subcommand};

use crate::{async_utils::io::write_output, prelude::*, settings::Settings};

use super::load_settings;

/// Settings command line arguments.
#[derive(Debug, Args)]
pub struct SettingsOpts {
    #[clap(subcommand)]
    pub action: SettingsAction,
}

/// What to do with our settings.
#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Print all settings.
    Show,
    /// Print one setting.
    Get {
        /// `ocr_language`, `default_ocr_engine` or `default_output_format`.
        key: String,
    },
    /// Change one setting and save it.
    Set {
        /// `ocr_language`, `default_ocr_engine` or `default_output_format`.
        key: String,
        value: String,
    },
    /// Restore the default settings.
    Reset,
    /// Print the path of the settings file.
    Path,
}

/// The `settings` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_settings(config_path: Option<&Path>, opts: &SettingsOpts) -> Result<()> {
    let (path, mut settings) = load_settings(config_path)?;
    let output = match &opts.action {
        SettingsAction::Show => {
            let mut output = String::new();
            for key in Settings::KEYS {
                output.push_str(&format!("{} = {}\n", key, settings.get(key)?));
            }
            output
        }
        SettingsAction::Get { key } => format!("{}\n", settings.get(key)?),
        SettingsAction::Set { key, value } => {
            settings.set(key, value)?;
            settings.save(&path)?;
            return Ok(());
        }
        SettingsAction::Reset => {
            Settings::default().save(&path)?;
            return Ok(());
        }
        SettingsAction::Path => format!("{}\n", path.display()),
    };
    write_output(None, output.as_bytes()).await
}
