//! Init command - write a configuration file with default settings.

use archivefetch::config::{config_file_path, ConfigFile};

use super::common::load_config;
use crate::error::CliError;

/// Run the init command.
///
/// Existing values are preserved; missing keys are filled with defaults.
pub fn run() -> Result<(), CliError> {
    let path = config_file_path();
    let existed = path.exists();

    let config = if existed {
        load_config()?
    } else {
        ConfigFile::default()
    };
    config.save_to(&path)?;

    if existed {
        println!("Updated configuration file: {}", path.display());
    } else {
        println!("Created configuration file: {}", path.display());
    }
    println!();
    println!("Edit this file or use 'archivefetch config set' to customize settings.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}
