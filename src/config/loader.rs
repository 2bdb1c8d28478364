//! Options loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::Options;
use crate::config::validation::{validate_options, ValidationError};

/// Error type for options loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Read options from a TOML file without validating them.
///
/// The binary still layers command-line flags on top, so validation
/// happens once the final options are known.
pub fn read_options(path: &Path) -> Result<Options, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load and validate options from a TOML file.
pub fn load_options(path: &Path) -> Result<Options, ConfigError> {
    let options = read_options(path)?;
    validate_options(&options)?;
    Ok(options)
}
