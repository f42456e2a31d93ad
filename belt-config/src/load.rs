//! Hierarchical configuration loading.
//!
//! Configuration comes from three layered sources: a `base` file, an
//! environment-specific file (`dev`/`prod`), and `BELT_`-prefixed
//! environment-variable overrides with `__` separating nested keys.

use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files relative to the process root.
const CONFIGURATION_DIR: &str = "configuration";

/// Environment variable overriding the configuration directory.
const CONFIG_DIR_ENV_VAR: &str = "BELT_CONFIG_DIR";

/// Supported configuration file extensions, in probe order.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "BELT";

/// Separator for nested keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory")]
    CurrentDir(#[source] io::Error),

    /// The configuration directory does not exist.
    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    /// Could not locate a required configuration file.
    #[error("could not locate `{stem}` configuration in `{directory}`")]
    ConfigurationFileMissing { stem: String, directory: PathBuf },

    /// Failed to determine the runtime environment.
    #[error("failed to determine runtime environment")]
    Environment(#[source] io::Error),

    /// The layered sources could not be combined.
    #[error("failed to build configuration")]
    Build(#[source] config::ConfigError),

    /// The combined configuration did not deserialize into the target type.
    #[error("failed to deserialize configuration")]
    Deserialization(#[source] config::ConfigError),
}

/// Loads configuration from base file, environment file, and environment
/// variables, in increasing precedence.
///
/// The configuration directory is `BELT_CONFIG_DIR` when set, otherwise
/// `<current_dir>/configuration`. Nested keys in environment variables use
/// double underscores, e.g. `BELT_PROGRESS__TOP_N=3`.
pub fn load_config<T: DeserializeOwned>() -> Result<T, LoadConfigError> {
    let configuration_directory = match std::env::var(CONFIG_DIR_ENV_VAR) {
        Ok(directory) => PathBuf::from(directory),
        Err(_) => std::env::current_dir()
            .map_err(LoadConfigError::CurrentDir)?
            .join(CONFIGURATION_DIR),
    };

    if !configuration_directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            configuration_directory,
        ));
    }

    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    let base_file = find_configuration_file(&configuration_directory, "base")?;
    let environment_file =
        find_configuration_file(&configuration_directory, &environment.to_string())?;

    let settings = config::Config::builder()
        .add_source(config::File::from(base_file))
        .add_source(config::File::from(environment_file))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR),
        )
        .build()
        .map_err(LoadConfigError::Build)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn find_configuration_file(directory: &Path, stem: &str) -> Result<PathBuf, LoadConfigError> {
    for extension in CONFIG_FILE_EXTENSIONS {
        let path = directory.join(format!("{stem}.{extension}"));
        if path.is_file() {
            return Ok(path);
        }
    }
    Err(LoadConfigError::ConfigurationFileMissing {
        stem: stem.to_owned(),
        directory: directory.to_path_buf(),
    })
}
