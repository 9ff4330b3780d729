//! Top-level configuration: parsed from flags and `API_*` environment
//! variables, then validated before any component is constructed.

use clap::Parser;
use scaffold_core::{ValidationErrors, Validator};

use crate::logging::ObservabilityConfig;
use crate::network::NetworkConfig;
use crate::storage::{DatabaseConfig, StorageBackend};

/// Startup configuration failures. The process must not start on any of them.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not parse configuration: {0}")]
    Parse(#[from] clap::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Fully validated configuration handed to the rest of the server.
#[derive(Debug, Clone, Parser)]
#[command(name = "scaffold-server", version, about = "Scaffold HTTP service")]
pub struct AppConfig {
    #[command(flatten)]
    pub server: NetworkConfig,

    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Repository implementation backing the user API.
    #[arg(long, env = "API_STORAGE", value_enum, default_value_t = StorageBackend::Postgres)]
    pub storage: StorageBackend,

    #[command(flatten)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Parses process arguments and environment, then validates.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed values (including `--help` and
    /// `--version`, which clap reports as errors), [`ConfigError::Invalid`]
    /// listing every field that failed validation.
    pub fn load(validator: &Validator) -> Result<Self, ConfigError> {
        Self::load_from(std::env::args_os(), validator)
    }

    /// Like [`AppConfig::load`] but with explicit arguments.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::load`].
    pub fn load_from<I, T>(args: I, validator: &Validator) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Self::try_parse_from(args)?;
        config.validate(validator)?;
        Ok(config)
    }

    /// Checks every section and reports all failures together.
    ///
    /// Database settings are only required for the `postgres` backend.
    ///
    /// # Errors
    ///
    /// Returns the collected [`ValidationErrors`].
    pub fn validate(&self, validator: &Validator) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.absorb("server", validator.validate(&self.server));
        errors.absorb("observability", validator.validate(&self.observability));
        if self.storage == StorageBackend::Postgres {
            errors.absorb("database", self.database.check(validator));
        }
        errors.into_result()
    }
}
