//! Structured logging setup.
//!
//! One global `tracing` subscriber, installed by the binary before anything
//! else runs. `RUST_LOG` overrides the configured level when set.

use clap::{Args, ValueEnum};
use garde::Validate;
use scaffold_core::validation::{not_blank, one_of};
use tracing_subscriber::EnvFilter;

/// Levels accepted for `API_LOG_LEVEL`.
pub const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// Deployment environment; selects default log level and error-detail exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Local,
    Production,
}

impl Environment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Local => "local",
            Self::Production => "production",
        }
    }
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

/// Service identity and logging settings.
#[derive(Debug, Clone, Args, Validate)]
pub struct ObservabilityConfig {
    /// Name reported by `/health` and attached to startup logs.
    #[arg(long = "service-name", env = "API_SERVICE_NAME", default_value = "scaffold")]
    #[garde(custom(not_blank))]
    pub service_name: String,

    #[arg(long, env = "API_ENVIRONMENT", value_enum, default_value_t = Environment::Development)]
    #[garde(skip)]
    pub environment: Environment,

    /// Empty selects the environment default.
    #[arg(long = "log-level", env = "API_LOG_LEVEL", default_value = "")]
    #[garde(custom(known_level))]
    pub log_level: String,

    #[arg(long = "log-format", env = "API_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    #[garde(skip)]
    pub log_format: LogFormat,
}

fn known_level(value: &str, _ctx: &()) -> garde::Result {
    if value.is_empty() {
        Ok(())
    } else {
        one_of(value, &LOG_LEVELS)
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "scaffold".to_string(),
            environment: Environment::Development,
            log_level: String::new(),
            log_format: LogFormat::Text,
        }
    }
}

impl ObservabilityConfig {
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Configured level, or `debug` in development and `info` elsewhere.
    #[must_use]
    pub fn effective_level(&self) -> &str {
        match (self.log_level.as_str(), self.environment) {
            ("", Environment::Development) => "debug",
            ("", _) => "info",
            (level, _) => level,
        }
    }
}

/// Installs the global subscriber.
///
/// JSON output is used when `log_format` is `json`; otherwise lines are
/// human-readable with ANSI colours.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.effective_level()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match config.log_format {
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::info!(
        service = %config.service_name,
        environment = config.environment.as_str(),
        level = config.effective_level(),
        "logging initialised"
    );
    Ok(())
}
