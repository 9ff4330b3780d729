//! Network configuration types for the scaffold server.

use std::time::Duration;

use clap::Args;
use garde::Validate;
use scaffold_core::validation::not_blank;

/// Listener, CORS, and lifecycle settings.
#[derive(Debug, Clone, Args, Validate)]
pub struct NetworkConfig {
    /// Bind address for the server.
    #[arg(long, env = "API_SERVER_HOST", default_value = "0.0.0.0")]
    #[garde(custom(not_blank))]
    pub host: String,

    /// Port to listen on. 0 means OS-assigned.
    #[arg(long, env = "API_SERVER_PORT", default_value_t = 8080)]
    #[garde(skip)]
    pub port: u16,

    /// Allowed CORS origins; `*` allows any origin.
    #[arg(
        long = "cors-allowed-origins",
        env = "API_SERVER_CORS_ALLOWED_ORIGINS",
        value_delimiter = ',',
        required = true
    )]
    #[garde(custom(allowed_origins))]
    pub cors_origins: Vec<String>,

    /// Seconds a request may run before its context deadline passes.
    #[arg(long = "request-timeout", env = "API_SERVER_REQUEST_TIMEOUT", default_value_t = 30)]
    #[garde(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Seconds in-flight requests get to finish after shutdown starts.
    #[arg(long = "shutdown-grace", env = "API_SERVER_SHUTDOWN_GRACE", default_value_t = 30)]
    #[garde(range(min = 1))]
    pub shutdown_grace_secs: u64,
}

/// At least one non-blank entry, each `*` or a valid header value.
fn allowed_origins(origins: &[String], _ctx: &()) -> garde::Result {
    let mut listed = origins.iter().map(|o| o.trim()).filter(|o| !o.is_empty());
    let Some(first) = listed.next() else {
        return Err(garde::Error::new("is required"));
    };
    let valid = |o: &str| o == "*" || o.parse::<http::HeaderValue>().is_ok();
    if valid(first) && listed.all(valid) {
        Ok(())
    } else {
        Err(garde::Error::new("contains an invalid origin"))
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            shutdown_grace_secs: 30,
        }
    }
}

impl NetworkConfig {
    /// `host:port` string handed to the listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use scaffold_core::Validator;

    use super::*;

    #[test]
    fn network_config_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 0);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.shutdown_grace(), Duration::from_secs(30));
    }

    #[test]
    fn bind_address_joins_host_and_port() {
        let config = NetworkConfig {
            host: "127.0.0.1".to_string(),
            port: 9000,
            ..NetworkConfig::default()
        };
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
    }

    #[test]
    fn defaults_validate() {
        let v = Validator::new();
        assert!(v.validate(&NetworkConfig::default()).is_ok());
    }

    #[test]
    fn blank_origins_and_zero_timeouts_rejected() {
        let v = Validator::new();
        let config = NetworkConfig {
            cors_origins: vec![" ".to_string()],
            request_timeout_secs: 0,
            shutdown_grace_secs: 0,
            ..NetworkConfig::default()
        };
        let err = v.validate(&config).unwrap_err();
        assert_eq!(err.get("cors_origins"), Some("is required"));
        assert!(err.get("request_timeout_secs").is_some());
        assert!(err.get("shutdown_grace_secs").is_some());
    }

    #[test]
    fn malformed_origin_rejected() {
        let v = Validator::new();
        let config = NetworkConfig {
            cors_origins: vec!["https://ok.example".to_string(), "bad\norigin".to_string()],
            ..NetworkConfig::default()
        };
        let err = v.validate(&config).unwrap_err();
        assert_eq!(err.get("cors_origins"), Some("contains an invalid origin"));
    }
}
