use std::time::Duration;

use modstudio_client::{HttpModuleClient, ServiceError};

/// Default base URL of the module-content service.
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:4000/api/v1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a valid {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Studio configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Base URL of the module-content service.
    pub service_url: String,
    /// Bearer token. `None` leaves the studio unable to save.
    pub service_token: Option<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Quiescence window for text edits in milliseconds (default: `500`).
    pub edit_debounce_ms: u64,
}

impl StudioConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                         |
    /// |------------------------|---------------------------------|
    /// | `MODULE_SERVICE_URL`   | `http://localhost:4000/api/v1`  |
    /// | `MODULE_SERVICE_TOKEN` | unset                           |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                            |
    /// | `EDIT_DEBOUNCE_MS`     | `500`                           |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let service_url = lookup("MODULE_SERVICE_URL").unwrap_or_else(|| DEFAULT_SERVICE_URL.into());

        let service_token = lookup("MODULE_SERVICE_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let request_timeout_secs = parse_u64(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;
        let edit_debounce_ms = parse_u64(&lookup, "EDIT_DEBOUNCE_MS", 500)?;

        Ok(Self {
            service_url,
            service_token,
            request_timeout_secs,
            edit_debounce_ms,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn edit_debounce(&self) -> Duration {
        Duration::from_millis(self.edit_debounce_ms)
    }

    /// HTTP client for the configured service, with the request timeout applied.
    pub fn http_client(&self) -> Result<HttpModuleClient, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout())
            .build()?;
        Ok(HttpModuleClient::with_client(
            client,
            self.service_url.clone(),
            self.service_token.clone(),
        ))
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            expected: "u64",
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StudioConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StudioConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.service_url, DEFAULT_SERVICE_URL);
        assert!(config.service_token.is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.edit_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            ("MODULE_SERVICE_URL", "https://studio.example/api/v1"),
            ("MODULE_SERVICE_TOKEN", " tok "),
            ("EDIT_DEBOUNCE_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.service_url, "https://studio.example/api/v1");
        assert_eq!(config.service_token.as_deref(), Some("tok"));
        assert_eq!(config.edit_debounce_ms, 250);
    }

    #[test]
    fn blank_token_counts_as_unset() {
        let config = load(&[("MODULE_SERVICE_TOKEN", "  ")]).unwrap();
        assert!(config.service_token.is_none());
    }

    #[test]
    fn invalid_number_is_an_error() {
        let err = load(&[("REQUEST_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert_matches!(
            &err,
            ConfigError::Invalid { var: "REQUEST_TIMEOUT_SECS", .. }
        );
        assert!(err.to_string().contains("soon"));
    }
}
