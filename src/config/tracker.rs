use crate::channel::{ChannelConfig, ReconnectPolicy, TokenPlacement};
use crate::error::{Result, TrackerError};
use crate::store::UnknownDocumentPolicy;
use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Represents the overall tracker configuration read from YAML.
/// Every section is optional and falls back to its defaults.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct TrackerConfig {
    pub backend: BackendConfig,
    pub reconnect: ReconnectPolicy,
    pub store: StoreConfig,
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        self.backend.validate()?;
        self.reconnect.validate()?;
        self.store.validate()?;
        Ok(())
    }

    /// Settings for the processing update socket.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            ws_url: self.backend.ws_url.clone(),
            token: self.backend.token.clone(),
            token_placement: self.backend.token_placement,
            token_param: self.backend.token_param.clone(),
            reconnect: self.reconnect.clone(),
            ..ChannelConfig::new(self.backend.ws_url.clone())
        }
    }
}

/// Where the backend lives and how to authenticate against it.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub ws_url: String,
    pub api_url: String,
    pub token: Option<String>,
    pub token_placement: TokenPlacement,
    pub token_param: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8000/ws/processing".to_string(),
            api_url: "http://localhost:8000/api".to_string(),
            token: None,
            token_placement: TokenPlacement::Query,
            token_param: "token".to_string(),
        }
    }
}

impl BackendConfig {
    pub fn validate(&self) -> Result<()> {
        let ws = Url::parse(&self.ws_url).map_err(|e| {
            TrackerError::ConfigValidationError(format!(
                "backend.ws_url '{}' is not a valid URL: {}",
                self.ws_url, e
            ))
        })?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(TrackerError::ConfigValidationError(format!(
                "backend.ws_url must use ws:// or wss://, got '{}'",
                self.ws_url
            )));
        }

        let api = Url::parse(&self.api_url).map_err(|e| {
            TrackerError::ConfigValidationError(format!(
                "backend.api_url '{}' is not a valid URL: {}",
                self.api_url, e
            ))
        })?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(TrackerError::ConfigValidationError(format!(
                "backend.api_url must use http:// or https://, got '{}'",
                self.api_url
            )));
        }

        if self.token_param.trim().is_empty() {
            return Err(TrackerError::ConfigValidationError(
                "backend.token_param must not be empty".to_string(),
            ));
        }
        if matches!(&self.token, Some(token) if token.trim().is_empty()) {
            return Err(TrackerError::ConfigValidationError(
                "backend.token must not be empty when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub unknown_documents: UnknownDocumentPolicy,
    /// Updates buffered between the socket and the store.
    pub update_buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            unknown_documents: UnknownDocumentPolicy::Drop,
            update_buffer: 256,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.update_buffer == 0 {
            return Err(TrackerError::ConfigValidationError(
                "store.update_buffer must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads, parses and validates the tracker configuration YAML file.
pub fn load_tracker_config<P: AsRef<Path>>(config_path: P) -> Result<TrackerConfig> {
    let path_ref = config_path.as_ref();
    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        TrackerError::ConfigError(format!(
            "Failed to read tracker config file '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    let config: TrackerConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        TrackerError::ConfigError(format!(
            "Failed to parse tracker config YAML from '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // Helper to create a temporary config file with given content
    fn create_temp_config_file(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "{}", content).expect("Failed to write to temp file");
        temp_file
    }

    #[test]
    fn test_load_valid_config() {
        let yaml_content = r#"
backend:
  ws_url: wss://docs.example.com/ws/processing
  api_url: https://docs.example.com/api
  token: abc123
  token_placement: header
reconnect:
  initial_delay_ms: 1000
  max_delay_ms: 8000
  multiplier: 1.5
  jitter: 0.1
  max_attempts: 12
store:
  unknown_documents: placeholder
        "#;
        let temp_file = create_temp_config_file(yaml_content);
        let config_result = load_tracker_config(temp_file.path());

        assert!(
            config_result.is_ok(),
            "Should load valid config: {:?}",
            config_result.err()
        );
        let config = config_result.unwrap();
        assert_eq!(config.backend.token.as_deref(), Some("abc123"));
        assert_eq!(config.backend.token_placement, TokenPlacement::Header);
        assert_eq!(config.reconnect.max_attempts, Some(12));
        assert_eq!(config.reconnect.multiplier, 1.5);
        assert_eq!(
            config.store.unknown_documents,
            UnknownDocumentPolicy::Placeholder
        );
        // Not in the file, so defaulted.
        assert_eq!(config.backend.token_param, "token");
        assert_eq!(config.store.update_buffer, 256);
    }

    #[test]
    fn test_empty_sections_fall_back_to_defaults() {
        let temp_file = create_temp_config_file("{}");
        let config = load_tracker_config(temp_file.path()).unwrap();
        assert_eq!(config.backend.ws_url, "ws://localhost:8000/ws/processing");
        assert_eq!(config.reconnect, ReconnectPolicy::default());
        assert_eq!(config.store.unknown_documents, UnknownDocumentPolicy::Drop);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_tracker_config("non_existent_tracker.yaml");
        match result.err().unwrap() {
            TrackerError::ConfigError(msg) => {
                assert!(msg.contains("Failed to read tracker config file"));
                assert!(msg.contains("non_existent_tracker.yaml"));
            }
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_policy_is_a_parse_error() {
        let yaml_content = r#"
store:
  unknown_documents: resurrect
        "#;
        let temp_file = create_temp_config_file(yaml_content);
        match load_tracker_config(temp_file.path()).err().unwrap() {
            TrackerError::ConfigError(msg) => {
                assert!(msg.contains("Failed to parse tracker config YAML"));
            }
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_http_ws_url_fails_validation() {
        let yaml_content = r#"
backend:
  ws_url: http://localhost:8000/ws
        "#;
        let temp_file = create_temp_config_file(yaml_content);
        assert!(matches!(
            load_tracker_config(temp_file.path()),
            Err(TrackerError::ConfigValidationError(_))
        ));
    }

    #[test]
    fn test_zero_update_buffer_fails_validation() {
        let config = TrackerConfig {
            store: StoreConfig {
                update_buffer: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_config_carries_backend_settings() {
        let mut config = TrackerConfig::default();
        config.backend.token = Some("t".to_string());
        config.reconnect = ReconnectPolicy::fixed(std::time::Duration::from_secs(3));
        let channel = config.channel_config();
        assert_eq!(channel.ws_url, config.backend.ws_url);
        assert_eq!(channel.token.as_deref(), Some("t"));
        assert_eq!(channel.reconnect.multiplier, 1.0);
    }
}
