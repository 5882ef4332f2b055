#[cfg(test)]
mod args_tests {
    use std::io::Write;
    use std::path::PathBuf;

    use clap::Parser;
    use tempfile::NamedTempFile;
    use DocPulse::channel::TokenPlacement;
    use DocPulse::config::cli::Args;
    use DocPulse::error::TrackerError;
    use DocPulse::store::UnknownDocumentPolicy;

    fn create_temp_config_file(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "{}", content).expect("Failed to write to temp file");
        temp_file
    }

    #[test]
    fn test_parse_all_args() {
        let args = Args::parse_from([
            "watcher",
            "-c",
            "config/tracker.yaml",
            "--ws-url",
            "wss://docs.example.com/ws/processing",
            "--api-url",
            "https://docs.example.com/api",
            "--token",
            "abc123",
            "-u",
            "a.pdf",
            "b.docx",
            "--exit-when-idle",
            "--metrics-port",
            "9090",
            "--log-file",
            "logs/watcher.log",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("config/tracker.yaml")));
        assert_eq!(
            args.ws_url.as_deref(),
            Some("wss://docs.example.com/ws/processing")
        );
        assert_eq!(args.api_url.as_deref(), Some("https://docs.example.com/api"));
        assert_eq!(args.token.as_deref(), Some("abc123"));
        assert_eq!(
            args.upload,
            vec![PathBuf::from("a.pdf"), PathBuf::from("b.docx")]
        );
        assert!(args.exit_when_idle);
        assert_eq!(args.metrics_port, Some(9090));
        assert_eq!(args.log_file, Some(PathBuf::from("logs/watcher.log")));
        assert!(!args.validate_config);
    }

    #[test]
    fn test_defaults_without_config_file() {
        let args = Args::parse_from(["watcher", "--token", "t"]);
        assert!(args.config.is_none());
        assert!(args.upload.is_empty());
        assert!(!args.exit_when_idle);

        let config = args.resolve_config().unwrap();
        assert_eq!(config.backend.ws_url, "ws://localhost:8000/ws/processing");
        assert_eq!(config.backend.token_placement, TokenPlacement::Query);
        assert_eq!(config.store.unknown_documents, UnknownDocumentPolicy::Drop);
        assert_eq!(config.reconnect.initial_delay_ms, 3000);
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_file = create_temp_config_file(
            r#"
backend:
  ws_url: ws://from-file:8000/ws/processing
  api_url: http://from-file:8000/api
  token: file-token
store:
  unknown_documents: placeholder
"#,
        );
        let path = temp_file.path().to_str().unwrap().to_string();
        let args = Args::parse_from([
            "watcher",
            "--config",
            path.as_str(),
            "--ws-url",
            "wss://from-flag/ws/processing",
            "--token",
            "flag-token",
        ]);

        let config = args.resolve_config().unwrap();
        assert_eq!(config.backend.ws_url, "wss://from-flag/ws/processing");
        assert_eq!(config.backend.api_url, "http://from-file:8000/api");
        assert_eq!(config.backend.token.as_deref(), Some("flag-token"));
        assert_eq!(
            config.store.unknown_documents,
            UnknownDocumentPolicy::Placeholder
        );
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let args = Args::parse_from([
            "watcher",
            "--ws-url",
            "http://not-a-socket/ws",
            "--token",
            "t",
        ]);
        assert!(matches!(
            args.resolve_config(),
            Err(TrackerError::ConfigValidationError(_))
        ));
    }

    #[test]
    fn test_missing_config_file() {
        let args = Args::parse_from(["watcher", "-c", "does/not/exist.yaml", "--token", "t"]);
        match args.resolve_config() {
            Err(TrackerError::ConfigError(msg)) => {
                assert!(msg.contains("Failed to read tracker config file"));
            }
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }
}
