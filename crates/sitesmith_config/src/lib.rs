pub mod config;

pub use config::{
    default_config_file, Config, ConfigBase, LoadError, MergeError, ValidationError,
};

/// The configuration used by sitesmith itself, without extensions.
pub type SitesmithConfig = ConfigBase<()>;

#[cfg(test)]
mod tests {
    use crate::config::{Config, ConfigBase, LoadError, ValidationError};
    use rstest::rstest;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;
    use url::Url;

    type TestConfig = ConfigBase<()>;

    fn write_config(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_config_default() {
        let config = TestConfig::default();
        assert_eq!(
            config.model.api_url.as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(config.model.model, "gpt-3.5-turbo");
        assert_eq!(config.model.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.gateway.url.as_str(), "https://ipfs.web4.near.page/");
        assert_eq!(
            config.gateway.store_endpoint.as_str(),
            "https://ipfs.web4.near.page/web4/contract/web4gpt.near/fs_store"
        );
        assert_eq!(config.probe.timeout(), Duration::from_millis(2500));
        assert_eq!(config.probe.retries, 3);
        assert_eq!(config.probe.throttle(), Duration::from_millis(25));
        assert_eq!(config.upload.max_batch_items, 7);
        assert_eq!(config.upload.max_batch_bytes, 262_144);
        assert_eq!(config.concurrency.probes, 50);
        assert_eq!(config.concurrency.generations, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            temp_dir.path(),
            "config.toml",
            r#"
            [model]
            model = "gpt-4o-mini"

            [probe]
            retries = 5
            "#,
        );

        let config = TestConfig::load_from_files([&path]).unwrap();
        assert_eq!(config.model.model, "gpt-4o-mini");
        assert_eq!(config.probe.retries, 5);
        // Omitted keys keep their defaults.
        assert_eq!(config.probe.timeout_ms, 2500);
        assert_eq!(config.upload.max_batch_items, 7);
        assert_eq!(config.loaded_from, vec![path]);
    }

    #[test]
    fn test_later_files_take_priority() {
        let temp_dir = TempDir::new().unwrap();
        let system = write_config(
            temp_dir.path(),
            "system.toml",
            r#"
            [gateway]
            url = "https://gateway.example.com"

            [upload]
            max-batch-items = 3
            max-batch-bytes = 1024
            "#,
        );
        let user = write_config(
            temp_dir.path(),
            "user.toml",
            r#"
            [upload]
            max-batch-items = 5

            [concurrency]
            generations = 2
            "#,
        );

        let config = TestConfig::load_from_files([&system, &user]).unwrap();
        assert_eq!(
            config.gateway.url,
            Url::parse("https://gateway.example.com").unwrap()
        );
        assert_eq!(config.upload.max_batch_items, 5);
        assert_eq!(config.upload.max_batch_bytes, 1024);
        assert_eq!(config.concurrency.generations, 2);
        assert_eq!(config.concurrency.probes, 50);
        assert_eq!(config.loaded_from, vec![system, user]);
    }

    #[rstest]
    #[case::zero_retries("[probe]\nretries = 0", "probe.retries")]
    #[case::zero_timeout("[probe]\ntimeout-ms = 0", "probe.timeout-ms")]
    #[case::zero_items("[upload]\nmax-batch-items = 0", "upload.max-batch-items")]
    #[case::zero_bytes("[upload]\nmax-batch-bytes = 0", "upload.max-batch-bytes")]
    #[case::zero_probes("[concurrency]\nprobes = 0", "concurrency.probes")]
    #[case::zero_generations("[concurrency]\ngenerations = 0", "concurrency.generations")]
    #[case::not_http("[gateway]\nurl = \"ftp://example.com\"", "gateway.url")]
    #[case::store_not_http(
        "[gateway]\nstore-endpoint = \"file:///tmp/store\"",
        "gateway.store-endpoint"
    )]
    fn test_validation_rejects(#[case] content: &str, #[case] field: &str) {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(temp_dir.path(), "config.toml", content);

        let err = TestConfig::load_from_files([&path]).unwrap_err();
        match err {
            LoadError::ValidationError(ValidationError::InvalidValue(name, _)) => {
                assert_eq!(name, field);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_url_is_a_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_config(
            temp_dir.path(),
            "config.toml",
            "[gateway]\nurl = \"not a url\"",
        );
        assert!(matches!(
            TestConfig::load_from_files([&path]),
            Err(LoadError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            TestConfig::load_from_files([temp_dir.path().join("missing.toml")]),
            Err(LoadError::IoError(_))
        ));
    }

    #[test]
    fn test_empty_model_name() {
        let mut config = TestConfig::default();
        config.model.model = String::from("  ");
        insta::assert_snapshot!(
            config.validate().unwrap_err(),
            @"Missing required field: model.model"
        );
    }

    #[test]
    fn test_config_keys_listing() {
        let keys = TestConfig::default().keys();
        assert_eq!(
            keys,
            vec![
                "model.api-url",
                "model.model",
                "model.api-key-env",
                "model.system-prompt",
                "model.summary-directive",
                "gateway.url",
                "gateway.store-endpoint",
                "probe.timeout-ms",
                "probe.retries",
                "probe.throttle-ms",
                "upload.max-batch-items",
                "upload.max-batch-bytes",
                "concurrency.probes",
                "concurrency.generations",
            ]
        );
    }
}
