use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use regex::Regex;
use thiserror::Error;

use crate::application::deadline::parse_time_of_day;
use crate::domain::models::config::{AnalysisProvider, Config};
use crate::domain::models::RunTimezone;

static REPO_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]*/[A-Za-z0-9._-]+$").ok());

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_workers: {0}. Must be between 1 and 16")]
    InvalidMaxWorkers(usize),

    #[error("Invalid repository name: {0:?}. Expected owner/name")]
    InvalidRepository(String),

    #[error("Invalid deadline: {0:?}. Expected HH:MM")]
    InvalidDeadline(String),

    #[error("Invalid timezone: {0:?}. Expected an IANA name such as America/New_York")]
    InvalidTimezone(String),

    #[error("Invalid drain_timeout_secs: must be at least 1")]
    InvalidDrainTimeout,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid pipeline setting: {0}")]
    InvalidPipeline(String),

    #[error("Invalid checker {name:?}: {reason}")]
    InvalidChecker { name: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .nightpatch/config.yaml
    /// 3. .nightpatch/local.yaml (optional local overrides)
    /// 4. Environment variables (NIGHTPATCH_* prefix, `__` separates nesting)
    pub fn load() -> Result<Config> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".nightpatch/config.yaml"))
            .merge(Yaml::file(".nightpatch/local.yaml"));
        Self::finish(figment, "Failed to extract configuration from figment")
    }

    /// Load configuration from a specific file, still honouring environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path));
        Self::finish(figment, &format!("Failed to load config from {}", path.display()))
    }

    fn finish(figment: Figment, context: &str) -> Result<Config> {
        let mut config: Config = figment
            .merge(Env::prefixed("NIGHTPATCH_").split("__"))
            .extract()
            .context(context.to_string())?;

        if config.github.token.is_none() {
            config.github.token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        }

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.max_workers == 0 || config.max_workers > 16 {
            return Err(ConfigError::InvalidMaxWorkers(config.max_workers));
        }

        for repo in &config.repos {
            let valid = REPO_NAME.as_ref().is_some_and(|re| re.is_match(repo));
            if !valid || repo.contains("..") {
                return Err(ConfigError::InvalidRepository(repo.clone()));
            }
        }

        if let Some(deadline) = &config.deadline {
            if parse_time_of_day(deadline).is_err() {
                return Err(ConfigError::InvalidDeadline(deadline.clone()));
            }
        }

        if let Some(timezone) = &config.timezone {
            if timezone.parse::<RunTimezone>().is_err() {
                return Err(ConfigError::InvalidTimezone(timezone.clone()));
            }
        }
        if config.drain_timeout_secs == 0 {
            return Err(ConfigError::InvalidDrainTimeout);
        }

        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        let pipeline = &config.pipeline;
        if pipeline.max_line_delta == 0 {
            return Err(ConfigError::InvalidPipeline(
                "max_line_delta must be at least 1".to_string(),
            ));
        }
        if pipeline.max_growth_factor.is_nan() || pipeline.max_growth_factor < 1.0 {
            return Err(ConfigError::InvalidPipeline(format!(
                "max_growth_factor must be at least 1.0, got {}",
                pipeline.max_growth_factor
            )));
        }
        if pipeline.run_tests && pipeline.test_command.is_empty() {
            return Err(ConfigError::InvalidPipeline(
                "run_tests is enabled but test_command is empty".to_string(),
            ));
        }
        if pipeline.test_timeout_secs == 0 {
            return Err(ConfigError::InvalidPipeline(
                "test_timeout_secs must be at least 1".to_string(),
            ));
        }

        for checker in &pipeline.checkers {
            let invalid = |reason: &str| ConfigError::InvalidChecker {
                name: checker.name.clone(),
                reason: reason.to_string(),
            };
            if checker.program.trim().is_empty() {
                return Err(invalid("program cannot be empty"));
            }
            if checker.extensions.is_empty() {
                return Err(invalid("at least one extension is required"));
            }
            if checker.extensions.iter().any(|ext| !ext.starts_with('.')) {
                return Err(invalid("extensions must start with '.'"));
            }
            if checker.timeout_secs == 0 {
                return Err(invalid("timeout_secs must be at least 1"));
            }
            if let Some(pattern) = &checker.invalid_pattern {
                if let Err(e) = Regex::new(pattern) {
                    return Err(invalid(&format!("invalid_pattern does not compile: {e}")));
                }
            }
        }

        if config.git.author_name.is_some() != config.git.author_email.is_some() {
            return Err(ConfigError::ValidationFailed(
                "git.author_name and git.author_email must be set together".to_string(),
            ));
        }
        if !config.git.clone_url_template.contains("{repo}") {
            return Err(ConfigError::ValidationFailed(
                "git.clone_url_template must contain {repo}".to_string(),
            ));
        }

        if config.github.requests_per_hour == 0 {
            return Err(ConfigError::ValidationFailed(
                "github.requests_per_hour must be at least 1".to_string(),
            ));
        }
        if config.github.managed_label.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "github.managed_label cannot be empty".to_string(),
            ));
        }

        if config.analysis.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "analysis.max_attempts must be at least 1".to_string(),
            ));
        }
        if config.analysis.provider == AnalysisProvider::Azure {
            if config.analysis.api_key.as_deref().unwrap_or_default().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "analysis.api_key is required for the azure provider".to_string(),
                ));
            }
            if config.analysis.api_version.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "analysis.api_version cannot be empty for the azure provider".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::{CheckerConfig, UnavailablePolicy};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.drain_timeout_secs, 60);
        assert_eq!(config.database.path, ".nightpatch/nightpatch.db");
        assert_eq!(config.pipeline.max_line_delta, 200);
        assert_eq!(config.pipeline.checkers.len(), 3);
        assert_eq!(config.max_clone_disk_mb, 5_000);
        assert!(config.timezone.is_none());
        assert_eq!(config.analysis.provider, AnalysisProvider::OpenaiCompatible);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
repos:
  - acme/api
  - acme/web.app
max_workers: 4
deadline: '06:30'
timezone: Asia/Tokyo
max_clone_disk_mb: 0
analysis:
  provider: azure
  endpoint: https://acme.openai.azure.com/
  api_key: azure-key
  deployment: gpt-4o
pipeline:
  run_tests: true
  test_command: [pytest, -q]
logging:
  level: debug
  format: json
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(config.repos, vec!["acme/api", "acme/web.app"]);
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.deadline.as_deref(), Some("06:30"));
        assert_eq!(config.timezone.as_deref(), Some("Asia/Tokyo"));
        assert_eq!(config.max_clone_disk_mb, 0);
        assert_eq!(config.analysis.provider, AnalysisProvider::Azure);
        assert_eq!(config.analysis.deployment.as_deref(), Some("gpt-4o"));
        assert_eq!(config.analysis.api_version, "2024-02-15-preview");
        assert_eq!(config.pipeline.test_command, vec!["pytest", "-q"]);
        assert_eq!(config.pipeline.max_line_delta, 200);
        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_worker_bounds() {
        for workers in [0, 17] {
            let config = Config {
                max_workers: workers,
                ..Default::default()
            };
            assert!(matches!(
                ConfigLoader::validate(&config),
                Err(ConfigError::InvalidMaxWorkers(w)) if w == workers
            ));
        }
    }

    #[test]
    fn test_validate_repository_names() {
        for bad in ["acme", "acme/", "/api", "acme/api/extra", "acme/../etc", "ac me/api"] {
            let config = Config {
                repos: vec![bad.to_string()],
                ..Default::default()
            };
            assert!(
                matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidRepository(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_deadline() {
        let config = Config {
            deadline: Some("7am".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidDeadline(_))
        ));
    }

    #[test]
    fn test_validate_timezone() {
        let config = Config {
            timezone: Some("Europe/Atlantis".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTimezone(_))
        ));

        let config = Config {
            timezone: Some("America/New_York".to_string()),
            ..Default::default()
        };
        ConfigLoader::validate(&config).unwrap();
    }

    #[test]
    fn test_validate_azure_requires_key() {
        let mut config = Config::default();
        config.analysis.provider = AnalysisProvider::Azure;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(msg)) if msg.contains("api_key")
        ));

        config.analysis.api_key = Some("azure-key".to_string());
        ConfigLoader::validate(&config).unwrap();
    }

    #[test]
    fn test_validate_pipeline() {
        let mut config = Config::default();
        config.pipeline.run_tests = true;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPipeline(_))
        ));

        let mut config = Config::default();
        config.pipeline.max_growth_factor = 0.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPipeline(_))
        ));
    }

    #[test]
    fn test_validate_checker() {
        let mut config = Config::default();
        config.pipeline.checkers.push(CheckerConfig {
            name: "ruby".to_string(),
            extensions: vec!["rb".to_string()],
            program: "ruby".to_string(),
            args: vec!["-c".to_string()],
            on_unavailable: UnavailablePolicy::FailOpen,
            invalid_pattern: None,
            timeout_secs: 10,
        });
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidChecker { name, .. }) if name == "ruby"
        ));
    }

    #[test]
    fn test_validate_commit_identity() {
        let mut config = Config::default();
        config.git.author_name = Some("Night Patch".to_string());
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let file = yaml_file("repos: [acme/api]\nmax_workers: 2\nlogging:\n  level: info\n  format: json\n");

        temp_env::with_vars(
            [
                ("NIGHTPATCH_MAX_WORKERS", Some("5")),
                ("NIGHTPATCH_LOGGING__LEVEL", Some("debug")),
                ("GITHUB_TOKEN", Some("from-environment")),
            ],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.max_workers, 5, "Environment should win");
                assert_eq!(config.logging.level, "debug");
                assert_eq!(config.logging.format, "json", "File value should persist");
                assert_eq!(config.repos, vec!["acme/api"]);
                assert_eq!(config.github.token.as_deref(), Some("from-environment"));
            },
        );
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let file = yaml_file("max_workers: 40\n");
        temp_env::with_var_unset("NIGHTPATCH_MAX_WORKERS", || {
            let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
            assert!(err.to_string().contains("max_workers"));
        });
    }

    #[test]
    fn test_load_from_missing_file() {
        assert!(ConfigLoader::load_from_file("/nonexistent/nightpatch.yaml").is_err());
    }

    #[test]
    fn test_hierarchical_merging() {
        let base = yaml_file("max_workers: 2\nlogging:\n  level: info\n  format: json\n");
        let local = yaml_file("max_workers: 6\nlogging:\n  level: warn\n");

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base.path()))
            .merge(Yaml::file(local.path()))
            .extract()
            .unwrap();

        assert_eq!(config.max_workers, 6, "Override should win");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, "json", "Base value should persist");
    }
}
