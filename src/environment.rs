// src/environment.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::app_log;
use crate::rate_limit::RateLimitConfig;

pub const SESSION_SECRET_VAR: &str = "MOLTIN_SESSION_SECRET";
pub const MOLTBOOK_APP_KEY_VAR: &str = "MOLTBOOK_APP_KEY";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoltbookSettings {
    pub base_url: String,
    #[serde(default = "default_moltbook_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub burst: u32,
    pub refill_per_sec: f64,
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        RateLimitConfig {
            burst: settings.burst,
            refill_per_sec: settings.refill_per_sec,
        }
    }
}

/// One environment section of `config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSection {
    pub address: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub session_ttl_hours: i64,
    pub moltbook: MoltbookSettings,
    #[serde(default)]
    pub firebase_project_id: Option<String>,
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    local: EnvironmentSection,
    production: EnvironmentSection,
}

/// Fully resolved runtime configuration: file section plus secrets from the environment.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub address: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub session_ttl_hours: i64,
    pub session_secret: String,
    pub moltbook: MoltbookSettings,
    pub moltbook_app_key: Option<String>,
    pub firebase_project_id: Option<String>,
    pub rate_limit: RateLimitSettings,
    pub log_file: Option<PathBuf>,
}

fn default_moltbook_timeout() -> u64 {
    10
}

impl EnvironmentConfig {
    /// Load `config.yaml` from the working directory for the active environment.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.yaml"))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let environment = Self::get_environment();
        app_log!(info, "Loading configuration for environment: {}", environment);

        if !config_path.exists() {
            anyhow::bail!(
                "{} not found. Server cannot start without configuration.",
                config_path.display()
            );
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let section = Self::parse_section(&content, &environment)?;

        let session_secret = std::env::var(SESSION_SECRET_VAR)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", SESSION_SECRET_VAR))?;
        let moltbook_app_key = std::env::var(MOLTBOOK_APP_KEY_VAR).ok();

        let mut config = Self::from_section(environment, section, session_secret, moltbook_app_key)?;

        if let Ok(port) = std::env::var("MOLTIN_PORT") {
            config.port = port
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("MOLTIN_PORT must be a valid port number"))?;
        }

        Ok(config)
    }

    pub fn from_section(
        environment: String,
        section: EnvironmentSection,
        session_secret: String,
        moltbook_app_key: Option<String>,
    ) -> Result<Self> {
        if session_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!(
                "{} must be at least {} bytes long",
                SESSION_SECRET_VAR,
                MIN_SECRET_LEN
            );
        }
        if section.session_ttl_hours <= 0 {
            anyhow::bail!("session_ttl_hours must be positive");
        }
        if section.rate_limit.burst == 0 {
            anyhow::bail!("rate_limit.burst must be at least 1");
        }

        Ok(Self {
            environment,
            address: section.address,
            port: section.port,
            database_path: Self::resolve_path(&section.database_path)?,
            session_ttl_hours: section.session_ttl_hours,
            session_secret,
            moltbook: section.moltbook,
            moltbook_app_key,
            firebase_project_id: section.firebase_project_id.filter(|id| !id.trim().is_empty()),
            rate_limit: section.rate_limit,
            log_file: match section.log_file {
                Some(path) => Some(Self::resolve_path(&path)?),
                None => None,
            },
        })
    }

    fn get_environment() -> String {
        std::env::var("MOLTIN_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .or_else(|_| std::env::var("ENV"))
            .unwrap_or_else(|_| "local".to_string())
    }

    fn parse_section(content: &str, environment: &str) -> Result<EnvironmentSection> {
        let config_file: ConfigFile =
            serde_yaml::from_str(content).context("Failed to parse config.yaml")?;

        Ok(match environment {
            "production" => config_file.production,
            _ => config_file.local,
        })
    }

    fn resolve_path(path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            let current_dir = std::env::current_dir().context("Failed to get current directory")?;
            Ok(current_dir.join(path))
        }
    }

    /// Ensure the database parent directory exists
    pub async fn ensure_directories(&self) -> Result<()> {
        if let Some(db_parent) = self.database_path.parent() {
            tokio::fs::create_dir_all(db_parent)
                .await
                .with_context(|| {
                    format!(
                        "Failed to create database directory: {}",
                        db_parent.display()
                    )
                })?;
        }

        app_log!(info, "All configured directories ensured to exist");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
local:
  address: 127.0.0.1
  port: 8000
  database_path: data/moltin.db
  session_ttl_hours: 24
  moltbook:
    base_url: https://www.moltbook.com
  rate_limit:
    burst: 30
    refill_per_sec: 2.0
production:
  address: 0.0.0.0
  port: 8080
  database_path: /app/data/moltin.db
  session_ttl_hours: 168
  moltbook:
    base_url: https://www.moltbook.com
    timeout_seconds: 5
  firebase_project_id: moltin-prod
  rate_limit:
    burst: 60
    refill_per_sec: 10.0
  log_file: /var/log/moltin.log
"#;

    fn secret() -> String {
        "s".repeat(40)
    }

    #[test]
    fn test_parse_local_section() {
        let section = EnvironmentConfig::parse_section(SAMPLE, "local").unwrap();
        assert_eq!(section.port, 8000);
        assert_eq!(section.moltbook.timeout_seconds, 10);
        assert!(section.firebase_project_id.is_none());
    }

    #[test]
    fn test_unknown_environment_falls_back_to_local() {
        let section = EnvironmentConfig::parse_section(SAMPLE, "staging").unwrap();
        assert_eq!(section.address, "127.0.0.1");
    }

    #[test]
    fn test_production_section_resolves() {
        let section = EnvironmentConfig::parse_section(SAMPLE, "production").unwrap();
        let config =
            EnvironmentConfig::from_section("production".into(), section, secret(), None).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, PathBuf::from("/app/data/moltin.db"));
        assert_eq!(config.firebase_project_id.as_deref(), Some("moltin-prod"));
        assert_eq!(config.moltbook.timeout_seconds, 5);
    }

    #[test]
    fn test_relative_database_path_is_made_absolute() {
        let section = EnvironmentConfig::parse_section(SAMPLE, "local").unwrap();
        let config =
            EnvironmentConfig::from_section("local".into(), section, secret(), None).unwrap();
        assert!(config.database_path.is_absolute());
        assert!(config.database_path.ends_with("data/moltin.db"));
    }

    #[test]
    fn test_short_secret_rejected() {
        let section = EnvironmentConfig::parse_section(SAMPLE, "local").unwrap();
        let result =
            EnvironmentConfig::from_section("local".into(), section, "short".into(), None);
        assert!(result.is_err());
    }
}
