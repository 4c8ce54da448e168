use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::{backfill, quota};
use crate::domain::Source;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub sources: SourcesConfig,

    pub omdb: OmdbConfig,

    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    #[serde(default)]
    pub suppress_connection_errors: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/metarr.db".to_string(),
            log_level: "info".to_string(),
            suppress_connection_errors: false,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 6767,
            cors_allowed_origins: vec![
                "http://localhost:6767".to_string(),
                "http://127.0.0.1:6767".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub tvmaze: TvmazeSourceConfig,

    pub tmdb: TmdbSourceConfig,

    pub jikan: JikanSourceConfig,

    pub anidb: AnidbSourceConfig,

    pub anilist: AnilistSourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TvmazeSourceConfig {
    pub enabled: bool,
}

impl Default for TvmazeSourceConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbSourceConfig {
    pub enabled: bool,

    /// Overridden by the TMDB_API_KEY environment variable.
    pub api_key: String,
}

impl Default for TmdbSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
        }
    }
}

impl TmdbSourceConfig {
    #[must_use]
    pub fn resolved_api_key(&self) -> Option<String> {
        non_empty(std::env::var("TMDB_API_KEY").ok())
            .or_else(|| non_empty(Some(self.api_key.clone())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JikanSourceConfig {
    pub enabled: bool,

    /// Pages of the top-anime list swept every run.
    pub top_list_max_pages: u32,

    /// The seasonal backfill walks backward until this year.
    pub seasonal_min_year: i32,

    /// Seasons processed per run before yielding to the next one.
    pub seasons_per_run: u32,
}

impl Default for JikanSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_list_max_pages: 5,
            seasonal_min_year: 1990,
            seasons_per_run: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnidbSourceConfig {
    pub enabled: bool,

    /// Registered AniDB client name. Overridden by ANIDB_CLIENT.
    pub client: String,

    /// Registered client version. Overridden by ANIDB_CLIENTVER.
    pub clientver: String,
}

impl Default for AnidbSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            client: String::new(),
            clientver: "1".to_string(),
        }
    }
}

impl AnidbSourceConfig {
    #[must_use]
    pub fn resolved_client(&self) -> Option<String> {
        non_empty(std::env::var("ANIDB_CLIENT").ok())
            .or_else(|| non_empty(Some(self.client.clone())))
    }

    #[must_use]
    pub fn resolved_clientver(&self) -> String {
        non_empty(std::env::var("ANIDB_CLIENTVER").ok()).unwrap_or_else(|| self.clientver.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnilistSourceConfig {
    pub enabled: bool,
}

impl Default for AnilistSourceConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OmdbConfig {
    /// Overridden by the OMDB_API_KEY environment variable. Enrichment is
    /// disabled entirely when no key resolves.
    pub api_key: String,

    pub daily_limit: u32,

    pub batch_size: usize,

    pub interval_minutes: u64,

    /// Backfill lock duration; a hung run stops blocking ticks after this.
    pub lock_minutes: i64,

    pub startup_delay_secs: u64,
}

impl Default for OmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            daily_limit: quota::OMDB_DAILY_LIMIT,
            batch_size: backfill::DEFAULT_BATCH_SIZE,
            interval_minutes: backfill::DEFAULT_INTERVAL_MINUTES,
            lock_minutes: backfill::LOCK_MINUTES,
            startup_delay_secs: backfill::STARTUP_DELAY_SECS,
        }
    }
}

impl OmdbConfig {
    #[must_use]
    pub fn resolved_api_key(&self) -> Option<String> {
        non_empty(std::env::var("OMDB_API_KEY").ok())
            .or_else(|| non_empty(Some(self.api_key.clone())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    /// Optional cron override for the scheduling tick; hourly interval
    /// mode otherwise.
    pub cron_expression: Option<String>,

    pub tick_interval_minutes: u32,

    /// Designated local hours for the daily full runs, staggered per
    /// source to spread external-API load.
    pub morning_hour_tvmaze: u32,
    pub morning_hour_tmdb: u32,
    pub morning_hour_jikan: u32,
    pub morning_hour_anidb: u32,
    pub morning_hour_anilist: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_expression: None,
            tick_interval_minutes: 60,
            morning_hour_tvmaze: 6,
            morning_hour_tmdb: 7,
            morning_hour_jikan: 8,
            morning_hour_anidb: 9,
            morning_hour_anilist: 10,
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub const fn morning_hour(&self, source: Source) -> u32 {
        match source {
            Source::Tvmaze => self.morning_hour_tvmaze,
            Source::Tmdb => self.morning_hour_tmdb,
            Source::Jikan => self.morning_hour_jikan,
            Source::Anidb => self.morning_hour_anidb,
            Source::Anilist | Source::Manual => self.morning_hour_anilist,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            sources: SourcesConfig::default(),
            omdb: OmdbConfig::default(),
            scheduler: SchedulerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("metarr").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".metarr").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Credential failures are per-source and eager: a misconfigured
    /// source fails here instead of halfway through its first run, and
    /// other sources are unaffected (they simply stay enabled).
    pub fn validate(&self) -> Result<()> {
        if self.sources.tmdb.enabled && self.sources.tmdb.resolved_api_key().is_none() {
            anyhow::bail!(
                "TMDB is enabled but no API key is set (TMDB_API_KEY or [sources.tmdb] api_key)"
            );
        }

        if self.sources.anidb.enabled && self.sources.anidb.resolved_client().is_none() {
            anyhow::bail!(
                "AniDB is enabled but no client string is set (ANIDB_CLIENT or [sources.anidb] client)"
            );
        }

        if self.scheduler.enabled
            && self.scheduler.tick_interval_minutes == 0
            && self.scheduler.cron_expression.is_none()
        {
            anyhow::bail!("Scheduler tick interval must be > 0 or a cron expression must be set");
        }

        if self.omdb.daily_limit == 0 {
            anyhow::bail!("OMDb daily limit must be > 0");
        }

        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scheduler.tick_interval_minutes, 60);
        assert_eq!(config.omdb.daily_limit, 1000);
        assert_eq!(config.server.port, 6767);
        assert!(config.sources.tvmaze.enabled);
        assert!(!config.sources.anidb.enabled);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[sources.tmdb]"));
        assert!(toml_str.contains("[scheduler]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [scheduler]
            morning_hour_tvmaze = 4

            [omdb]
            daily_limit = 500
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.scheduler.morning_hour(Source::Tvmaze), 4);
        assert_eq!(config.omdb.daily_limit, 500);

        assert_eq!(config.server.port, 6767);
    }

    #[test]
    fn validate_rejects_enabled_tmdb_without_key() {
        let mut config = Config::default();
        config.sources.tmdb.enabled = true;
        config.sources.tmdb.api_key = String::new();
        if std::env::var("TMDB_API_KEY").is_err() {
            assert!(config.validate().is_err());
        }
        config.sources.tmdb.enabled = false;
        assert!(config.validate().is_ok());
    }
}
