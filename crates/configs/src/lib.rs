//! # configs
//!
//! Layered runtime settings: compiled defaults, then an optional
//! `config/newsroom.toml`, then `NEWSROOM__SECTION__KEY` environment
//! variables. A `.env` file is honoured when present.
//!
//! Secrets are held as [`SecretString`] so they never show up in `Debug`
//! output or logs.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const ENV_PREFIX: &str = "NEWSROOM";
pub const DEFAULT_CONFIG_FILE: &str = "config/newsroom";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn secret_opt<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(SecretString::from))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    /// Resolve clients from `X-Forwarded-For` / `X-Real-IP`. Turn off when
    /// the service is reachable without a proxy that overwrites them.
    pub trust_forwarded_headers: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            request_timeout_secs: 30,
            trust_forwarded_headers: true,
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    #[serde(deserialize_with = "secret_opt")]
    pub url: Option<SecretString>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 50,
            min_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    #[serde(deserialize_with = "secret_opt")]
    pub url: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub reader_rpm: u32,
    pub reader_table_ceiling: usize,
    pub writer_max_posts: i64,
    pub writer_window_secs: i64,
    pub sweep_interval_secs: u64,
    pub retention_secs: i64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            reader_rpm: 100,
            reader_table_ceiling: 10_000,
            writer_max_posts: 1,
            writer_window_secs: 60,
            sweep_interval_secs: 300,
            retention_secs: 3600,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub list_ttl_secs: u64,
    pub story_ttl_secs: u64,
    pub stats_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            list_ttl_secs: 30,
            story_ttl_secs: 120,
            stats_ttl_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoriesSettings {
    pub preview_chars: usize,
    pub default_per_page: i64,
    pub max_per_page: i64,
}

impl Default for StoriesSettings {
    fn default() -> Self {
        Self {
            preview_chars: 500,
            default_per_page: 30,
            max_per_page: 100,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModerationSettings {
    /// JSON lexicon replacing the embedded default.
    pub lexicon_path: Option<PathBuf>,
}

/// One claim-post source. `url` carries `{handle}` and `{id}` placeholders.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SourceSettings {
    pub name: String,
    pub url: String,
    #[serde(default = "default_source_bytes")]
    pub max_bytes: usize,
    #[serde(default)]
    pub json: bool,
}

fn default_source_bytes() -> usize {
    1024 * 1024
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VerificationSettings {
    pub claim_tag: String,
    /// Reject verification when no source confirms the claim post.
    pub require_confirmed_claim: bool,
    pub fetch_timeout_secs: u64,
    pub deadline_secs: u64,
    /// Empty means the built-in source list.
    pub sources: Vec<SourceSettings>,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            claim_tag: "@10_X_eng".into(),
            require_confirmed_claim: false,
            fetch_timeout_secs: 15,
            deadline_secs: 45,
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
    /// Argon2 PHC string of the operator key.
    #[serde(deserialize_with = "secret_opt")]
    pub api_key_hash: Option<SecretString>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// HMAC key for client address hashes.
    #[serde(deserialize_with = "secret_opt")]
    pub ip_hash_key: Option<SecretString>,
}

impl SecuritySettings {
    pub fn ip_hash_key_bytes(&self) -> Vec<u8> {
        self.ip_hash_key
            .as_ref()
            .map(|k| k.expose_secret().as_bytes().to_vec())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub log_format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            filter: "info,newsroom=debug".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
    pub stories: StoriesSettings,
    pub moderation: ModerationSettings,
    pub verification: VerificationSettings,
    pub admin: AdminSettings,
    pub security: SecuritySettings,
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Loads `.env`, the optional config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "ignoring unreadable .env file");
            }
        }

        let config = Config::builder()
            .add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;

        if settings.database.url.is_none() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                settings.database.url = Some(SecretString::from(url));
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from a TOML document over the compiled defaults.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.reader_rpm == 0 {
            return Err(ConfigError::Invalid {
                key: "rate_limit.reader_rpm",
                reason: "must be positive".into(),
            });
        }
        if self.rate_limit.writer_max_posts < 1 || self.rate_limit.writer_window_secs < 1 {
            return Err(ConfigError::Invalid {
                key: "rate_limit.writer_max_posts",
                reason: "writer limit and window must be positive".into(),
            });
        }
        if self.stories.max_per_page < 1
            || !(1..=self.stories.max_per_page).contains(&self.stories.default_per_page)
        {
            return Err(ConfigError::Invalid {
                key: "stories.default_per_page",
                reason: "must lie within 1..=stories.max_per_page".into(),
            });
        }
        if self.verification.claim_tag.trim().is_empty() {
            return Err(ConfigError::Missing("verification.claim_tag"));
        }
        for source in &self.verification.sources {
            if !source.url.contains("{id}") {
                return Err(ConfigError::Invalid {
                    key: "verification.sources",
                    reason: format!("source {} has no {{id}} placeholder", source.name),
                });
            }
        }
        Ok(())
    }

    /// The database URL, which only the server binary requires.
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database
            .url
            .as_ref()
            .map(|u| u.expose_secret())
            .ok_or(ConfigError::Missing("database.url"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}
