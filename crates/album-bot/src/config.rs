//! Environment configuration for the bot binary.

use std::env;
use std::time::Duration;

use album_core::CoreConfig;
use telegram_client::{BotConfig, ChatRef, DEFAULT_API_URL};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Bot configuration, loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    pub api_url: String,
    /// Group albums are published into.
    pub group_id: i64,
    /// Users allowed to upload and run admin commands.
    pub admins: Vec<i64>,
    /// Chat that receives a forwarded copy of every upload.
    pub archive_chat: Option<ChatRef>,
    /// SQLite connection URL.
    pub sqlite_url: String,
    pub debounce: Duration,
    pub inter_post_delay: Duration,
    pub min_delete_after: Duration,
    pub default_delete_after: Duration,
    pub settings_cache_ttl: Duration,
    pub sweep_interval: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("group_id", &self.group_id)
            .field("admins", &self.admins)
            .field("archive_chat", &self.archive_chat)
            .field("sqlite_url", &self.sqlite_url)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `BOT_TOKEN`
    /// - `GROUP_ID`
    ///
    /// Optional env vars:
    /// - `ADMINS` (comma-separated user ids)
    /// - `DB_CHANNEL_ID` (archive chat id or @username)
    /// - `SQLITE_PATH` (default: ./data/albums.db)
    /// - `TELEGRAM_API_URL`
    /// - `ALBUM_DEBOUNCE_MS`, `ALBUM_INTER_POST_DELAY_MS`
    /// - `ALBUM_MIN_DELETE_SECS`, `ALBUM_DEFAULT_DELETE_SECS`
    /// - `ALBUM_SETTINGS_CACHE_SECS`, `ALBUM_SWEEP_INTERVAL_SECS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bot_token = var("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let group_raw = var("GROUP_ID").ok_or(ConfigError::Missing("GROUP_ID"))?;
        let group_id = group_raw.parse::<i64>().map_err(|_| ConfigError::Invalid {
            name: "GROUP_ID",
            value: group_raw.clone(),
        })?;

        let admins = match var("ADMINS") {
            Some(raw) => parse_admins(&raw)?,
            None => Vec::new(),
        };

        let archive_chat = var("DB_CHANNEL_ID")
            .filter(|raw| raw != "0")
            .map(|raw| ChatRef::parse(&raw));

        let sqlite_path = var("SQLITE_PATH").unwrap_or_else(|| "./data/albums.db".to_string());

        Ok(Self {
            bot_token,
            api_url: var("TELEGRAM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            group_id,
            admins,
            archive_chat,
            sqlite_url: sqlite_url_from_path(&sqlite_path),
            debounce: Duration::from_millis(number(&var, "ALBUM_DEBOUNCE_MS", 1000)?),
            inter_post_delay: Duration::from_millis(number(
                &var,
                "ALBUM_INTER_POST_DELAY_MS",
                1000,
            )?),
            min_delete_after: Duration::from_secs(number(&var, "ALBUM_MIN_DELETE_SECS", 5)?),
            default_delete_after: Duration::from_secs(number(
                &var,
                "ALBUM_DEFAULT_DELETE_SECS",
                300,
            )?),
            settings_cache_ttl: Duration::from_secs(number(&var, "ALBUM_SETTINGS_CACHE_SECS", 5)?),
            sweep_interval: Duration::from_secs(number(&var, "ALBUM_SWEEP_INTERVAL_SECS", 60)?),
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    pub fn bot_config(&self) -> BotConfig {
        BotConfig::with_api_url(&self.bot_token, &self.api_url)
    }

    pub fn core_config(&self) -> CoreConfig {
        CoreConfig::new(self.group_id)
            .with_debounce(self.debounce)
            .with_inter_post_delay(self.inter_post_delay)
            .with_min_delete_after(self.min_delete_after)
            .with_default_delete_after(self.default_delete_after)
            .with_settings_cache_ttl(self.settings_cache_ttl)
            .with_sweep_interval(self.sweep_interval.max(Duration::from_secs(1)))
    }
}

fn parse_admins(raw: &str) -> Result<Vec<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|_| ConfigError::Invalid {
                name: "ADMINS",
                value: part.to_string(),
            })
        })
        .collect()
}

fn number<V>(var: &V, name: &'static str, default: u64) -> Result<u64, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

/// Turn a filesystem path into a sqlite URL; URLs pass through unchanged.
pub fn sqlite_url_from_path(path: &str) -> String {
    if path.starts_with("sqlite:") {
        path.to_string()
    } else {
        format!("sqlite:{}?mode=rwc", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load(&[("BOT_TOKEN", "123:abc"), ("GROUP_ID", "-1001")]).unwrap();
        assert_eq!(config.group_id, -1001);
        assert!(config.admins.is_empty());
        assert_eq!(config.archive_chat, None);
        assert_eq!(config.sqlite_url, "sqlite:./data/albums.db?mode=rwc");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.debounce, Duration::from_millis(1000));
        assert_eq!(config.default_delete_after, Duration::from_secs(300));
        assert_eq!(config.min_delete_after, Duration::from_secs(5));
    }

    #[test]
    fn test_full_config() {
        let config = load(&[
            ("BOT_TOKEN", "123:abc"),
            ("GROUP_ID", "-1001"),
            ("ADMINS", "11, 22,,33"),
            ("DB_CHANNEL_ID", "-1002"),
            ("SQLITE_PATH", "sqlite::memory:"),
            ("ALBUM_DEBOUNCE_MS", "2500"),
            ("ALBUM_MIN_DELETE_SECS", "10"),
        ])
        .unwrap();
        assert_eq!(config.admins, vec![11, 22, 33]);
        assert!(config.is_admin(22));
        assert!(!config.is_admin(44));
        assert_eq!(config.archive_chat, Some(ChatRef::Id(-1002)));
        assert_eq!(config.sqlite_url, "sqlite::memory:");

        let core = config.core_config();
        assert_eq!(core.destination, -1001);
        assert_eq!(core.debounce, Duration::from_millis(2500));
        assert_eq!(core.min_delete_after, Duration::from_secs(10));
    }

    #[test]
    fn test_missing_and_invalid_values() {
        assert!(matches!(
            load(&[("GROUP_ID", "-1")]),
            Err(ConfigError::Missing("BOT_TOKEN"))
        ));
        assert!(matches!(
            load(&[("BOT_TOKEN", "t")]),
            Err(ConfigError::Missing("GROUP_ID"))
        ));
        assert!(matches!(
            load(&[("BOT_TOKEN", "t"), ("GROUP_ID", "group")]),
            Err(ConfigError::Invalid { name: "GROUP_ID", .. })
        ));
        assert!(matches!(
            load(&[("BOT_TOKEN", "t"), ("GROUP_ID", "-1"), ("ADMINS", "1,x")]),
            Err(ConfigError::Invalid { name: "ADMINS", .. })
        ));
        assert!(matches!(
            load(&[("BOT_TOKEN", "t"), ("GROUP_ID", "-1"), ("ALBUM_DEBOUNCE_MS", "-5")]),
            Err(ConfigError::Invalid { name: "ALBUM_DEBOUNCE_MS", .. })
        ));
    }

    #[test]
    fn test_archive_channel_username() {
        let config = load(&[
            ("BOT_TOKEN", "t"),
            ("GROUP_ID", "-1"),
            ("DB_CHANNEL_ID", "archive_chan"),
        ])
        .unwrap();
        assert_eq!(
            config.archive_chat,
            Some(ChatRef::Username("@archive_chan".to_string()))
        );
    }
}
