use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

pub const DEFAULT_CHAT_DB_PATH: &str = "database/chat.db";
pub const DEFAULT_SETTINGS_DB_PATH: &str = "database/settings.db";
const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 5;
const DEFAULT_MAX_TURN_CHARS: usize = 4000;

#[derive(Debug, Clone)]
pub struct Config {
    pub chat_db_path: PathBuf,
    pub settings_db_path: PathBuf,
    pub flush_interval: Duration,
    pub max_turn_chars: usize,
    /// Replaces the built-in persona when set.
    pub persona: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from `lookup`. Unset and empty values fall back to
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let chat_db_path = get("WEAGO_CHAT_DB_PATH")
            .unwrap_or_else(|| DEFAULT_CHAT_DB_PATH.into())
            .into();
        let settings_db_path = get("WEAGO_SETTINGS_DB_PATH")
            .unwrap_or_else(|| DEFAULT_SETTINGS_DB_PATH.into())
            .into();

        let flush_secs = match get("WEAGO_FLUSH_INTERVAL_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .with_context(|| format!("WEAGO_FLUSH_INTERVAL_SECS is not a number: {:?}", v))?,
            None => DEFAULT_FLUSH_INTERVAL_SECS,
        };
        if flush_secs == 0 {
            bail!("WEAGO_FLUSH_INTERVAL_SECS must be greater than zero");
        }

        let max_turn_chars = match get("WEAGO_MAX_TURN_CHARS") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("WEAGO_MAX_TURN_CHARS is not a number: {:?}", v))?,
            None => DEFAULT_MAX_TURN_CHARS,
        };

        Ok(Self {
            chat_db_path,
            settings_db_path,
            flush_interval: Duration::from_secs(flush_secs),
            max_turn_chars,
            persona: get("WEAGO_PERSONA"),
        })
    }
}
