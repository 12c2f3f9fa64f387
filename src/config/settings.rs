// src/config/settings.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ingest::types::{FetchQuery, SortOrder};
use crate::translate::LangPair;

pub const ENV_CONFIG_PATH: &str = "NEWSBOT_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/newsbot.toml";
pub const DEFAULT_JSON_PATH: &str = "config/newsbot.json";

fn default_news_endpoint() -> String {
    "https://newsapi.org/v2/everything".to_string()
}
fn default_query() -> String {
    "Bitcoin OR BTC".to_string()
}
fn default_language() -> String {
    "en".to_string()
}
fn default_page_size() -> usize {
    20
}
fn default_on_demand_window() -> usize {
    5
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_translate_endpoint() -> String {
    "https://api.mymemory.translated.net/get".to_string()
}
fn default_true() -> bool {
    true
}
fn default_target_lang() -> String {
    "ru".to_string()
}
fn default_interval_secs() -> u64 {
    15 * 60
}
fn default_initial_delay_secs() -> u64 {
    10
}
fn default_database_url() -> String {
    "sqlite://news.db".to_string()
}
fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}
fn default_poll_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsSettings {
    #[serde(default = "default_news_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub sort: SortOrder,
    /// Candidates per scheduled run.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Candidates per on-demand (`/latest`) run.
    #[serde(default = "default_on_demand_window")]
    pub on_demand_window: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            endpoint: default_news_endpoint(),
            query: default_query(),
            language: default_language(),
            sort: SortOrder::default(),
            page_size: default_page_size(),
            on_demand_window: default_on_demand_window(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl NewsSettings {
    pub fn query(&self, page_size: usize) -> FetchQuery {
        FetchQuery {
            query: self.query.clone(),
            language: self.language.clone(),
            sort: self.sort,
            page_size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranslateSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_translate_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_language")]
    pub source_lang: String,
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
    /// Contact e-mail passed as `de`; raises the provider's free quota.
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranslateSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_translate_endpoint(),
            source_lang: default_language(),
            target_lang: default_target_lang(),
            contact: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TranslateSettings {
    pub fn lang_pair(&self) -> LangPair {
        LangPair::new(self.source_lang.clone(), self.target_lang.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleSettings {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            initial_delay_secs: default_initial_delay_secs(),
        }
    }
}

impl ScheduleSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreSettings {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelegramSettings {
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    /// Long-poll timeout for `getUpdates`.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
            send_timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub news: NewsSettings,
    #[serde(default)]
    pub translate: TranslateSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub telegram: TelegramSettings,
}

impl Settings {
    /// Clamp values that would make the bot misbehave instead of refusing to start.
    fn sanitize(mut self) -> Self {
        // NewsAPI caps pageSize at 100.
        self.news.page_size = self.news.page_size.clamp(1, 100);
        self.news.on_demand_window = self.news.on_demand_window.clamp(1, self.news.page_size);
        if self.news.timeout_secs == 0 {
            self.news.timeout_secs = default_timeout_secs();
        }
        if self.translate.timeout_secs == 0 {
            self.translate.timeout_secs = default_timeout_secs();
        }
        if self.schedule.interval_secs < 60 {
            tracing::warn!(
                interval_secs = self.schedule.interval_secs,
                "schedule interval below 60s, raising to 60s"
            );
            self.schedule.interval_secs = 60;
        }
        self
    }
}

/// Load settings from an explicit path. Supports TOML or JSON formats.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_settings(&content, ext.as_str())
        .with_context(|| format!("parsing settings from {}", path.display()))
}

/// Load settings using env var + fallbacks:
/// 1) $NEWSBOT_CONFIG_PATH
/// 2) config/newsbot.toml
/// 3) config/newsbot.json
/// 4) built-in defaults
pub fn load_settings_default() -> Result<Settings> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_settings_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
    if toml_p.exists() {
        return load_settings_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_JSON_PATH);
    if json_p.exists() {
        return load_settings_from(&json_p);
    }
    Ok(Settings::default().sanitize())
}

fn parse_settings(s: &str, hint_ext: &str) -> Result<Settings> {
    let parsed: Settings = if hint_ext == "json" {
        serde_json::from_str(s)?
    } else {
        match toml::from_str(s) {
            Ok(v) => v,
            Err(toml_err) => serde_json::from_str(s).map_err(|_| anyhow!(toml_err))?,
        }
    };
    Ok(parsed.sanitize())
}
