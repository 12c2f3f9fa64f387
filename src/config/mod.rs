// src/config/mod.rs
//! Runtime configuration: tunables from a settings file, credentials from the environment.

pub mod settings;

pub use settings::{load_settings_default, load_settings_from, Settings};

pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
pub const ENV_NEWS_API_KEY: &str = "NEWS_API_KEY";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),
}

/// Credentials. Never logged; `Debug` only reports lengths.
#[derive(Clone)]
pub struct Secrets {
    pub telegram_token: String,
    pub news_api_key: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("telegram_token_len", &self.telegram_token.len())
            .field("news_api_key_len", &self.news_api_key.len())
            .finish()
    }
}

impl Secrets {
    /// Read all required variables, reporting every missing one at once.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token = get(ENV_TELEGRAM_TOKEN);
        let key = get(ENV_NEWS_API_KEY);

        match (token, key) {
            (Some(telegram_token), Some(news_api_key)) => Ok(Self {
                telegram_token,
                news_api_key,
            }),
            (token, key) => {
                let mut missing = Vec::new();
                if token.is_none() {
                    missing.push(ENV_TELEGRAM_TOKEN.to_string());
                }
                if key.is_none() {
                    missing.push(ENV_NEWS_API_KEY.to_string());
                }
                Err(ConfigError::MissingEnv(missing))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(map: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
        move |k| map.get(k).map(|v| v.to_string())
    }

    #[test]
    fn all_missing_are_listed() {
        let err = Secrets::from_lookup(lookup(HashMap::new())).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingEnv(vec![ENV_TELEGRAM_TOKEN.into(), ENV_NEWS_API_KEY.into()])
        );
        assert_eq!(
            err.to_string(),
            "missing required environment variables: TELEGRAM_TOKEN, NEWS_API_KEY"
        );
    }

    #[test]
    fn blank_counts_as_missing() {
        let err = Secrets::from_lookup(lookup(HashMap::from([
            (ENV_TELEGRAM_TOKEN, "123:abc"),
            (ENV_NEWS_API_KEY, "   "),
        ])))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingEnv(vec![ENV_NEWS_API_KEY.into()]));
    }

    #[test]
    fn debug_hides_values() {
        let s = Secrets::from_lookup(lookup(HashMap::from([
            (ENV_TELEGRAM_TOKEN, "123:abc"),
            (ENV_NEWS_API_KEY, "k3y"),
        ])))
        .unwrap();
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("123:abc"));
        assert!(!dbg.contains("k3y"));
    }
}
