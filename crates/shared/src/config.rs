use std::env;

use crate::error::{BotError, Result};

pub const DEFAULT_MODEL: &str = "sonar-pro";
pub const DEFAULT_CONTENT_API_URL: &str = "https://api.perplexity.ai/chat/completions";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

const REQUIRED_VARS: [&str; 3] = ["PERPLEXITY_API_KEY", "TELEGRAM_BOT_TOKEN", "TELEGRAM_CHAT_ID"];

#[derive(Debug, Clone)]
pub struct Config {
    pub perplexity_api_key: String,
    pub perplexity_model: String,
    pub perplexity_api_url: String,
    pub telegram_bot_token: String,
    pub telegram_api_url: String,
    pub destinations: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Validates the configuration against an arbitrary key lookup.
    ///
    /// Blank values count as missing. Every missing required variable is
    /// named in the one error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let destinations: Vec<String> = value("TELEGRAM_CHAT_ID")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| match *key {
                "TELEGRAM_CHAT_ID" => destinations.is_empty(),
                other => value(other).is_none(),
            })
            .collect();

        if !missing.is_empty() {
            return Err(BotError::Configuration(format!(
                "missing {}.\n\n\
                To fix this, create ~/.config/crypto-news-bot/.env with:\n  \
                PERPLEXITY_API_KEY=your_key_here\n  \
                TELEGRAM_BOT_TOKEN=your_bot_token_here\n  \
                TELEGRAM_CHAT_ID=@your_channel,-100123456789",
                missing.join(", ")
            )));
        }

        Ok(Self {
            perplexity_api_key: value("PERPLEXITY_API_KEY").unwrap_or_default(),
            perplexity_model: value("PERPLEXITY_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            perplexity_api_url: value("PERPLEXITY_API_URL")
                .unwrap_or_else(|| DEFAULT_CONTENT_API_URL.to_string()),
            telegram_bot_token: value("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            telegram_api_url: value("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            destinations,
        })
    }

    fn try_load_dotenv() {
        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/crypto-news-bot/.env
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("crypto-news-bot").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // Nothing found is fine when the scheduler injects the variables directly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_all_required_values_present() {
        let config = Config::from_lookup(lookup_from(&[
            ("PERPLEXITY_API_KEY", "pplx-key"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "@cryptochannel"),
        ]))
        .unwrap();

        assert_eq!(config.perplexity_api_key, "pplx-key");
        assert_eq!(config.telegram_bot_token, "123:abc");
        assert_eq!(config.destinations, vec!["@cryptochannel"]);
        assert_eq!(config.perplexity_model, DEFAULT_MODEL);
        assert_eq!(config.telegram_api_url, DEFAULT_TELEGRAM_API_URL);
    }

    #[test]
    fn test_multiple_destinations_are_split_and_trimmed() {
        let config = Config::from_lookup(lookup_from(&[
            ("PERPLEXITY_API_KEY", "k"),
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TELEGRAM_CHAT_ID", " @one , -100200300 ,, "),
        ]))
        .unwrap();

        assert_eq!(config.destinations, vec!["@one", "-100200300"]);
    }

    #[test]
    fn test_missing_values_are_reported_together() {
        let err = Config::from_lookup(lookup_from(&[("TELEGRAM_BOT_TOKEN", "t")])).unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, BotError::Configuration(_)));
        assert!(message.contains("PERPLEXITY_API_KEY"));
        assert!(message.contains("TELEGRAM_CHAT_ID"));
        assert!(!message.contains("missing TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let err = Config::from_lookup(lookup_from(&[
            ("PERPLEXITY_API_KEY", "   "),
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TELEGRAM_CHAT_ID", " , "),
        ]))
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("PERPLEXITY_API_KEY"));
        assert!(message.contains("TELEGRAM_CHAT_ID"));
    }

    #[test]
    fn test_optional_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("PERPLEXITY_API_KEY", "k"),
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TELEGRAM_CHAT_ID", "1"),
            ("PERPLEXITY_MODEL", "sonar"),
            ("TELEGRAM_API_URL", "http://localhost:8081"),
        ]))
        .unwrap();

        assert_eq!(config.perplexity_model, "sonar");
        assert_eq!(config.telegram_api_url, "http://localhost:8081");
    }
}
