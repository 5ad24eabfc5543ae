use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Top-level agent configuration, loaded from warden.toml.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct BotConfig {
    pub bot: BotSection,
    pub api: ApiSection,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct BotSection {
    /// Platform bot token.
    pub token: String,
    /// Account ids treated as bot owners in every guild.
    pub owner_ids: Vec<String>,
}

#[derive(Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "https://discord.com/api/v10".into(),
            request_timeout_secs: 30,
        }
    }
}

impl BotConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> Self {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .unwrap_or_else(|e| panic!("failed to read config file {}: {}", path, e));
            toml::from_str(&contents)
                .unwrap_or_else(|e| panic!("failed to parse config file {}: {}", path, e))
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BOT_TOKEN") {
            self.bot.token = v;
        }
        if let Ok(v) = std::env::var("BOT_OWNER_IDS") {
            self.bot.owner_ids = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = std::env::var("API_BASE_URL") {
            self.api.base_url = v;
        }
        if let Ok(v) = std::env::var("API_REQUEST_TIMEOUT_SECS")
            && let Ok(secs) = v.parse()
        {
            self.api.request_timeout_secs = secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert!(config.bot.token.is_empty());
        assert!(config.bot.owner_ids.is_empty());
        assert_eq!(config.api.request_timeout_secs, 30);
        assert!(config.api.base_url.starts_with("https://"));
    }

    #[test]
    fn test_parse_toml() {
        let config: BotConfig = toml::from_str(
            r#"
            [bot]
            token = "abc123"
            owner_ids = ["100", "200"]

            [api]
            request_timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.bot.token, "abc123");
        assert_eq!(config.bot.owner_ids, vec!["100", "200"]);
        assert_eq!(config.api.request_timeout_secs, 5);
        // Unspecified values fall back to section defaults.
        assert!(config.api.base_url.starts_with("https://"));
    }

    #[test]
    fn test_partial_sections() {
        let config: BotConfig = toml::from_str("[bot]\ntoken = \"t\"\n").unwrap();
        assert_eq!(config.bot.token, "t");
        assert_eq!(config.api.request_timeout_secs, 30);
    }

    #[test]
    fn test_env_overrides_apply_after_load() {
        unsafe {
            std::env::set_var("BOT_TOKEN", "env-token");
            std::env::set_var("BOT_OWNER_IDS", "100, 200,");
        }

        let config = BotConfig::load("/nonexistent/warden.toml");
        assert_eq!(config.bot.token, "env-token");
        assert_eq!(config.bot.owner_ids, vec!["100", "200"]);

        unsafe {
            std::env::remove_var("BOT_TOKEN");
            std::env::remove_var("BOT_OWNER_IDS");
        }
    }
}
