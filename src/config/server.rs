use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound for `session.max_age_days`, about ten years.
pub const MAX_SESSION_AGE_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub max_age_days: i64,
    /// Adds the `Secure` attribute to the session cookie. Off by default so
    /// plain-HTTP development setups keep working.
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "cluebook-session-id".to_string(),
            max_age_days: 31,
            secure: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MinigameConfig {
    /// Replaces the built-in word pool when non-empty.
    pub words: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub environment: Environment,
    /// Registration code that grants admin rights. Without one, nobody can
    /// self-register as admin.
    pub admin_signup_code: Option<String>,
    pub session: SessionConfig,
    pub minigame: MinigameConfig,
}

impl ServerConfig {
    /// Reads a TOML config file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ServerConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.cookie_name.trim().is_empty() {
            return Err(Error::Config("session.cookie_name cannot be empty".to_string()));
        }
        if !(1..=MAX_SESSION_AGE_DAYS).contains(&self.session.max_age_days) {
            return Err(Error::Config(format!(
                "session.max_age_days must be between 1 and {MAX_SESSION_AGE_DAYS}"
            )));
        }
        if let Some(word) = self
            .minigame
            .words
            .iter()
            .find(|w| w.chars().count() != crate::game::WORD_LENGTH)
        {
            return Err(Error::Config(format!(
                "minigame word '{word}' must be {} letters",
                crate::game::WORD_LENGTH
            )));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("cluebook.db")
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// The word pool for the minigame.
    #[must_use]
    pub fn words(&self) -> Vec<String> {
        if self.minigame.words.is_empty() {
            crate::game::DEFAULT_WORDS
                .iter()
                .map(|w| (*w).to_string())
                .collect()
        } else {
            self.minigame.words.iter().map(|w| w.to_lowercase()).collect()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            environment: Environment::default(),
            admin_signup_code: None,
            session: SessionConfig::default(),
            minigame: MinigameConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            port = 3000
            environment = "development"

            [session]
            secure = true
            "#,
        )
        .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert!(config.is_development());
        assert!(config.session.secure);
        assert_eq!(config.session.max_age_days, 31);
        assert_eq!(config.db_path(), PathBuf::from("./data/cluebook.db"));
    }

    #[test]
    fn test_rejects_out_of_range_session_age() {
        for days in ["0", "3651", "9223372036854775807"] {
            let result = ServerConfig::from_toml(&format!("[session]\nmax_age_days = {days}\n"));
            assert!(matches!(result, Err(Error::Config(_))), "max_age_days={days}");
        }
        let config = ServerConfig::from_toml("[session]\nmax_age_days = 3650\n").unwrap();
        assert_eq!(config.session.max_age_days, MAX_SESSION_AGE_DAYS);
    }

    #[test]
    fn test_rejects_bad_minigame_words() {
        let result = ServerConfig::from_toml(
            r#"
            [minigame]
            words = ["crane", "toolong"]
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_default_word_pool() {
        let config = ServerConfig::default();
        assert_eq!(config.words().len(), crate::game::DEFAULT_WORDS.len());
    }
}
