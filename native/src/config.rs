use crate::attributes::{AttrKey, Attributes, ItemClass};
use crate::error::{KeychainError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_LOG_LEVEL: &str = "MR_KEYCHAIN_LOG";
const ENV_CASE_INSENSITIVE: &str = "MR_KEYCHAIN_CASE_INSENSITIVE";
const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// How a stored but empty password is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlankPasswordPolicy {
    /// Return `""`
    #[default]
    EmptyString,
    /// Report it the same way as a missing item
    NotFound,
}

/// Keychain facade configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeychainConfig {
    pub default_class: ItemClass,
    pub case_insensitive: bool,
    pub blank_password: BlankPasswordPolicy,
    pub log_level: String,
}

impl Default for KeychainConfig {
    fn default() -> Self {
        Self {
            default_class: ItemClass::InternetPassword,
            case_insensitive: false,
            blank_password: BlankPasswordPolicy::EmptyString,
            log_level: "info".to_string(),
        }
    }
}

impl KeychainConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: KeychainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Apply `MR_KEYCHAIN_LOG` and `MR_KEYCHAIN_CASE_INSENSITIVE`
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(flag) = lookup(ENV_CASE_INSENSITIVE) {
            self.case_insensitive = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                other => {
                    return Err(KeychainError::Config(format!(
                        "{} must be a boolean, got `{}`",
                        ENV_CASE_INSENSITIVE, other
                    )))
                }
            };
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let level = self.log_level.trim().to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(KeychainError::Config(format!(
                "unknown log level `{}`",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Attributes every search starts from
    pub fn search_defaults(&self) -> Attributes {
        let mut defaults = Attributes::new().with(AttrKey::Class, self.default_class);
        if self.case_insensitive {
            defaults.insert(AttrKey::MatchCaseInsensitive, true);
        }
        defaults
    }
}
