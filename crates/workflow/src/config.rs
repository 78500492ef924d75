//! Onboarding configuration.
//!
//! Defaults, optionally overridden by a TOML file, then by `IDFORGE_*`
//! environment variables. Durations are given in milliseconds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use idforge_core::{EntitlementCode, SkuPartNumbers};

use crate::credential::{DEFAULT_SECRET_LENGTH, MAX_SECRET_LENGTH, MIN_SECRET_LENGTH};
use crate::retry::RetryPolicy;

pub const ENV_MAX_ATTEMPTS: &str = "IDFORGE_MAX_ATTEMPTS";
pub const ENV_BASE_DELAY_MS: &str = "IDFORGE_BASE_DELAY_MS";
pub const ENV_INTER_RECORD_DELAY_MS: &str = "IDFORGE_INTER_RECORD_DELAY_MS";
pub const ENV_PROVISIONING_DELAY_MS: &str = "IDFORGE_PROVISIONING_DELAY_MS";
pub const ENV_USAGE_LOCATION: &str = "IDFORGE_USAGE_LOCATION";
pub const ENV_MAILBOX_TIMEZONE: &str = "IDFORGE_MAILBOX_TIMEZONE";
pub const ENV_SECRET_LENGTH: &str = "IDFORGE_SECRET_LENGTH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingConfig {
    /// Retry policy for entitlement assignment.
    pub retry: RetryPolicy,
    /// Pause after each record, to respect directory rate limits.
    pub inter_record_delay: Duration,
    /// Pause between account creation and entitlement assignment, for
    /// directory replication.
    pub provisioning_delay: Duration,
    /// Two-letter country code set on new accounts.
    pub usage_location: String,
    pub mailbox_timezone: String,
    pub secret_length: usize,
    pub force_change_on_first_use: bool,
    pub sku_part_numbers: SkuPartNumbers,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            inter_record_delay: Duration::from_secs(1),
            provisioning_delay: Duration::from_secs(2),
            usage_location: "NL".to_string(),
            mailbox_timezone: "W. Europe Standard Time".to_string(),
            secret_length: DEFAULT_SECRET_LENGTH,
            force_change_on_first_use: true,
            sku_part_numbers: SkuPartNumbers::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    inter_record_delay_ms: Option<u64>,
    provisioning_delay_ms: Option<u64>,
    usage_location: Option<String>,
    mailbox_timezone: Option<String>,
    secret_length: Option<usize>,
    force_change_on_first_use: Option<bool>,
    #[serde(default)]
    sku_part_numbers: BTreeMap<String, String>,
}

impl OnboardingConfig {
    /// Load defaults, then `path` (if given), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.with_env_overrides(std::env::vars())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        let mut config = Self::default();

        if let Some(max_attempts) = file.max_attempts {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(ms) = file.base_delay_ms {
            config.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.inter_record_delay_ms {
            config.inter_record_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.provisioning_delay_ms {
            config.provisioning_delay = Duration::from_millis(ms);
        }
        if let Some(location) = file.usage_location {
            config.usage_location = location;
        }
        if let Some(timezone) = file.mailbox_timezone {
            config.mailbox_timezone = timezone;
        }
        if let Some(length) = file.secret_length {
            config.secret_length = length;
        }
        if let Some(force) = file.force_change_on_first_use {
            config.force_change_on_first_use = force;
        }
        for (raw_code, part_number) in file.sku_part_numbers {
            let code: EntitlementCode = raw_code
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("unknown entitlement code {raw_code:?}")))?;
            if code == EntitlementCode::NoEntitlement {
                return Err(ConfigError::Invalid("NONE cannot map to a SKU".to_string()));
            }
            config.sku_part_numbers = config.sku_part_numbers.with(code, part_number);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply `IDFORGE_*` overrides from `vars`; other variables are ignored.
    pub fn with_env_overrides<I>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                ENV_MAX_ATTEMPTS => self.retry.max_attempts = parse_env(&key, &value)?,
                ENV_BASE_DELAY_MS => {
                    self.retry.base_delay = Duration::from_millis(parse_env(&key, &value)?)
                }
                ENV_INTER_RECORD_DELAY_MS => {
                    self.inter_record_delay = Duration::from_millis(parse_env(&key, &value)?)
                }
                ENV_PROVISIONING_DELAY_MS => {
                    self.provisioning_delay = Duration::from_millis(parse_env(&key, &value)?)
                }
                ENV_USAGE_LOCATION => self.usage_location = value.trim().to_string(),
                ENV_MAILBOX_TIMEZONE => self.mailbox_timezone = value.trim().to_string(),
                ENV_SECRET_LENGTH => self.secret_length = parse_env(&key, &value)?,
                _ => {}
            }
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.usage_location.len() != 2 || !self.usage_location.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::Invalid(format!(
                "usage_location must be a two-letter country code, got {:?}",
                self.usage_location
            )));
        }
        if !(MIN_SECRET_LENGTH..=MAX_SECRET_LENGTH).contains(&self.secret_length) {
            return Err(ConfigError::Invalid(format!(
                "secret_length must be between {MIN_SECRET_LENGTH} and {MAX_SECRET_LENGTH}, got {}",
                self.secret_length
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}
