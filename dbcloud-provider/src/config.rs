//! Provider configuration
//!
//! Settings come from the provider block of the configuration, falling back
//! to environment variables for the endpoint and the API key pair.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use dbcloud_core::duration::parse_duration;
use dbcloud_core::provider::ProviderError;
use dbcloud_core::resource::Value;
use dbcloud_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use dbcloud_core::waiter::StateWaiter;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "https://api.dbcloud.example";

pub const HOST_ENV: &str = "DBCLOUD_HOST";
pub const PUBLIC_KEY_ENV: &str = "DBCLOUD_PUBLIC_KEY";
pub const PRIVATE_KEY_ENV: &str = "DBCLOUD_PRIVATE_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing provider setting '{name}' (or environment variable {env})")]
    Missing {
        name: &'static str,
        env: &'static str,
    },

    #[error("invalid provider setting '{name}': {message}")]
    Invalid { name: String, message: String },
}

impl From<ConfigError> for ProviderError {
    fn from(err: ConfigError) -> Self {
        ProviderError::new(err.to_string()).with_cause(err)
    }
}

/// Timeouts and polling cadence for long-running operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub create_timeout: Duration,
    pub update_timeout: Duration,
    pub delete_timeout: Duration,
    pub poll_interval: Duration,
    pub min_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            create_timeout: Duration::from_secs(60 * 60),
            update_timeout: Duration::from_secs(60 * 60),
            delete_timeout: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_secs(60),
            min_interval: Duration::from_secs(10),
        }
    }
}

impl WaitConfig {
    /// Build a waiter for `pending -> target` using this cadence
    pub fn waiter<S>(
        &self,
        pending: impl IntoIterator<Item = S>,
        target: impl IntoIterator<Item = S>,
        timeout: Duration,
    ) -> StateWaiter<S>
    where
        S: PartialEq + fmt::Display,
    {
        StateWaiter::new(pending, target)
            .with_timeout(timeout)
            .with_min_interval(self.min_interval)
            .with_poll_interval(self.poll_interval)
    }

    /// Apply a resource's `timeouts` block on top of the provider-wide values
    pub fn with_overrides(mut self, timeouts: Option<&Value>) -> Result<Self, ConfigError> {
        let Some(block) = timeouts.and_then(Value::as_map) else {
            return Ok(self);
        };

        for (key, slot) in [
            ("create", &mut self.create_timeout),
            ("update", &mut self.update_timeout),
            ("delete", &mut self.delete_timeout),
        ] {
            if let Some(value) = block.get(key) {
                *slot = duration_setting(&format!("timeouts.{}", key), value)?;
            }
        }
        Ok(self)
    }
}

fn duration_setting(name: &str, value: &Value) -> Result<Duration, ConfigError> {
    let text = value.as_str().ok_or_else(|| ConfigError::Invalid {
        name: name.to_string(),
        message: "expected a duration string such as \"30m\"".to_string(),
    })?;
    parse_duration(text).map_err(|e| ConfigError::Invalid {
        name: name.to_string(),
        message: e.to_string(),
    })
}

/// Connection and wait settings for the provider
#[derive(Clone)]
pub struct ProviderConfig {
    pub host: String,
    pub public_key: String,
    pub private_key: String,
    pub waits: WaitConfig,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("host", &self.host)
            .field("public_key", &self.public_key)
            .field("private_key", &"(sensitive)")
            .field("waits", &self.waits)
            .finish()
    }
}

impl ProviderConfig {
    /// Schema of the provider block
    pub fn schema() -> ResourceSchema {
        ResourceSchema::new("provider")
            .with_description("dbcloud provider settings")
            .attribute(
                AttributeSchema::new("host", AttributeType::String)
                    .with_description(format!("API endpoint (env {})", HOST_ENV)),
            )
            .attribute(
                AttributeSchema::new("public_key", AttributeType::String)
                    .with_description(format!("API public key (env {})", PUBLIC_KEY_ENV)),
            )
            .attribute(
                AttributeSchema::new("private_key", AttributeType::String)
                    .sensitive()
                    .with_description(format!("API private key (env {})", PRIVATE_KEY_ENV)),
            )
            .attribute(AttributeSchema::new("create_timeout", types::duration()))
            .attribute(AttributeSchema::new("update_timeout", types::duration()))
            .attribute(AttributeSchema::new("delete_timeout", types::duration()))
            .attribute(AttributeSchema::new("poll_interval", types::duration()))
    }

    /// Build the configuration from provider attributes and the process environment
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> Result<Self, ConfigError> {
        Self::from_sources(attributes, |name| std::env::var(name).ok())
    }

    /// Build the configuration from provider attributes and an environment lookup
    pub fn from_sources(
        attributes: &HashMap<String, Value>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Err(errors) = Self::schema().validate(attributes) {
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ConfigError::Invalid {
                name: "provider".to_string(),
                message,
            });
        }

        // Attribute wins over the environment; empty strings count as unset
        let setting = |name: &str, env_name: &str| -> Option<String> {
            attributes
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .or_else(|| env(env_name).filter(|s| !s.is_empty()))
        };

        let host = setting("host", HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let public_key = setting("public_key", PUBLIC_KEY_ENV).ok_or(ConfigError::Missing {
            name: "public_key",
            env: PUBLIC_KEY_ENV,
        })?;
        let private_key = setting("private_key", PRIVATE_KEY_ENV).ok_or(ConfigError::Missing {
            name: "private_key",
            env: PRIVATE_KEY_ENV,
        })?;

        let mut waits = WaitConfig::default();
        for (name, slot) in [
            ("create_timeout", &mut waits.create_timeout),
            ("update_timeout", &mut waits.update_timeout),
            ("delete_timeout", &mut waits.delete_timeout),
            ("poll_interval", &mut waits.poll_interval),
        ] {
            if let Some(value) = attributes.get(name) {
                *slot = duration_setting(name, value)?;
            }
        }

        Ok(Self {
            host,
            public_key,
            private_key,
            waits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn attributes_take_precedence_over_environment() {
        let config = ProviderConfig::from_sources(
            &attrs(&[("public_key", "attr-pub"), ("private_key", "attr-priv")]),
            |name| match name {
                PUBLIC_KEY_ENV => Some("env-pub".to_string()),
                HOST_ENV => Some("https://staging.dbcloud.example".to_string()),
                _ => None,
            },
        )
        .unwrap();

        assert_eq!(config.public_key, "attr-pub");
        assert_eq!(config.private_key, "attr-priv");
        assert_eq!(config.host, "https://staging.dbcloud.example");
    }

    #[test]
    fn credentials_fall_back_to_environment() {
        let config = ProviderConfig::from_sources(&HashMap::new(), |name| match name {
            PUBLIC_KEY_ENV => Some("env-pub".to_string()),
            PRIVATE_KEY_ENV => Some("env-priv".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.public_key, "env-pub");
        assert_eq!(config.waits, WaitConfig::default());
    }

    #[test]
    fn missing_private_key_is_an_error() {
        let err = ProviderConfig::from_sources(&attrs(&[("public_key", "pub")]), no_env)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                name: "private_key",
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "missing provider setting 'private_key' (or environment variable DBCLOUD_PRIVATE_KEY)"
        );
    }

    #[test]
    fn wait_settings_are_parsed() {
        let config = ProviderConfig::from_sources(
            &attrs(&[
                ("public_key", "pub"),
                ("private_key", "priv"),
                ("create_timeout", "2h"),
                ("poll_interval", "15s"),
            ]),
            no_env,
        )
        .unwrap();

        assert_eq!(config.waits.create_timeout, Duration::from_secs(7200));
        assert_eq!(config.waits.poll_interval, Duration::from_secs(15));
        assert_eq!(config.waits.delete_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn unknown_and_malformed_settings_are_rejected() {
        let err = ProviderConfig::from_sources(
            &attrs(&[
                ("public_key", "pub"),
                ("private_key", "priv"),
                ("region", "us-east-1"),
            ]),
            no_env,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown attribute 'region'"));

        let err = ProviderConfig::from_sources(
            &attrs(&[
                ("public_key", "pub"),
                ("private_key", "priv"),
                ("delete_timeout", "later"),
            ]),
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn debug_output_hides_private_key() {
        let config = ProviderConfig::from_sources(
            &attrs(&[("public_key", "pub"), ("private_key", "top-secret")]),
            no_env,
        )
        .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("top-secret"));
        assert!(debug.contains("(sensitive)"));
    }

    #[test]
    fn resource_timeouts_override_defaults() {
        let block = Value::Map(
            [
                ("create".to_string(), Value::String("45m".to_string())),
                ("delete".to_string(), Value::String("5m".to_string())),
            ]
            .into_iter()
            .collect(),
        );
        let waits = WaitConfig::default().with_overrides(Some(&block)).unwrap();

        assert_eq!(waits.create_timeout, Duration::from_secs(45 * 60));
        assert_eq!(waits.update_timeout, Duration::from_secs(60 * 60));
        assert_eq!(waits.delete_timeout, Duration::from_secs(5 * 60));

        assert_eq!(WaitConfig::default().with_overrides(None).unwrap(), WaitConfig::default());
    }

    #[test]
    fn waiter_uses_configured_cadence() {
        let waits = WaitConfig {
            poll_interval: Duration::from_secs(2),
            ..WaitConfig::default()
        };
        let waiter = waits.waiter(["CREATING"], ["ACTIVE"], Duration::from_secs(90));

        assert_eq!(waiter.timeout(), Duration::from_secs(90));
        // poll interval is floored at the minimum interval
        assert_eq!(waiter.interval(), Duration::from_secs(10));
    }
}
