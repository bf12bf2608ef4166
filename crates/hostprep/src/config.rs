//! Environment-variable configuration for the hostprep binary

use anyhow::{Context, Result};
use hostprep_core::config::{FeatureToggleConfig, HandoffConfig, NetworkConfig};
use hostprep_core::WizardConfig;
use secrecy::{ExposeSecret, SecretString};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;

/// Application configuration
#[derive(Debug)]
pub struct Config {
    pub settings_path: PathBuf,
    pub secrets_path: PathBuf,
    pub ip_echo_url: String,
    pub resolver: String,
    pub network_timeout_secs: u64,
    pub network_attempts: usize,
    pub feature_key: Option<String>,
    pub seal_settings: bool,
    pub deploy_command: Option<String>,
    pub packages: Option<Vec<String>>,
    pub skip_preflight: bool,
    pub skip_packages: bool,
    pub vault_passphrase: Option<SecretString>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup` (environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = WizardConfig::new();

        Ok(Self {
            settings_path: var("HOSTPREP_SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.settings_path),
            secrets_path: var("HOSTPREP_SECRETS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.secrets_path),
            ip_echo_url: var("HOSTPREP_IP_ECHO_URL").unwrap_or(defaults.network.ip_echo_url),
            resolver: var("HOSTPREP_RESOLVER")
                .unwrap_or_else(|| defaults.network.resolver.to_string()),
            network_timeout_secs: parse_var(
                "HOSTPREP_NETWORK_TIMEOUT_SECS",
                var("HOSTPREP_NETWORK_TIMEOUT_SECS"),
            )?
            .unwrap_or(defaults.network.timeout_secs),
            network_attempts: parse_var(
                "HOSTPREP_NETWORK_ATTEMPTS",
                var("HOSTPREP_NETWORK_ATTEMPTS"),
            )?
            .unwrap_or(defaults.network.max_attempts),
            feature_key: var("HOSTPREP_FEATURE_KEY"),
            seal_settings: parse_flag("HOSTPREP_SEAL_SETTINGS", var("HOSTPREP_SEAL_SETTINGS"))?
                .unwrap_or(defaults.seal_settings),
            deploy_command: var("HOSTPREP_DEPLOY_COMMAND"),
            packages: var("HOSTPREP_PACKAGES").map(|list| {
                list.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
            skip_preflight: parse_flag("HOSTPREP_SKIP_PREFLIGHT", var("HOSTPREP_SKIP_PREFLIGHT"))?
                .unwrap_or(false),
            skip_packages: parse_flag("HOSTPREP_SKIP_PACKAGES", var("HOSTPREP_SKIP_PACKAGES"))?
                .unwrap_or(false),
            vault_passphrase: lookup("HOSTPREP_VAULT_PASSPHRASE").map(SecretString::from),
            log_level: var("HOSTPREP_LOG_LEVEL").unwrap_or_else(|| "warn".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Range and format checks happen here so nothing runs with a bad value.
    pub fn validate(&self) -> Result<()> {
        self.resolver_ip()?;

        if !(1..=120).contains(&self.network_timeout_secs) {
            anyhow::bail!(
                "HOSTPREP_NETWORK_TIMEOUT_SECS must be between 1 and 120 seconds. Got: {}",
                self.network_timeout_secs
            );
        }

        if !(1..=10).contains(&self.network_attempts) {
            anyhow::bail!(
                "HOSTPREP_NETWORK_ATTEMPTS must be between 1 and 10. Got: {}",
                self.network_attempts
            );
        }

        if self.ip_echo_url.starts_with("http://") {
            tracing::warn!(
                "HOSTPREP_IP_ECHO_URL uses HTTP (not HTTPS); the detected address can be spoofed"
            );
        }

        if let Some(ref passphrase) = self.vault_passphrase
            && passphrase.expose_secret().is_empty()
        {
            anyhow::bail!(
                "HOSTPREP_VAULT_PASSPHRASE is set but empty. \
                Unset it to be prompted for a passphrase instead."
            );
        }

        for path in [&self.settings_path, &self.secrets_path] {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                anyhow::bail!(
                    "Document directory does not exist: {}. \
                    Create it first: mkdir -p {}",
                    parent.display(),
                    parent.display()
                );
            }
        }

        self.log_level()?;

        // Everything the core checks (paths differ, feature key format, URL scheme, ...)
        self.wizard_config()?
            .validate()
            .context("Invalid wizard configuration")?;

        Ok(())
    }

    /// Parsed log level
    pub fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "HOSTPREP_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    fn resolver_ip(&self) -> Result<IpAddr> {
        self.resolver.trim().parse().map_err(|_| {
            anyhow::anyhow!(
                "HOSTPREP_RESOLVER must be an IP address (e.g. 1.1.1.1). Got: {}",
                self.resolver
            )
        })
    }

    /// Build the core wizard configuration
    pub fn wizard_config(&self) -> Result<WizardConfig> {
        let defaults = WizardConfig::new();

        let handoff = match self.deploy_command {
            Some(ref line) => HandoffConfig::from_command_line(line)?,
            None => defaults.handoff,
        };

        let feature = match self.feature_key {
            Some(ref key) => FeatureToggleConfig {
                key: key.trim().to_string(),
                ..defaults.feature
            },
            None => defaults.feature,
        };

        Ok(WizardConfig {
            settings_path: self.settings_path.clone(),
            secrets_path: self.secrets_path.clone(),
            seal_settings: self.seal_settings,
            feature,
            network: NetworkConfig {
                ip_echo_url: self.ip_echo_url.clone(),
                resolver: self.resolver_ip()?,
                timeout_secs: self.network_timeout_secs,
                max_attempts: self.network_attempts,
                retry_delay_ms: defaults.network.retry_delay_ms,
            },
            handoff,
            packages: self.packages.clone().unwrap_or(defaults.packages),
        })
    }

    /// Directory holding the documents (used in messages)
    pub fn document_dir(&self) -> &Path {
        self.settings_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }
}

fn parse_var<T: FromStr>(key: &str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| anyhow::anyhow!("{} must be a number. Got: {}", key, v))
        })
        .transpose()
}

fn parse_flag(key: &str, value: Option<String>) -> Result<Option<bool>> {
    value
        .map(|v| match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow::anyhow!(
                "{} must be true or false. Got: {}",
                key,
                v
            )),
        })
        .transpose()
}
