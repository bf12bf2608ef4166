//! Configuration types for hostprep
//!
//! This module defines the configuration consumed by the wizard and its
//! collaborators. The binary fills it from environment variables; tests and
//! embedders build it directly.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Main wizard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardConfig {
    /// Plain configuration document (non-secret settings)
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,

    /// Secret document (credentials, sealed at rest)
    #[serde(default = "default_secrets_path")]
    pub secrets_path: PathBuf,

    /// Seal the plain document too when the wizard finishes
    #[serde(default = "default_true")]
    pub seal_settings: bool,

    /// Optional feature toggle asked after the identity stage
    #[serde(default)]
    pub feature: FeatureToggleConfig,

    /// Public IP echo and resolver settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Deployment engine launched at the end (operator-confirmed)
    #[serde(default)]
    pub handoff: HandoffConfig,

    /// Base packages installed before the wizard starts
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
}

impl WizardConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            settings_path: default_settings_path(),
            secrets_path: default_secrets_path(),
            seal_settings: true,
            feature: FeatureToggleConfig::default(),
            network: NetworkConfig::default(),
            handoff: HandoffConfig::default(),
            packages: default_packages(),
        }
    }

    /// Place both documents inside `dir`, keeping their file names
    pub fn with_document_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let settings_name = self
            .settings_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(default_settings_path);
        let secrets_name = self
            .secrets_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(default_secrets_path);
        self.settings_path = dir.join(settings_name);
        self.secrets_path = dir.join(secrets_name);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.settings_path.as_os_str().is_empty() {
            return Err(crate::Error::config("Settings document path cannot be empty"));
        }
        if self.secrets_path.as_os_str().is_empty() {
            return Err(crate::Error::config("Secret document path cannot be empty"));
        }
        if self.settings_path == self.secrets_path {
            return Err(crate::Error::config(format!(
                "Settings and secret documents must differ (both are {})",
                self.settings_path.display()
            )));
        }

        self.feature.validate()?;
        self.network.validate()?;
        self.handoff.validate()?;

        Ok(())
    }
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Yes/no feature toggle written to the plain document as a boolean
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureToggleConfig {
    /// Document key the answer is stored under
    #[serde(default = "default_feature_key")]
    pub key: String,

    /// Question shown to the operator
    #[serde(default = "default_feature_question")]
    pub question: String,
}

impl FeatureToggleConfig {
    /// Validate the toggle configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !crate::document::is_valid_key(&self.key) {
            return Err(crate::Error::config(format!(
                "Feature key '{}' is not a valid document key (use [A-Za-z0-9_])",
                self.key
            )));
        }
        if self.question.trim().is_empty() {
            return Err(crate::Error::config("Feature question cannot be empty"));
        }
        Ok(())
    }
}

impl Default for FeatureToggleConfig {
    fn default() -> Self {
        Self {
            key: default_feature_key(),
            question: default_feature_question(),
        }
    }
}

/// Settings for the DNS Resolution Checker's external calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// HTTPS endpoint whose body is the caller's public IPv4 address
    #[serde(default = "default_ip_echo_url")]
    pub ip_echo_url: String,

    /// Recursive resolver queried for the domain's A record
    #[serde(default = "default_resolver")]
    pub resolver: IpAddr,

    /// Timeout applied to each external call (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per external call before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Delay between attempts (in milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl NetworkConfig {
    /// Validate the network configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ip_echo_url.is_empty() {
            return Err(crate::Error::config("IP echo URL cannot be empty"));
        }
        if !self.ip_echo_url.starts_with("https://") && !self.ip_echo_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "IP echo URL must use HTTP or HTTPS scheme. Got: {}",
                self.ip_echo_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Network timeout must be > 0"));
        }
        if self.max_attempts == 0 {
            return Err(crate::Error::config("Network attempts must be >= 1"));
        }
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ip_echo_url: default_ip_echo_url(),
            resolver: default_resolver(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// External deployment engine command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// Program to execute
    #[serde(default = "default_handoff_program")]
    pub program: String,

    /// Arguments passed to the program
    #[serde(default = "default_handoff_args")]
    pub args: Vec<String>,
}

impl HandoffConfig {
    /// Parse a whitespace-separated command line (`program arg1 arg2`)
    pub fn from_command_line(line: &str) -> Result<Self, crate::Error> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| crate::Error::config("Deploy command cannot be empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Validate the hand-off configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.program.trim().is_empty() {
            return Err(crate::Error::config("Deploy program cannot be empty"));
        }
        Ok(())
    }

    /// Render as a single command line for display
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            program: default_handoff_program(),
            args: default_handoff_args(),
        }
    }
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("custom.yml")
}

fn default_secrets_path() -> PathBuf {
    PathBuf::from("secret.yml")
}

fn default_true() -> bool {
    true
}

fn default_feature_key() -> String {
    "enable_adguard_unbound_doh".to_string()
}

fn default_feature_question() -> String {
    "Enable AdGuard Home with Unbound and DNS-over-HTTPS (ad-blocking DNS)?".to_string()
}

fn default_ip_echo_url() -> String {
    "https://api.ipify.org".to_string()
}

fn default_resolver() -> IpAddr {
    IpAddr::from([1, 1, 1, 1])
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_handoff_program() -> String {
    "ansible-playbook".to_string()
}

fn default_handoff_args() -> Vec<String> {
    vec!["run.yml".to_string(), "--ask-vault-pass".to_string()]
}

fn default_packages() -> Vec<String> {
    ["software-properties-common", "python3-pip", "python3-venv", "git", "curl"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
