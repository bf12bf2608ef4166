//! Wizard session state
//!
//! A [`Session`] lives for one wizard run and is handed by `&mut` to each
//! stage. It is never persisted as a whole: stages copy individual fields
//! into the plain or secret document at their commit points.

use std::net::IpAddr;

pub use secrecy::{ExposeSecret, SecretString};

/// Outbound mail settings collected by the optional email stage
#[derive(Debug)]
pub struct SmtpSettings {
    /// SMTP server host name
    pub host: String,
    /// SMTP port, as typed (defaults to 465)
    pub port: String,
    /// SMTP login (secret document)
    pub login: SecretString,
    /// SMTP password (secret document)
    pub password: SecretString,
    /// Explicit notification recipient (plain document); `None` falls back
    /// to the login inside the secret document
    pub recipient: Option<String>,
}

/// Process-lifetime answers gathered by the wizard
#[derive(Debug)]
pub struct Session {
    /// Validated login name
    pub username: String,
    /// Validated password, held in memory until committed
    pub password: SecretString,
    /// Answer to the optional feature toggle
    pub feature_enabled: bool,
    /// Domain verified against the public IP
    pub domain: String,
    /// Upstream nameserver chosen by the operator
    pub nameserver: Option<IpAddr>,
    /// Mail settings, when the operator opted in
    pub smtp: Option<SmtpSettings>,
}

impl Session {
    /// Start an empty session
    pub fn new() -> Self {
        Self {
            username: String::new(),
            password: SecretString::from(String::new()),
            feature_enabled: false,
            domain: String::new(),
            nameserver: None,
            smtp: None,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
