//! Validator library
//!
//! Pure predicates for every operator input class. Validators never prompt,
//! print or touch the network; they return a [`Verdict`] whose rejection
//! carries the message the wizard shows before asking again.
//!
//! Domain names have no validator here: a domain is accepted exactly when the
//! [`crate::DnsResolutionChecker`] says it resolves to this host.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// Minimum password length (characters)
pub const PASSWORD_MIN_LEN: usize = 8;

/// Maximum password length (characters)
pub const PASSWORD_MAX_LEN: usize = 72;

/// SMTP port used when the operator leaves the answer blank
pub const DEFAULT_SMTP_PORT: &str = "465";

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]{1,15}$").expect("username pattern compiles"));

/// Outcome of a validator: the accepted (possibly normalized) value or a rejection
pub type Verdict<T = ()> = std::result::Result<T, Rejection>;

/// A recoverable validation failure with a human-readable reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    reason: String,
}

impl Rejection {
    /// Create a rejection with the given reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The message shown to the operator
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Accept iff the username matches `^[a-z0-9]{1,15}$`
pub fn validate_username(candidate: &str) -> Verdict {
    if USERNAME_RE.is_match(candidate) {
        Ok(())
    } else {
        Err(Rejection::new(
            "Invalid username: use 1-15 lowercase letters or digits only",
        ))
    }
}

/// Accept iff both entries are identical and 8..=72 characters long
///
/// Mismatch and length problems share one message on purpose.
pub fn validate_password(primary: &str, confirmation: &str) -> Verdict {
    let len = primary.chars().count();
    if primary == confirmation && (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        Ok(())
    } else {
        Err(Rejection::new(format!(
            "Passwords must match and be between {} and {} characters long",
            PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
        )))
    }
}

/// Upstream DNS provider offered to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnsChoice {
    /// 1.1.1.1
    Cloudflare,
    /// 9.9.9.9
    Quad9,
    /// 8.8.8.8
    Google,
    /// Operator-supplied address
    Custom,
}

impl DnsChoice {
    /// All choices in menu order
    pub const ALL: [DnsChoice; 4] = [
        DnsChoice::Cloudflare,
        DnsChoice::Quad9,
        DnsChoice::Google,
        DnsChoice::Custom,
    ];

    /// Fixed nameserver for the well-known providers, `None` for custom
    pub fn nameserver(self) -> Option<IpAddr> {
        match self {
            DnsChoice::Cloudflare => Some(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))),
            DnsChoice::Quad9 => Some(IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9))),
            DnsChoice::Google => Some(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))),
            DnsChoice::Custom => None,
        }
    }

    /// Display label used in the menu
    pub fn label(self) -> &'static str {
        match self {
            DnsChoice::Cloudflare => "Cloudflare",
            DnsChoice::Quad9 => "Quad9",
            DnsChoice::Google => "Google",
            DnsChoice::Custom => "Custom",
        }
    }

    /// Numbered menu, one choice per line
    pub fn menu() -> String {
        Self::ALL
            .iter()
            .enumerate()
            .map(|(i, choice)| match choice.nameserver() {
                Some(ip) => format!("  {}) {} ({})", i + 1, choice.label(), ip),
                None => format!("  {}) {} (enter an address)", i + 1, choice.label()),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Accept a menu number (`1`-`4`) or a provider name, case-insensitively
pub fn parse_dns_choice(candidate: &str) -> Verdict<DnsChoice> {
    match candidate.trim().to_ascii_lowercase().as_str() {
        "1" | "cloudflare" => Ok(DnsChoice::Cloudflare),
        "2" | "quad9" => Ok(DnsChoice::Quad9),
        "3" | "google" => Ok(DnsChoice::Google),
        "4" | "custom" => Ok(DnsChoice::Custom),
        _ => Err(Rejection::new("Invalid choice: pick 1, 2, 3 or 4")),
    }
}

/// Accept any syntactically valid IPv4 or IPv6 address
pub fn validate_custom_nameserver(candidate: &str) -> Verdict<IpAddr> {
    candidate
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| Rejection::new(format!("'{}' is not a valid IP address", candidate.trim())))
}

/// Free-form yes/no; blank selects `default`
pub fn parse_yes_no(candidate: &str, default: bool) -> Verdict<bool> {
    match candidate.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err(Rejection::new("Please answer yes or no")),
    }
}

/// SMTP port as typed, or 465 when blank
///
/// No numeric or range validation is performed.
pub fn smtp_port_or_default(candidate: &str) -> String {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        DEFAULT_SMTP_PORT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Accept any non-blank value, trimmed
pub fn validate_required(field: &str, candidate: &str) -> Verdict<String> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        Err(Rejection::new(format!("{} cannot be empty", field)))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Explicit notification recipient, or `None` when left blank
pub fn optional_recipient(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_accepts_lowercase_alnum() {
        assert!(validate_username("bob1").is_ok());
        assert!(validate_username("a").is_ok());
        assert!(validate_username(&"a".repeat(15)).is_ok());
        assert!(validate_username("0123456789").is_ok());
    }

    #[test]
    fn test_username_rejections() {
        assert!(validate_username("Bob1").is_err());
        assert!(validate_username(&"a".repeat(16)).is_err());
        assert!(validate_username("").is_err());
        assert!(validate_username("bob-1").is_err());
        assert!(validate_username("bob 1").is_err());
        assert!(validate_username("bob1\n").is_err());
        assert!(validate_username("jos\u{e9}").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("short1", "short1").is_err());
        assert!(validate_password("goodpass1", "goodpass2").is_err());
        assert!(validate_password("goodpass1", "goodpass1").is_ok());
        assert!(validate_password("hunter22", "hunter22").is_ok());

        let max = "x".repeat(PASSWORD_MAX_LEN);
        assert!(validate_password(&max, &max).is_ok());
        let too_long = "x".repeat(PASSWORD_MAX_LEN + 1);
        assert!(validate_password(&too_long, &too_long).is_err());
    }

    #[test]
    fn test_password_rejection_does_not_say_which_rule() {
        let mismatch = validate_password("goodpass1", "goodpass2").unwrap_err();
        let short = validate_password("short1", "short1").unwrap_err();
        assert_eq!(mismatch, short);
    }

    #[test]
    fn test_password_length_counts_characters() {
        // 8 characters, 16 bytes
        let pw = "\u{e9}".repeat(8);
        assert!(validate_password(&pw, &pw).is_ok());
    }

    #[test]
    fn test_dns_choice_parsing() {
        assert_eq!(parse_dns_choice("1").unwrap(), DnsChoice::Cloudflare);
        assert_eq!(parse_dns_choice(" 2 ").unwrap(), DnsChoice::Quad9);
        assert_eq!(parse_dns_choice("Google").unwrap(), DnsChoice::Google);
        assert_eq!(parse_dns_choice("custom").unwrap(), DnsChoice::Custom);
        assert!(parse_dns_choice("5").is_err());
        assert!(parse_dns_choice("").is_err());
        assert!(parse_dns_choice("opendns").is_err());
    }

    #[test]
    fn test_dns_choice_nameservers() {
        assert_eq!(
            DnsChoice::Cloudflare.nameserver(),
            Some("1.1.1.1".parse().unwrap())
        );
        assert_eq!(DnsChoice::Quad9.nameserver(), Some("9.9.9.9".parse().unwrap()));
        assert_eq!(DnsChoice::Google.nameserver(), Some("8.8.8.8".parse().unwrap()));
        assert_eq!(DnsChoice::Custom.nameserver(), None);
        assert!(DnsChoice::menu().contains("1) Cloudflare (1.1.1.1)"));
    }

    #[test]
    fn test_custom_nameserver() {
        assert_eq!(
            validate_custom_nameserver(" 192.0.2.53 ").unwrap(),
            "192.0.2.53".parse::<IpAddr>().unwrap()
        );
        assert!(validate_custom_nameserver("2001:db8::53").is_ok());
        assert!(validate_custom_nameserver("dns.example").is_err());
        assert!(validate_custom_nameserver("300.1.1.1").is_err());
    }

    #[test]
    fn test_yes_no() {
        assert_eq!(parse_yes_no("", false), Ok(false));
        assert_eq!(parse_yes_no("", true), Ok(true));
        assert_eq!(parse_yes_no("Y", false), Ok(true));
        assert_eq!(parse_yes_no("yes", false), Ok(true));
        assert_eq!(parse_yes_no("NO", true), Ok(false));
        assert!(parse_yes_no("maybe", false).is_err());
    }

    #[test]
    fn test_smtp_port_defaults_but_is_not_validated() {
        assert_eq!(smtp_port_or_default(""), "465");
        assert_eq!(smtp_port_or_default("  "), "465");
        assert_eq!(smtp_port_or_default("587"), "587");
        assert_eq!(smtp_port_or_default("smtp"), "smtp");
    }

    #[test]
    fn test_required_and_recipient() {
        assert!(validate_required("SMTP host", "  ").is_err());
        assert_eq!(
            validate_required("SMTP host", " smtp.example.com ").unwrap(),
            "smtp.example.com"
        );
        assert_eq!(optional_recipient("  "), None);
        assert_eq!(
            optional_recipient(" ops@example.com ").as_deref(),
            Some("ops@example.com")
        );
    }
}
