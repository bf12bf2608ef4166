//! DNS Resolution Checker
//!
//! Accepts a domain iff one of its A records equals this host's current
//! public IPv4 address.
//!
//! ## Flow
//!
//! ```text
//! candidate ──normalize──▶ PublicIpSource ──▶ public IP ─┐
//!                          DomainResolver ──▶ A records ─┴─▶ CheckOutcome
//! ```
//!
//! Each external call is bounded by a timeout and a fixed number of attempts
//! ([`RetryPolicy`]). Nothing is cached between checks: an operator retry
//! always queries both services again, so slow propagation is handled by
//! simply asking again.

use std::future::Future;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::traits::{DomainResolver, PublicIpSource};
use crate::validate::{Rejection, Verdict};

/// Timeout and retry budget for each external call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Attempts before giving up (at least 1)
    pub max_attempts: usize,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&NetworkConfig::default())
    }
}

impl From<&NetworkConfig> for RetryPolicy {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Result of checking one candidate domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// An A record equals the public address
    Match(Ipv4Addr),
    /// The domain resolves, but not to us
    Mismatch {
        /// This host's public address
        public: Ipv4Addr,
        /// What the resolver returned
        resolved: Vec<Ipv4Addr>,
    },
    /// NXDOMAIN, no A records, or an empty name
    NotFound,
    /// The echo service or resolver failed or timed out
    Unavailable {
        /// Which service failed
        service: String,
        /// Underlying error
        reason: String,
    },
}

impl CheckOutcome {
    /// Whether the domain was accepted
    pub fn is_match(&self) -> bool {
        matches!(self, CheckOutcome::Match(_))
    }

    /// Convert to a validator verdict for `domain`
    ///
    /// Every non-match becomes a rejection; the message tells the operator
    /// which kind of failure it was.
    pub fn verdict(&self, domain: &str) -> Verdict<Ipv4Addr> {
        match self {
            CheckOutcome::Match(ip) => Ok(*ip),
            CheckOutcome::Mismatch { public, resolved } => Err(Rejection::new(format!(
                "{} resolves to {} but this host's public IP is {}. \
                 Point the A record at {} or wait for DNS to propagate.",
                domain,
                join_ips(resolved),
                public,
                public
            ))),
            CheckOutcome::NotFound => Err(Rejection::new(format!(
                "'{}' does not resolve (no A record). \
                 Create an A record for this host or wait for DNS to propagate.",
                domain
            ))),
            CheckOutcome::Unavailable { service, reason } => Err(Rejection::new(format!(
                "Could not verify {}: {} is unavailable ({}). Check connectivity and try again.",
                domain, service, reason
            ))),
        }
    }
}

fn join_ips(ips: &[Ipv4Addr]) -> String {
    ips.iter()
        .map(|ip| ip.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Trim, lower-case and drop one trailing dot; `None` if nothing is left
pub fn normalize_domain(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_lowercase())
    }
}

/// Verifies that a domain points at this host
pub struct DnsResolutionChecker {
    ip_source: Box<dyn PublicIpSource>,
    resolver: Box<dyn DomainResolver>,
    policy: RetryPolicy,
}

impl DnsResolutionChecker {
    /// Create a checker from its two collaborators
    pub fn new(
        ip_source: Box<dyn PublicIpSource>,
        resolver: Box<dyn DomainResolver>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            ip_source,
            resolver,
            policy,
        }
    }

    /// Retry policy in effect
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Check `candidate`, querying both services fresh
    pub async fn check(&self, candidate: &str) -> CheckOutcome {
        let Some(domain) = normalize_domain(candidate) else {
            return CheckOutcome::NotFound;
        };

        let source_name = self.ip_source.source_name().to_string();
        let public = match self
            .call_with_retry(&source_name, || self.ip_source.public_ipv4())
            .await
        {
            Ok(ip) => ip,
            Err(e) => {
                return CheckOutcome::Unavailable {
                    service: source_name,
                    reason: e.to_string(),
                };
            }
        };
        debug!(public = %public, "Public IP detected");

        let resolver_name = self.resolver.resolver_name();
        let resolved = match self
            .call_with_retry(&resolver_name, || self.resolver.resolve_ipv4(&domain))
            .await
        {
            Ok(resolved) => resolved,
            Err(Error::NotFound(_)) => {
                debug!(domain = %domain, "Domain has no A record");
                return CheckOutcome::NotFound;
            }
            Err(e) => {
                return CheckOutcome::Unavailable {
                    service: resolver_name,
                    reason: e.to_string(),
                };
            }
        };
        debug!(domain = %domain, resolved = %join_ips(&resolved), "Domain resolved");

        if resolved.is_empty() {
            CheckOutcome::NotFound
        } else if resolved.contains(&public) {
            CheckOutcome::Match(public)
        } else {
            CheckOutcome::Mismatch { public, resolved }
        }
    }

    /// Run `call` under the policy's timeout, retrying transient failures
    async fn call_with_retry<T, F, Fut>(&self, service: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 1..=self.policy.max_attempts {
            match tokio::time::timeout(self.policy.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !e.is_transient() => return Err(e),
                Ok(Err(e)) => {
                    warn!("{} attempt {} failed: {}", service, attempt, e);
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!(
                        "{} attempt {} timed out after {:?}",
                        service, attempt, self.policy.timeout
                    );
                    last_error = Some(Error::timeout(service, self.policy.timeout.as_secs()));
                }
            }

            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.retry_delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Other(format!("{} was never called", service))))
    }
}
