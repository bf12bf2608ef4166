// # Hickory Resolver
//
// Domain lookups against one recursive resolver, queried directly.
//
// ## Architecture
//
// The wizard needs to see what the public internet sees, not what the host's
// stub resolver or /etc/hosts says. The resolver is therefore built from a
// single upstream address with the hosts file disabled and caching off, so
// every `resolve_ipv4()` sends a fresh query.

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};

use hostprep_core::traits::DomainResolver;
use hostprep_core::{Error, Result};

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Standard DNS port
pub const DNS_PORT: u16 = 53;

/// `DomainResolver` backed by hickory-resolver
pub struct HickoryResolver {
    upstream: IpAddr,
    port: u16,
    timeout: Duration,
    resolver: TokioAsyncResolver,
}

impl HickoryResolver {
    /// Create a resolver querying `upstream` on port 53
    ///
    /// # Parameters
    ///
    /// - `upstream`: recursive resolver address (e.g., 1.1.1.1)
    /// - `timeout`: per-query timeout
    pub fn new(upstream: IpAddr, timeout: Duration) -> Self {
        Self::with_port(upstream, DNS_PORT, timeout)
    }

    /// Create a resolver querying `upstream` on a custom port
    pub fn with_port(upstream: IpAddr, port: u16, timeout: Duration) -> Self {
        let name_servers = NameServerConfigGroup::from_ips_clear(&[upstream], port, true);
        let config = ResolverConfig::from_parts(None, vec![], name_servers);

        let mut options = ResolverOpts::default();
        options.timeout = timeout;
        // Retries are driven by the DNS resolution checker
        options.attempts = 1;
        options.cache_size = 0;
        options.use_hosts_file = false;

        Self {
            upstream,
            port,
            timeout,
            resolver: TokioAsyncResolver::tokio(config, options),
        }
    }

    /// Upstream resolver address
    pub fn upstream(&self) -> IpAddr {
        self.upstream
    }
}

/// Map a hickory failure onto the core error kinds
fn classify(domain: &str, service: &str, timeout: Duration, error: &ResolveError) -> Error {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => {
            Error::not_found(format!("no A record for {}", domain))
        }
        ResolveErrorKind::Timeout => Error::timeout(service, timeout.as_secs()),
        _ => Error::network(service, error.to_string()),
    }
}

#[async_trait::async_trait]
impl DomainResolver for HickoryResolver {
    async fn resolve_ipv4(&self, domain: &str) -> Result<Vec<Ipv4Addr>> {
        tracing::debug!(domain = %domain, upstream = %self.upstream, "Querying A records");

        let lookup = self
            .resolver
            .ipv4_lookup(domain)
            .await
            .map_err(|e| classify(domain, &self.resolver_name(), self.timeout, &e))?;

        let addrs: Vec<Ipv4Addr> = lookup.iter().map(|a| a.0).collect();
        if addrs.is_empty() {
            return Err(Error::not_found(format!("no A record for {}", domain)));
        }
        Ok(addrs)
    }

    fn resolver_name(&self) -> String {
        if self.port == DNS_PORT {
            format!("resolver {}", self.upstream)
        } else {
            format!("resolver {}:{}", self.upstream, self.port)
        }
    }
}
