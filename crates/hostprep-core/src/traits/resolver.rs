// # Domain Resolver Trait
//
// Defines the interface for resolving a domain's A records through a
// recursive resolver chosen by configuration (not the host's stub resolver).
//
// ## Implementations
//
// - Hickory DNS: `hostprep-resolver-hickory` crate

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for recursive A-record lookups
///
/// # Contract
///
/// - No caching: each call queries the resolver again.
/// - NXDOMAIN or an answer without A records is [`crate::Error::NotFound`].
/// - Any other failure (unreachable resolver, SERVFAIL, malformed reply) is
///   [`crate::Error::Network`].
/// - Single attempt; the checker owns timeouts and retries.
#[async_trait]
pub trait DomainResolver: Send + Sync {
    /// Resolve the IPv4 addresses `domain` points at
    async fn resolve_ipv4(&self, domain: &str) -> Result<Vec<Ipv4Addr>, crate::Error>;

    /// Short name used in logs and operator messages
    fn resolver_name(&self) -> String;
}
