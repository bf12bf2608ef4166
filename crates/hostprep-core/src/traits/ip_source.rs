// # Public IP Source Trait
//
// Defines the interface for learning this host's public IPv4 address.
//
// ## Implementations
//
// - HTTP echo service: `hostprep-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use hostprep_core::PublicIpSource;
//
// async fn show(source: &dyn PublicIpSource) -> hostprep_core::Result<()> {
//     let ip = source.public_ipv4().await?;
//     println!("{} says we are {}", source.source_name(), ip);
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public IP source implementations
///
/// # Contract
///
/// - Every call performs a fresh query; implementations must not cache, so an
///   operator retry always observes current state.
/// - Implementations perform a single attempt. Timeouts and retries belong to
///   [`crate::DnsResolutionChecker`].
/// - Transport failures map to [`crate::Error::Network`]; a response that is
///   not a dotted-quad address maps to [`crate::Error::InvalidInput`].
#[async_trait]
pub trait PublicIpSource: Send + Sync {
    /// Query the current public IPv4 address
    async fn public_ipv4(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Short name used in logs and operator messages
    fn source_name(&self) -> &str;
}
