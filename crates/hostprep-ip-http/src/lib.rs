// # HTTP IP Source
//
// Public IPv4 detection through an HTTPS IP-echo service.
//
// ## Architecture
//
// The echo service (e.g. api.ipify.org) answers a plain GET with the
// caller's address as plain text. Every call to `public_ipv4()` performs one
// fresh request; nothing is cached, so a re-prompt in the wizard always sees
// the current address. Retries and the outer timeout belong to the
// `DnsResolutionChecker`; the client timeout here only bounds one request.

use hostprep_core::traits::PublicIpSource;
use hostprep_core::{Error, Result};

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Default IP-echo service
pub const DEFAULT_ECHO_URL: &str = "https://api.ipify.org";

/// Default per-request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Service name used in errors and logs
const SERVICE: &str = "ip-echo";

/// IPv4 source backed by an HTTPS echo service
pub struct HttpIpSource {
    /// URL to fetch the address from
    url: String,

    /// Per-request timeout
    timeout: Duration,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source
    ///
    /// # Parameters
    ///
    /// - `url`: echo service URL (e.g., "https://api.ipify.org")
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create with a custom per-request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("hostprep/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Echo service URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the address from the echo service
    async fn fetch_ip(&self) -> Result<Ipv4Addr> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(SERVICE, self.timeout.as_secs())
            } else {
                Error::network(SERVICE, format!("Request failed: {}", e))
            }
        })?;

        if !response.status().is_success() {
            return Err(Error::network(
                SERVICE,
                format!("HTTP error: {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::network(SERVICE, format!("Failed to read response: {}", e)))?;

        parse_ipv4(&body)
    }
}

/// Parse an echo-service body into an IPv4 address
pub fn parse_ipv4(body: &str) -> Result<Ipv4Addr> {
    let text = body.trim();
    match text.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => Ok(ip),
        Ok(IpAddr::V6(ip)) => Err(Error::network(
            SERVICE,
            format!("Expected IPv4, got: {}", ip),
        )),
        Err(_) => Err(Error::network(
            SERVICE,
            format!("Invalid IP address: {:?}", text),
        )),
    }
}

#[async_trait::async_trait]
impl PublicIpSource for HttpIpSource {
    async fn public_ipv4(&self) -> Result<Ipv4Addr> {
        let ip = self.fetch_ip().await?;
        tracing::debug!(url = %self.url, ip = %ip, "Fetched public IP");
        Ok(ip)
    }

    fn source_name(&self) -> &str {
        SERVICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `responses` one connection at a time, returning the base URL
    async fn serve(responses: Vec<(&'static str, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let reply = format!(
                    "HTTP/1.1 {}\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{}", addr)
    }

    #[test]
    fn test_parse_ipv4() {
        assert_eq!(
            parse_ipv4("203.0.113.10\n").unwrap(),
            Ipv4Addr::new(203, 0, 113, 10)
        );
        assert!(matches!(
            parse_ipv4("2001:db8::1"),
            Err(Error::Network { .. })
        ));
        assert!(matches!(
            parse_ipv4("<html>"),
            Err(Error::Network { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetches_fresh_on_every_call() {
        let url = serve(vec![
            ("200 OK", "203.0.113.10"),
            ("200 OK", "203.0.113.11\n"),
        ])
        .await;
        let source = HttpIpSource::new(url);

        assert_eq!(
            source.public_ipv4().await.unwrap(),
            Ipv4Addr::new(203, 0, 113, 10)
        );
        assert_eq!(
            source.public_ipv4().await.unwrap(),
            Ipv4Addr::new(203, 0, 113, 11)
        );
    }

    #[tokio::test]
    async fn test_http_error_is_transient_network_error() {
        let url = serve(vec![("503 Service Unavailable", "busy")]).await;
        let err = HttpIpSource::new(url).public_ipv4().await.unwrap_err();

        assert!(matches!(err, Error::Network { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpIpSource::with_timeout(format!("http://{}", addr), Duration::from_secs(2))
            .public_ipv4()
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
