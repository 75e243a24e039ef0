//! Network-target guard for outbound feed fetches (SSRF defense).
//!
//! Every URL the fetcher is about to request, including each redirect target,
//! goes through [`AddressGuard::check`]: scheme and IP-literal checks first, then
//! a DNS lookup whose every answer must be publicly routable. The same guard is
//! installed as reqwest's DNS resolver ([`PinnedResolver`]) so the connection is
//! only ever made to addresses that passed the policy, even if the name
//! re-binds between the check and the connect.

use async_trait::async_trait;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::collections::{HashMap, HashSet};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use url::{Host, Url};

use crate::util::{check_url, is_non_routable, UrlValidationError};

/// A fetch target refused by the SSRF policy. Never retried.
#[derive(Debug, Clone, Error)]
pub enum BlockedTarget {
    #[error("{0}")]
    Url(#[from] UrlValidationError),
    #[error("{host} resolves to non-routable address {addr}")]
    Address { host: String, addr: IpAddr },
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error(transparent)]
    Blocked(#[from] BlockedTarget),
    #[error("DNS lookup for {host} failed: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },
}

/// Hostname resolution used by the guard.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the system's `getaddrinfo` via tokio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|sa| sa.ip()).collect())
    }
}

/// Fixed host table. Unknown names fail with `NotFound`.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: &str, addr: IpAddr) -> Self {
        self.hosts
            .entry(host.to_ascii_lowercase())
            .or_default()
            .push(addr);
        self
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.hosts
            .get(&host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown host {host}")))
    }
}

/// Applies the outbound address policy.
pub struct AddressGuard {
    resolver: Arc<dyn HostResolver>,
    allowed_hosts: HashSet<String>,
}

impl AddressGuard {
    /// `allowed_hosts` are exempt from the address check (operator-configured
    /// internal mirrors). The scheme check still applies to them.
    pub fn new(resolver: Arc<dyn HostResolver>, allowed_hosts: &[String]) -> Self {
        Self {
            resolver,
            allowed_hosts: allowed_hosts.iter().map(|h| normalize_host(h)).collect(),
        }
    }

    /// Validates `url` as a fetch target. Resolves domain names; IP literals
    /// are decided without a lookup.
    pub async fn check(&self, url: &Url) -> Result<(), GuardError> {
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(BlockedTarget::from(UrlValidationError::UnsupportedScheme(
                    scheme.to_owned(),
                ))
                .into())
            }
        }

        let host = url
            .host_str()
            .ok_or(BlockedTarget::Url(UrlValidationError::MissingHost))?;
        if self.is_allowed(host) {
            return Ok(());
        }

        check_url(url).map_err(BlockedTarget::from)?;

        if let Some(Host::Domain(name)) = url.host() {
            self.resolve_public(name).await?;
        }
        Ok(())
    }

    /// Addresses reqwest may connect to for `host`.
    pub async fn connect_addrs(&self, host: &str) -> Result<Vec<IpAddr>, GuardError> {
        if self.is_allowed(host) {
            return self.lookup(host).await;
        }
        self.resolve_public(host).await
    }

    async fn resolve_public(&self, host: &str) -> Result<Vec<IpAddr>, GuardError> {
        let addrs = self.lookup(host).await?;
        if let Some(addr) = addrs.iter().find(|addr| is_non_routable(addr)) {
            tracing::warn!(host = %host, addr = %addr, "Refusing non-routable fetch target");
            return Err(BlockedTarget::Address {
                host: host.to_owned(),
                addr: *addr,
            }
            .into());
        }
        Ok(addrs)
    }

    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, GuardError> {
        let resolve_err = |source| GuardError::Resolve {
            host: host.to_owned(),
            source,
        };
        let addrs = self.resolver.lookup(host).await.map_err(resolve_err)?;
        if addrs.is_empty() {
            return Err(resolve_err(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses returned",
            )));
        }
        Ok(addrs)
    }

    /// Whether `host` is on the operator allowlist. Case, IPv6 brackets and a
    /// trailing root dot are ignored.
    pub fn is_allowed(&self, host: &str) -> bool {
        !self.allowed_hosts.is_empty() && self.allowed_hosts.contains(&normalize_host(host))
    }
}

fn normalize_host(host: &str) -> String {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// reqwest DNS resolver that only yields addresses accepted by the guard.
#[derive(Clone)]
pub struct PinnedResolver {
    guard: Arc<AddressGuard>,
}

impl PinnedResolver {
    pub fn new(guard: Arc<AddressGuard>) -> Self {
        Self { guard }
    }
}

impl Resolve for PinnedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let guard = Arc::clone(&self.guard);
        Box::pin(async move {
            let addrs = guard
                .connect_addrs(name.as_str())
                .await
                .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
                    match e {
                        GuardError::Blocked(blocked) => Box::new(blocked),
                        GuardError::Resolve { source, .. } => Box::new(source),
                    }
                })?;
            // Port 0 is replaced by the connector with the URL's port.
            let addrs: Addrs = Box::new(addrs.into_iter().map(|ip| SocketAddr::new(ip, 0)));
            Ok(addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(resolver: StaticResolver, allowed: &[&str]) -> AddressGuard {
        let allowed: Vec<String> = allowed.iter().map(|s| s.to_string()).collect();
        AddressGuard::new(Arc::new(resolver), &allowed)
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_public_host_passes() {
        let g = guard(
            StaticResolver::new().with_host("news.example", "93.184.216.34".parse().unwrap()),
            &[],
        );
        assert!(g.check(&url("https://news.example/rss")).await.is_ok());
    }

    #[tokio::test]
    async fn test_host_resolving_to_metadata_endpoint_blocked() {
        let g = guard(
            StaticResolver::new().with_host("metadata.test", "169.254.169.254".parse().unwrap()),
            &[],
        );
        let err = g.check(&url("http://metadata.test/latest")).await.unwrap_err();
        assert!(matches!(
            err,
            GuardError::Blocked(BlockedTarget::Address { ref addr, .. }) if addr.to_string() == "169.254.169.254"
        ));
    }

    #[tokio::test]
    async fn test_any_private_answer_blocks() {
        let g = guard(
            StaticResolver::new()
                .with_host("split.test", "93.184.216.34".parse().unwrap())
                .with_host("split.test", "10.0.0.5".parse().unwrap()),
            &[],
        );
        assert!(matches!(
            g.check(&url("http://split.test/")).await,
            Err(GuardError::Blocked(_))
        ));
    }

    #[tokio::test]
    async fn test_loopback_literal_blocked_without_lookup() {
        // Empty resolver: a lookup would fail with Resolve, not Blocked.
        let g = guard(StaticResolver::new(), &[]);
        assert!(matches!(
            g.check(&url("http://127.0.0.1:8080/feed")).await,
            Err(GuardError::Blocked(BlockedTarget::Url(UrlValidationError::Localhost)))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_scheme_blocked_even_when_allowlisted() {
        let g = guard(StaticResolver::new(), &["files.corp"]);
        assert!(matches!(
            g.check(&url("ftp://files.corp/feed")).await,
            Err(GuardError::Blocked(_))
        ));
    }

    #[tokio::test]
    async fn test_allowlisted_host_skips_address_check() {
        let g = guard(
            StaticResolver::new().with_host("mirror.corp", "10.1.1.1".parse().unwrap()),
            &["Mirror.Corp"],
        );
        assert!(g.check(&url("http://mirror.corp/feed")).await.is_ok());
        assert_eq!(
            g.connect_addrs("mirror.corp").await.unwrap(),
            vec!["10.1.1.1".parse::<IpAddr>().unwrap()]
        );
    }

    #[test]
    fn test_allowlist_ignores_brackets_case_and_root_dot() {
        let g = guard(StaticResolver::new(), &["mirror.corp.", "[::1]"]);
        for host in ["mirror.corp", "MIRROR.corp.", "::1", "[::1]"] {
            assert!(g.is_allowed(host), "{host} should be allowlisted");
        }
        assert!(!g.is_allowed("mirror.corp.evil"));
        assert!(!guard(StaticResolver::new(), &[]).is_allowed(""));
    }

    #[tokio::test]
    async fn test_allowlisted_ip_literal() {
        let g = guard(StaticResolver::new(), &["127.0.0.1"]);
        assert!(g.check(&url("http://127.0.0.1:9000/feed")).await.is_ok());
        assert!(g.check(&url("http://127.0.0.2:9000/feed")).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_host_is_resolve_error() {
        let g = guard(StaticResolver::new(), &[]);
        assert!(matches!(
            g.check(&url("http://nowhere.test/")).await,
            Err(GuardError::Resolve { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_addrs_applies_policy() {
        let g = guard(
            StaticResolver::new().with_host("rebind.test", "127.0.0.1".parse().unwrap()),
            &[],
        );
        assert!(matches!(
            g.connect_addrs("rebind.test").await,
            Err(GuardError::Blocked(_))
        ));
    }
}
