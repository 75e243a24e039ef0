use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use url::{Host, Url};

/// Errors that can occur during URL validation.
///
/// Covers parsing failures and the static half of the SSRF policy (the part
/// that can be decided without DNS).
#[derive(Error, Debug, Clone)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL points to a non-routable IP literal.
    #[error("Non-routable address not allowed: {0}")]
    PrivateIp(IpAddr),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a URL string for use as a feed source.
///
/// Rejects non-HTTP(S) schemes, `localhost` names, and IP-literal hosts in
/// any non-routable range (see [`is_non_routable`]). Hostnames are accepted
/// here; their resolved addresses are checked by the fetcher's guard.
///
/// # Examples
///
/// ```
/// use feedward::util::validate_url;
///
/// let url = validate_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("http://192.168.1.1/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;
    check_url(&url)?;
    Ok(url)
}

/// Applies the static checks of [`validate_url`] to an already-parsed URL.
pub fn check_url(url: &Url) -> Result<(), UrlValidationError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host() {
        None => Err(UrlValidationError::MissingHost),
        Some(Host::Domain(name)) => {
            let name = name.trim_end_matches('.').to_ascii_lowercase();
            if name == "localhost" || name.ends_with(".localhost") {
                return Err(UrlValidationError::Localhost);
            }
            Ok(())
        }
        Some(Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => check_ip(IpAddr::V6(ip)),
    }
}

fn check_ip(ip: IpAddr) -> Result<(), UrlValidationError> {
    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    if is_non_routable(&ip) {
        return Err(UrlValidationError::PrivateIp(ip));
    }
    Ok(())
}

/// Returns true for any address a feed fetch must never connect to: private,
/// loopback, link-local, multicast, broadcast, unspecified, shared/CGNAT,
/// benchmarking, documentation and reserved ranges, plus IPv6 forms that embed
/// such an IPv4 address.
pub fn is_non_routable(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_non_routable_v4(v4),
        IpAddr::V6(v6) => is_non_routable_v6(v6),
    }
}

fn is_non_routable_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_unspecified()
        // 0.0.0.0/8 "this network"
        || a == 0
        // 100.64.0.0/10 shared address space (CGNAT)
        || (a == 100 && (b & 0xc0) == 64)
        // 192.0.0.0/24 IETF protocol assignments
        || (a == 192 && b == 0 && c == 0)
        // Documentation: 192.0.2.0/24, 198.51.100.0/24, 203.0.113.0/24
        || (a == 192 && b == 0 && c == 2)
        || (a == 198 && b == 51 && c == 100)
        || (a == 203 && b == 0 && c == 113)
        // 198.18.0.0/15 benchmarking
        || (a == 198 && (b & 0xfe) == 18)
        // 240.0.0.0/4 reserved
        || a >= 240
}

fn is_non_routable_v6(ip: &Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() {
        return true;
    }
    let segments = ip.segments();
    // IPv4-mapped ::ffff:a.b.c.d
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_non_routable_v4(&v4);
    }
    // NAT64 64:ff9b::/96
    if segments[..6] == [0x64, 0xff9b, 0, 0, 0, 0] {
        return is_non_routable_v4(&embedded_v4(segments[6], segments[7]));
    }
    // IPv4-compatible ::a.b.c.d
    if segments[..6] == [0; 6] {
        return is_non_routable_v4(&embedded_v4(segments[6], segments[7]));
    }
    // 6to4 2002:AABB:CCDD::/48
    if segments[0] == 0x2002 {
        return is_non_routable_v4(&embedded_v4(segments[1], segments[2]));
    }
    // Unique Local (fc00::/7)
    (segments[0] & 0xfe00) == 0xfc00
        // Link-Local (fe80::/10)
        || (segments[0] & 0xffc0) == 0xfe80
        // Documentation (2001:db8::/32)
        || (segments[0] == 0x2001 && segments[1] == 0x0db8)
}

fn embedded_v4(hi: u16, lo: u16) -> Ipv4Addr {
    Ipv4Addr::new((hi >> 8) as u8, hi as u8, (lo >> 8) as u8, lo as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_valid_urls() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
        assert!(validate_url("http://news.example.org").is_ok());
        assert!(validate_url("https://example.com:443/feed.xml").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("gopher://example.com").is_err());
    }

    #[test]
    fn test_unparseable_url() {
        assert!(matches!(
            validate_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_localhost_rejected() {
        assert!(matches!(
            validate_url("http://localhost/feed"),
            Err(UrlValidationError::Localhost)
        ));
        assert!(validate_url("http://LOCALHOST./feed").is_err());
        assert!(validate_url("http://api.localhost/feed").is_err());
        assert!(validate_url("http://127.0.0.1/feed").is_err());
        assert!(validate_url("http://[::1]/feed").is_err());
    }

    #[test]
    fn test_private_ip_literals_rejected() {
        for url in [
            "http://192.168.1.1/feed",
            "http://10.0.0.1:3000/feed",
            "http://172.16.0.1/feed",
            "http://169.254.169.254/latest/meta-data",
            "http://0.0.0.0/feed",
            "http://[fe80::1]/feed",
            "http://[::ffff:127.0.0.1]/feed",
        ] {
            assert!(validate_url(url).is_err(), "{url} should be rejected");
        }
    }

    #[test]
    fn test_decimal_encoded_ip_is_normalized() {
        // The URL parser normalizes 2130706433 to 127.0.0.1.
        assert!(validate_url("http://2130706433/feed").is_err());
    }

    #[test]
    fn test_non_routable_v4_ranges() {
        for addr in [
            "127.0.0.1",
            "10.255.255.255",
            "172.31.255.255",
            "192.168.0.1",
            "169.254.169.254",
            "224.0.0.1",
            "255.255.255.255",
            "0.1.2.3",
            "100.64.0.1",
            "198.18.0.1",
            "192.0.2.10",
            "240.0.0.1",
        ] {
            assert!(is_non_routable(&ip(addr)), "{addr} should be non-routable");
        }
        for addr in ["8.8.8.8", "1.1.1.1", "93.184.216.34", "172.32.0.1", "100.128.0.1"] {
            assert!(!is_non_routable(&ip(addr)), "{addr} should be routable");
        }
    }

    #[test]
    fn test_non_routable_v6_ranges() {
        for addr in [
            "::1",
            "::",
            "ff02::1",
            "fc00::1",
            "fd12:3456::1",
            "fe80::1",
            "2001:db8::1",
            "::ffff:10.0.0.1",
            "64:ff9b::a9fe:a9fe",
        ] {
            assert!(is_non_routable(&ip(addr)), "{addr} should be non-routable");
        }
        for addr in ["2001:4860:4860::8888", "::ffff:8.8.8.8", "64:ff9b::808:808"] {
            assert!(!is_non_routable(&ip(addr)), "{addr} should be routable");
        }
    }

    #[test]
    fn test_embedded_private_v4_in_v6_forms() {
        for addr in ["::127.0.0.1", "::10.0.0.1", "2002:c0a8:0101::1", "2002:a9fe:a9fe::"] {
            assert!(is_non_routable(&ip(addr)), "{addr} should be non-routable");
        }
        assert!(!is_non_routable(&ip("2002:5db8:d822::1")));
        assert!(validate_url("http://[::127.0.0.1]/feed").is_err());
        assert!(validate_url("http://[2002:c0a8:101::1]/feed").is_err());
    }
}
