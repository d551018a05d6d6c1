//! Egress guard: every caller-supplied hostname, IP literal, or URL is
//! classified and authorized here before any DNS or HTTP call is made.
//!
//! Policy, applied in order:
//! 1. format validation (hostname bounds, IP parse, http/https scheme only)
//! 2. case-insensitive substring deny-list over the raw input (`localhost`,
//!    `127.0.0.1`, `0.0.0.0`, `10.`, `192.168.`, `172.`) — a deliberately
//!    over-broad rule: `HTTP://EVIL.10.com` is denied by substring match
//! 3. structured private/loopback/link-local/multicast range membership for
//!    anything that parses as an IP literal
//!
//! A cleared input becomes an immutable [`EgressTarget`]; the resolver and
//! fetcher accept only cleared targets and never re-validate mid-flight.

pub mod policy;

use std::net::IpAddr;

use thiserror::Error as ThisError;
use url::Url;

use crate::error::ProbeError;
use policy::{MAX_HOSTNAME_LEN, blocked_marker, is_private_ipv4, is_private_ipv6};

/// What the caller claims the input to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindHint {
    Hostname,
    IpAddress,
    Url,
}

/// What the input turned out to be after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Hostname,
    Ipv4,
    Ipv6,
    Url,
}

/// A validated, authorized network target. Immutable once produced.
#[derive(Debug, Clone)]
pub struct EgressTarget {
    raw: String,
    kind: TargetKind,
}

impl EgressTarget {
    fn new(raw: &str, kind: TargetKind) -> Self {
        Self {
            raw: raw.to_string(),
            kind,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }
}

/// Why a target was refused. Surfaced verbatim to the caller with a 400;
/// the caller's own input is the only thing these messages describe.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum DenyReason {
    #[error("hostname must not be empty")]
    EmptyHostname,
    #[error("hostname exceeds {MAX_HOSTNAME_LEN} characters")]
    HostnameTooLong,
    #[error("not a valid IPv4 or IPv6 address")]
    InvalidIp,
    #[error("not a valid URL")]
    MalformedUrl,
    #[error("URL scheme '{0}' is not allowed; only http and https are permitted")]
    UnsupportedScheme(String),
    #[error("access to internal addresses is blocked (matched '{0}')")]
    BlockedMarker(&'static str),
    #[error("private or reserved address {0} is not allowed")]
    PrivateAddress(IpAddr),
}

impl From<DenyReason> for ProbeError {
    fn from(reason: DenyReason) -> Self {
        ProbeError::Validation(reason.to_string())
    }
}

/// Classify `input` under `hint` and apply the egress policy.
pub fn classify_and_authorize(input: &str, hint: KindHint) -> Result<EgressTarget, DenyReason> {
    match hint {
        KindHint::Hostname => authorize_hostname(input),
        KindHint::IpAddress => authorize_ip(input),
        KindHint::Url => authorize_url(input),
    }
}

fn authorize_hostname(input: &str) -> Result<EgressTarget, DenyReason> {
    if input.is_empty() {
        return Err(DenyReason::EmptyHostname);
    }
    if input.len() > MAX_HOSTNAME_LEN {
        return Err(DenyReason::HostnameTooLong);
    }
    deny_blocked_marker(input)?;
    Ok(EgressTarget::new(input, TargetKind::Hostname))
}

fn authorize_ip(input: &str) -> Result<EgressTarget, DenyReason> {
    let ip: IpAddr = input.parse().map_err(|_| DenyReason::InvalidIp)?;
    deny_blocked_marker(input)?;
    deny_private_ip(ip)?;
    let kind = match ip {
        IpAddr::V4(_) => TargetKind::Ipv4,
        IpAddr::V6(_) => TargetKind::Ipv6,
    };
    Ok(EgressTarget::new(input, kind))
}

fn authorize_url(input: &str) -> Result<EgressTarget, DenyReason> {
    let url = Url::parse(input).map_err(|_| DenyReason::MalformedUrl)?;
    // The parser lowercases the scheme, so the match is case-insensitive.
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(DenyReason::UnsupportedScheme(scheme.to_string())),
    }
    deny_blocked_marker(input)?;
    match url.host() {
        // Localhost-style domains are already covered by the marker list;
        // only IP-literal hosts need the range membership check.
        Some(url::Host::Domain(_)) => {}
        Some(url::Host::Ipv4(ip)) => {
            if is_private_ipv4(ip) {
                return Err(DenyReason::PrivateAddress(IpAddr::V4(ip)));
            }
        }
        Some(url::Host::Ipv6(ip)) => {
            if is_private_ipv6(ip) {
                return Err(DenyReason::PrivateAddress(IpAddr::V6(ip)));
            }
        }
        None => return Err(DenyReason::MalformedUrl),
    }
    Ok(EgressTarget::new(input, TargetKind::Url))
}

fn deny_blocked_marker(input: &str) -> Result<(), DenyReason> {
    match blocked_marker(input) {
        Some(marker) => Err(DenyReason::BlockedMarker(marker)),
        None => Ok(()),
    }
}

fn deny_private_ip(ip: IpAddr) -> Result<(), DenyReason> {
    let private = match ip {
        IpAddr::V4(v4) => is_private_ipv4(v4),
        IpAddr::V6(v6) => is_private_ipv6(v6),
    };
    if private {
        Err(DenyReason::PrivateAddress(ip))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_targets_clear_the_guard() {
        assert!(classify_and_authorize("example.com", KindHint::Hostname).is_ok());
        assert!(classify_and_authorize("8.8.8.8", KindHint::IpAddress).is_ok());
        assert!(classify_and_authorize("2001:db8::1", KindHint::IpAddress).is_ok());
        assert!(classify_and_authorize("https://example.com/path?q=1", KindHint::Url).is_ok());
        assert!(classify_and_authorize("http://198.51.100.7:8080/", KindHint::Url).is_ok());
    }

    #[test]
    fn classification_kinds() {
        let host = classify_and_authorize("example.com", KindHint::Hostname).unwrap();
        assert_eq!(host.kind(), TargetKind::Hostname);
        let v4 = classify_and_authorize("8.8.8.8", KindHint::IpAddress).unwrap();
        assert_eq!(v4.kind(), TargetKind::Ipv4);
        let v6 = classify_and_authorize("2001:db8::1", KindHint::IpAddress).unwrap();
        assert_eq!(v6.kind(), TargetKind::Ipv6);
        let url = classify_and_authorize("https://example.com", KindHint::Url).unwrap();
        assert_eq!(url.kind(), TargetKind::Url);
        assert_eq!(url.raw(), "https://example.com");
    }

    #[test]
    fn hostname_bounds() {
        assert_eq!(
            classify_and_authorize("", KindHint::Hostname).unwrap_err(),
            DenyReason::EmptyHostname
        );
        let long = "a".repeat(254);
        assert_eq!(
            classify_and_authorize(&long, KindHint::Hostname).unwrap_err(),
            DenyReason::HostnameTooLong
        );
        let exactly = "a".repeat(253);
        assert!(classify_and_authorize(&exactly, KindHint::Hostname).is_ok());
    }

    #[test]
    fn invalid_ip_literals_are_refused() {
        assert_eq!(
            classify_and_authorize("not-an-ip", KindHint::IpAddress).unwrap_err(),
            DenyReason::InvalidIp
        );
        assert_eq!(
            classify_and_authorize("999.1.1.1", KindHint::IpAddress).unwrap_err(),
            DenyReason::InvalidIp
        );
    }

    #[test]
    fn non_http_schemes_are_refused() {
        for url in [
            "file:///etc/passwd",
            "ftp://example.com/",
            "gopher://example.com/",
            "javascript:alert(1)",
        ] {
            assert!(matches!(
                classify_and_authorize(url, KindHint::Url),
                Err(DenyReason::UnsupportedScheme(_)) | Err(DenyReason::MalformedUrl)
            ));
        }
    }

    #[test]
    fn substring_markers_deny_regardless_of_scheme_or_casing() {
        // The deny-list is a substring match over the raw input; it fires
        // even when the marker sits inside an otherwise public name. Known
        // over-broad, kept on purpose.
        for input in [
            "http://127.0.0.1/",
            "HTTP://EVIL.10.com",
            "https://LOCALHOST:8080/",
            "http://0.0.0.0/",
            "http://192.168.1.7/admin",
            "https://172.16.0.9/",
        ] {
            assert!(matches!(
                classify_and_authorize(input, KindHint::Url),
                Err(DenyReason::BlockedMarker(_))
            ));
        }
        assert!(matches!(
            classify_and_authorize("sub.localhost", KindHint::Hostname),
            Err(DenyReason::BlockedMarker(_))
        ));
        assert!(matches!(
            classify_and_authorize("10.0.0.1", KindHint::IpAddress),
            Err(DenyReason::BlockedMarker(_))
        ));
    }

    #[test]
    fn structured_checks_catch_what_substrings_miss() {
        // None of these contain a deny-list marker; only the range
        // membership check stops them.
        assert!(matches!(
            classify_and_authorize("http://169.254.169.254/latest/", KindHint::Url),
            Err(DenyReason::PrivateAddress(_))
        ));
        assert!(matches!(
            classify_and_authorize("http://[::1]/", KindHint::Url),
            Err(DenyReason::PrivateAddress(_))
        ));
        assert!(matches!(
            classify_and_authorize("http://[fe80::1]/", KindHint::Url),
            Err(DenyReason::PrivateAddress(_))
        ));
        assert!(matches!(
            classify_and_authorize("http://224.0.0.1/", KindHint::Url),
            Err(DenyReason::PrivateAddress(_))
        ));
        assert!(matches!(
            classify_and_authorize("169.254.1.1", KindHint::IpAddress),
            Err(DenyReason::PrivateAddress(_))
        ));
        assert!(matches!(
            classify_and_authorize("fc00::1", KindHint::IpAddress),
            Err(DenyReason::PrivateAddress(_))
        ));
    }

    #[test]
    fn localhost_domain_variants_are_refused() {
        assert!(matches!(
            classify_and_authorize("http://sub.example.localhost/", KindHint::Url),
            Err(DenyReason::BlockedMarker("localhost"))
        ));
        assert!(matches!(
            classify_and_authorize("localhost.localdomain", KindHint::Hostname),
            Err(DenyReason::BlockedMarker("localhost"))
        ));
    }
}
