use std::net::IpAddr;
use std::time::Duration;

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;

use crate::egress::EgressTarget;
use crate::error::ProbeError;

/// Forward answer: A and AAAA record sets. An empty AAAA set is a normal
/// outcome, not a fault.
pub struct DnsAnswer {
    pub a_records: Vec<String>,
    pub aaaa_records: Vec<String>,
}

/// Resolver with an explicit per-query timeout.
pub struct DnsClient {
    resolver: TokioAsyncResolver,
}

impl DnsClient {
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 2;
        // ndots = 0 keeps search domains from being appended to lookups.
        opts.ndots = 0;
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }

    /// Forward-resolve a cleared hostname. No A records is a remote fault
    /// (reported inline by the handler); no AAAA records is an empty set.
    pub async fn resolve(&self, target: &EgressTarget) -> Result<DnsAnswer, ProbeError> {
        let host = target.raw();

        let a_records = self
            .resolver
            .ipv4_lookup(host)
            .await
            .map_err(|e| ProbeError::Remote(e.to_string()))?
            .iter()
            .map(|record| record.0.to_string())
            .collect();

        let aaaa_records = match self.resolver.ipv6_lookup(host).await {
            Ok(lookup) => lookup.iter().map(|record| record.0.to_string()).collect(),
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Vec::new(),
            Err(e) => return Err(ProbeError::Remote(e.to_string())),
        };

        Ok(DnsAnswer {
            a_records,
            aaaa_records,
        })
    }

    /// Reverse-resolve a cleared IP literal to its PTR name.
    pub async fn reverse(&self, target: &EgressTarget) -> Result<String, ProbeError> {
        let ip: IpAddr = target
            .raw()
            .parse()
            .map_err(|_| ProbeError::Internal("cleared target is not an IP literal".to_string()))?;

        let lookup = self
            .resolver
            .reverse_lookup(ip)
            .await
            .map_err(|e| ProbeError::Remote(e.to_string()))?;

        lookup
            .iter()
            .next()
            .map(|ptr| ptr.0.to_utf8())
            .ok_or_else(|| ProbeError::Remote("no PTR record".to_string()))
    }
}
