//! DNS record fetching.
//!
//! [`RecordFetcher`] is the seam the crawler talks to; [`DnsFetcher`] is the
//! production implementation backed by a blocking hickory resolver that only
//! asks the configured nameservers.

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::rr::{RData, RecordType as WireType};
use hickory_resolver::Resolver;

use crate::config::FlattenConfig;
use crate::constants::DNS_PORT;
use crate::error::{ConfigError, ResolutionCause, ResolutionError};
use crate::record::{RecordQuery, RecordType};

/// Resolves one name for one record type into raw strings.
///
/// TXT answers come back one string per record with its character-strings
/// concatenated in wire order, A/AAAA answers as address literals and MX
/// answers as exchange host names.
pub trait RecordFetcher {
    fn resolve(&self, query: &RecordQuery) -> Result<Vec<String>, ResolutionError>;
}

impl<T: RecordFetcher + ?Sized> RecordFetcher for &T {
    fn resolve(&self, query: &RecordQuery) -> Result<Vec<String>, ResolutionError> {
        (**self).resolve(query)
    }
}

pub struct DnsFetcher {
    resolver: Resolver,
}

impl DnsFetcher {
    /// Builds a resolver restricted to `config.nameservers`. Retries and
    /// server rotation are left to hickory.
    pub fn new(config: &FlattenConfig) -> Result<Self, ConfigError> {
        if config.nameservers.is_empty() {
            return Err(ConfigError::NoNameservers);
        }
        let group = NameServerConfigGroup::from_ips_clear(&config.nameservers, DNS_PORT, true);
        let resolver_config = ResolverConfig::from_parts(None, vec![], group);

        let mut opts = ResolverOpts::default();
        opts.timeout = config.timeout;
        opts.attempts = config.attempts;
        opts.ndots = 0;

        let resolver = Resolver::new(resolver_config, opts)?;
        Ok(Self { resolver })
    }
}

impl RecordFetcher for DnsFetcher {
    fn resolve(&self, query: &RecordQuery) -> Result<Vec<String>, ResolutionError> {
        let wire_type = match query.record_type {
            RecordType::Txt => WireType::TXT,
            RecordType::A => WireType::A,
            RecordType::Aaaa => WireType::AAAA,
            RecordType::Mx => WireType::MX,
        };
        log::debug!("Resolving {query}");
        let lookup = self
            .resolver
            .lookup(query.name.to_fqdn(), wire_type)
            .map_err(|e| resolution_error(query, &e))?;

        let values = lookup
            .iter()
            .filter_map(|rdata| match rdata {
                RData::TXT(txt) => Some(
                    txt.iter()
                        .map(|bytes| String::from_utf8_lossy(bytes).to_string())
                        .collect::<Vec<String>>()
                        .join(""),
                ),
                RData::A(a) => Some(a.0.to_string()),
                RData::AAAA(aaaa) => Some(aaaa.0.to_string()),
                RData::MX(mx) => Some(mx.exchange().to_utf8()),
                // CNAMEs followed by the resolver show up here too
                _ => None,
            })
            .collect();
        Ok(values)
    }
}

fn resolution_error(query: &RecordQuery, e: &ResolveError) -> ResolutionError {
    let cause = match e.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => ResolutionCause::NotFound,
        ResolveErrorKind::Timeout => ResolutionCause::Timeout,
        ResolveErrorKind::Proto(proto) => ResolutionCause::Malformed(proto.to_string()),
        _ => ResolutionCause::Other(e.to_string()),
    };
    ResolutionError {
        domain: query.name.to_string(),
        record_type: query.record_type,
        cause,
    }
}
